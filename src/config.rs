//! Application configuration.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use action_flow::SiteProfile;
use anyhow::{bail, Context, Result};
use cdp_adapter::config::{CdpConfig, DEFAULT_USER_AGENTS};
use cdp_adapter::CHROME_ENV;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::auth::UserAccount;
use crate::run::{ControllerSettings, RunLimits};

pub const PORT_ENV: &str = "PORT";
pub const HEADLESS_ENV: &str = "REMIXPILOT_HEADLESS";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Default for runs that do not choose.
    pub headless: bool,
    pub credits_per_cycle: u64,
    pub max_iterations: u32,
    pub default_iterations: u32,
    pub default_base_name: String,
    pub static_dir: PathBuf,
    pub session_ttl_secs: u64,
    pub users: Vec<UserAccount>,
    pub site: SiteProfile,
    pub browser: BrowserSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3008,
            headless: false,
            credits_per_cycle: 10,
            max_iterations: 1000,
            default_iterations: 5,
            default_base_name: "STORE".to_string(),
            static_dir: PathBuf::from("public"),
            session_ttl_secs: 24 * 60 * 60,
            users: Vec::new(),
            site: SiteProfile::default(),
            browser: BrowserSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    pub executable: Option<PathBuf>,
    pub window_width: u32,
    pub window_height: u32,
    pub user_agents: Vec<String>,
    pub extra_args: Vec<String>,
    pub navigation_timeout_ms: u64,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            executable: None,
            window_width: 1920,
            window_height: 1080,
            user_agents: DEFAULT_USER_AGENTS.iter().map(|ua| ua.to_string()).collect(),
            extra_args: Vec::new(),
            navigation_timeout_ms: 60_000,
        }
    }
}

impl BrowserSettings {
    pub fn cdp_config(&self) -> CdpConfig {
        CdpConfig {
            executable: self.executable.clone(),
            window_width: self.window_width,
            window_height: self.window_height,
            user_agents: self.user_agents.clone(),
            extra_args: self.extra_args.clone(),
            default_deadline_ms: self.navigation_timeout_ms,
            ..CdpConfig::default()
        }
    }
}

impl AppConfig {
    /// Parses YAML, or JSON when the path ends in `.json`.
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        let config: Self = if is_json {
            serde_json::from_str(content).context("Failed to parse JSON config")?
        } else {
            serde_yaml::from_str(content).context("Failed to parse YAML config")?
        };
        if config.site.expected_domain.trim().is_empty() {
            bail!("site.expected_domain must not be empty");
        }
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(raw) = env::var(PORT_ENV) {
            match raw.trim().parse::<u16>() {
                Ok(port) => {
                    info!(port, "Using port from {PORT_ENV}");
                    self.port = port;
                }
                Err(_) => warn!(value = %raw, "ignoring invalid {PORT_ENV}"),
            }
        }
        if let Ok(raw) = env::var(HEADLESS_ENV) {
            match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.headless = true,
                "0" | "false" | "no" | "off" => self.headless = false,
                _ => warn!(value = %raw, "ignoring invalid {HEADLESS_ENV}"),
            }
        }
        if let Ok(raw) = env::var(CHROME_ENV) {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                self.browser.executable = Some(PathBuf::from(trimmed));
            }
        }
    }

    /// Installs the `admin` account when no users are configured.
    pub fn ensure_default_user(&mut self) {
        if self.users.is_empty() {
            warn!("No users configured; enabling default admin account");
            self.users.push(UserAccount {
                username: "admin".to_string(),
                password: "admin123".to_string(),
                name: Some("Administrator".to_string()),
            });
        }
    }

    pub fn run_limits(&self) -> RunLimits {
        RunLimits {
            default_iterations: self.default_iterations,
            max_iterations: self.max_iterations,
            default_base_name: self.default_base_name.clone(),
            default_headless: self.headless,
        }
    }

    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings {
            credits_per_cycle: self.credits_per_cycle,
            limits: self.run_limits(),
            site: self.site.clone(),
            navigation_timeout: Duration::from_millis(self.browser.navigation_timeout_ms),
        }
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.session_ttl_secs.min(i64::MAX as u64) as i64)
    }
}
