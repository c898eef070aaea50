//! Chromium page driver for RemixPilot.
//!
//! Higher layers talk to a page through [`driver::PageDriver`] and never see
//! the DevTools protocol. Two implementations ship here: the real
//! chromiumoxide-backed session in [`chromium`] and the in-memory
//! [`scripted::ScriptedPage`] used by tests across the workspace.

use std::{env, path::PathBuf};

use which::which;

pub mod chromium;
pub mod commands;
pub mod driver;
pub mod metrics;
pub mod script;
pub mod scripted;

pub use commands::{ElementProbe, ElementQuery, LocatorRule, Pick};
pub use driver::{BrowserSession, LaunchOptions, PageDriver, SessionLauncher};
pub use error::{AdapterError, AdapterErrorKind};

pub mod error {
    use serde::{Deserialize, Serialize};
    use std::fmt;
    use thiserror::Error;

    /// High-level error categories surfaced by the adapter.
    #[derive(Clone, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
    pub enum AdapterErrorKind {
        #[error("navigation timed out")]
        NavTimeout,
        #[error("navigation failed")]
        NavFailed,
        #[error("cdp i/o failure")]
        CdpIo,
        #[error("browser session closed")]
        SessionClosed,
        #[error("browser launch failed")]
        LaunchFailed,
        #[error("target element not found")]
        TargetNotFound,
        #[error("page script failed")]
        Script,
        #[error("internal error")]
        Internal,
    }

    /// Enriched error metadata passed back to higher layers.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct AdapterError {
        pub kind: AdapterErrorKind,
        pub hint: Option<String>,
        pub retriable: bool,
    }

    impl fmt::Display for AdapterError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", self.kind)?;
            if let Some(hint) = &self.hint {
                write!(f, ": {}", hint)?;
            }
            Ok(())
        }
    }

    impl std::error::Error for AdapterError {}

    impl AdapterError {
        pub fn new(kind: AdapterErrorKind) -> Self {
            Self {
                kind,
                hint: None,
                retriable: false,
            }
        }

        pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
            self.hint = Some(hint.into());
            self
        }

        pub fn retriable(mut self, flag: bool) -> Self {
            self.retriable = flag;
            self
        }

        /// True when the browser session itself is unusable. Callers must
        /// stop issuing commands instead of falling back or retrying.
        pub fn is_session_fault(&self) -> bool {
            matches!(
                self.kind,
                AdapterErrorKind::SessionClosed | AdapterErrorKind::LaunchFailed
            )
        }
    }
}

pub mod config {
    use crate::detect_chrome_executable;
    use serde::{Deserialize, Serialize};
    use std::{env, path::PathBuf};

    /// Desktop user agents; one is picked at random per launch.
    pub const DEFAULT_USER_AGENTS: &[&str] = &[
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0",
    ];

    /// Configuration for launching Chromium.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    #[serde(default)]
    pub struct CdpConfig {
        pub executable: Option<PathBuf>,
        pub window_width: u32,
        pub window_height: u32,
        pub user_agents: Vec<String>,
        pub extra_args: Vec<String>,
        pub default_deadline_ms: u64,
        pub locale: String,
    }

    impl Default for CdpConfig {
        fn default() -> Self {
            Self {
                executable: None,
                window_width: 1920,
                window_height: 1080,
                user_agents: DEFAULT_USER_AGENTS.iter().map(|ua| ua.to_string()).collect(),
                extra_args: Vec::new(),
                default_deadline_ms: 30_000,
                locale: "pt-BR".to_string(),
            }
        }
    }

    impl CdpConfig {
        /// Explicit executable when it exists, otherwise whatever the host has.
        pub fn resolve_executable(&self) -> Option<PathBuf> {
            if let Some(path) = &self.executable {
                if !path.as_os_str().is_empty() && path.exists() {
                    return Some(path.clone());
                }
            }
            detect_chrome_executable()
        }

        /// Flags passed to every launch in addition to `extra_args`.
        pub fn launch_args(&self) -> Vec<String> {
            let mut args = vec![
                "--start-maximized".to_string(),
                format!("--window-size={},{}", self.window_width, self.window_height),
                "--disable-blink-features=AutomationControlled".to_string(),
                "--disable-infobars".to_string(),
                "--disable-dev-shm-usage".to_string(),
                "--no-sandbox".to_string(),
                "--disable-setuid-sandbox".to_string(),
                "--disable-gpu".to_string(),
                format!("--lang={}", self.locale),
            ];
            args.extend(self.extra_args.iter().cloned());
            args
        }

        pub fn pick_user_agent(&self) -> Option<String> {
            use rand::seq::SliceRandom;
            self.user_agents.choose(&mut rand::thread_rng()).cloned()
        }
    }

    pub(crate) fn env_flag(name: &str) -> Option<bool> {
        let value = env::var(name).ok()?;
        match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        }
    }
}

/// Environment variable naming an explicit Chromium binary.
pub const CHROME_ENV: &str = "REMIXPILOT_CHROME";
const SKIP_OS_PATHS_ENV: &str = "REMIXPILOT_SKIP_OS_PATHS";

/// Locates a Chromium-family browser: env override, then `PATH`, then the
/// usual install locations.
pub fn detect_chrome_executable() -> Option<PathBuf> {
    if let Ok(raw) = env::var(CHROME_ENV) {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            let candidate = PathBuf::from(trimmed);
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }

    for name in chrome_executable_names() {
        if let Ok(path) = which(name) {
            return Some(path);
        }
    }

    if config::env_flag(SKIP_OS_PATHS_ENV) != Some(true) {
        for candidate in os_specific_chrome_paths() {
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }

    None
}

fn chrome_executable_names() -> &'static [&'static str] {
    #[cfg(target_os = "windows")]
    {
        &["chrome.exe", "chromium.exe", "msedge.exe"]
    }

    #[cfg(any(target_os = "macos", target_os = "linux", target_os = "freebsd"))]
    {
        &[
            "google-chrome-stable",
            "google-chrome",
            "chromium",
            "chromium-browser",
        ]
    }

    #[cfg(not(any(
        target_os = "windows",
        target_os = "macos",
        target_os = "linux",
        target_os = "freebsd"
    )))]
    {
        &["chrome"]
    }
}

fn os_specific_chrome_paths() -> Vec<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        let mut paths = Vec::new();
        for var in ["ProgramFiles", "ProgramFiles(x86)", "LOCALAPPDATA"] {
            if let Ok(root) = env::var(var) {
                let root = PathBuf::from(root);
                paths.push(root.join("Google/Chrome/Application/chrome.exe"));
                paths.push(root.join("Microsoft/Edge/Application/msedge.exe"));
            }
        }
        paths
    }

    #[cfg(target_os = "macos")]
    {
        vec![
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"),
            PathBuf::from("/Applications/Chromium.app/Contents/MacOS/Chromium"),
        ]
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        vec![
            PathBuf::from("/usr/bin/google-chrome-stable"),
            PathBuf::from("/usr/bin/google-chrome"),
            PathBuf::from("/usr/bin/chromium-browser"),
            PathBuf::from("/usr/bin/chromium"),
            PathBuf::from("/snap/bin/chromium"),
        ]
    }
}
