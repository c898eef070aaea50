use std::path::PathBuf;
use std::sync::Arc;

use action_flow::WorkflowTemplate;
use anyhow::{Context, Result};
use cdp_adapter::chromium::ChromiumLauncher;
use remixpilot_event_bus::EventSink;
use tokio::fs;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::AppConfig;
use crate::run::RunController;

pub fn init_logging(level: &str, debug: bool) -> Result<()> {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        level.parse().context("Invalid log level")?
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_string())),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}

pub struct LoadedConfig {
    pub config: AppConfig,
    pub path: PathBuf,
}

/// Picks the first existing candidate, in order: `config/config.yaml`,
/// `config.json`, then the user config directory.
fn default_config_path() -> Result<PathBuf> {
    for candidate in ["config/config.yaml", "config.json"] {
        let path = PathBuf::from(candidate);
        if path.exists() {
            return Ok(path);
        }
    }
    let mut path = dirs::config_dir().context("Failed to get config directory")?;
    path.push("remixpilot");
    path.push("config.yaml");
    Ok(path)
}

pub async fn load_config(config_path: Option<&PathBuf>) -> Result<LoadedConfig> {
    let config_path = match config_path {
        Some(path) => path.clone(),
        None => default_config_path()?,
    };

    if config_path.exists() {
        let content = fs::read_to_string(&config_path)
            .await
            .context("Failed to read config file")?;
        let config = AppConfig::parse(&content, &config_path)?;

        info!("Loaded configuration from: {}", config_path.display());
        Ok(LoadedConfig {
            config,
            path: config_path,
        })
    } else {
        warn!(
            "Config file not found, using defaults: {}",
            config_path.display()
        );
        Ok(LoadedConfig {
            config: AppConfig::default(),
            path: config_path,
        })
    }
}

/// Controller driving a real Chromium with the standard workflow.
pub fn chromium_controller(config: &AppConfig, sink: Arc<dyn EventSink>) -> Result<RunController> {
    let workflow =
        WorkflowTemplate::standard(&config.site).context("Invalid site profile in config")?;
    let launcher = Arc::new(ChromiumLauncher::new(config.browser.cdp_config()));
    Ok(RunController::new(
        launcher,
        sink,
        Arc::new(workflow),
        config.controller_settings(),
    ))
}
