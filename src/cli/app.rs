use anyhow::Result;
use clap::Parser;
use tracing::{debug, error, info};

use super::commands::Commands;
use super::env::CliArgs;
use super::runtime::{init_logging, load_config, LoadedConfig};
use super::{cmd_run, cmd_serve};

pub async fn run() -> Result<()> {
    let cli = CliArgs::parse();

    init_logging(&cli.log_level, cli.debug)?;

    info!(
        "Starting RemixPilot v{} ({}, built {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_DATE")
    );

    let LoadedConfig { mut config, path } = load_config(cli.config.as_ref()).await?;
    config.apply_env_overrides();
    debug!(path = %path.display(), "configuration resolved");

    let outcome = match cli.command {
        Commands::Serve(args) => cmd_serve(args, config).await,
        Commands::Run(args) => cmd_run(args, config).await,
    };

    match outcome {
        Ok(()) => {
            info!("Command completed successfully");
            Ok(())
        }
        Err(err) => {
            error!("Command failed: {}", err);
            Err(err)
        }
    }
}
