use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use remixpilot_core_types::RunEvent;
use remixpilot_event_bus::InMemoryBus;
use tokio::net::TcpListener;
use tracing::{error, info};

use super::runtime::chromium_controller;
use crate::auth::SessionStore;
use crate::config::AppConfig;
use crate::metrics;
use crate::run::RunController;
use crate::server::{build_router, ServeState};

/// Events buffered per observer before it starts lagging.
const EVENT_BUFFER: usize = 1024;

#[derive(Args, Clone)]
pub struct ServeArgs {
    /// Address to bind (defaults to the configured host)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on (defaults to the configured port)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory of static panel files
    #[arg(long, value_name = "DIR")]
    pub static_dir: Option<PathBuf>,
}

pub async fn cmd_serve(args: ServeArgs, mut config: AppConfig) -> Result<()> {
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(dir) = args.static_dir {
        config.static_dir = dir;
    }
    config.ensure_default_user();
    metrics::register_metrics();

    let config = Arc::new(config);
    let bus = InMemoryBus::<RunEvent>::new(EVENT_BUFFER);
    let controller = chromium_controller(&config, bus.clone())?;
    let sessions = SessionStore::new(config.session_ttl());
    let purge = sessions.spawn_purge();

    let state = ServeState::new(controller.clone(), sessions, bus, Arc::clone(&config));
    let router = build_router(state);

    let listener = TcpListener::bind((config.host.as_str(), config.port))
        .await
        .with_context(|| format!("failed to bind {}:{}", config.host, config.port))?;
    let local_addr = listener.local_addr()?;
    info!("RemixPilot panel listening on http://{}", local_addr);

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(controller))
    .await
    .context("server exited unexpectedly")?;

    purge.abort();
    Ok(())
}

/// Resolves on Ctrl-C after the active run, if any, has stopped.
async fn shutdown_signal(controller: RunController) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(?err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
    controller.stop();
    controller.join().await;
}
