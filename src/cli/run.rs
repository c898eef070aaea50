use anyhow::{bail, Result};
use clap::Args;
use remixpilot_core_types::{EventPayload, RunEvent, RunPhase};
use remixpilot_event_bus::{to_mpsc, InMemoryBus};
use tracing::{info, warn};

use super::runtime::chromium_controller;
use crate::config::AppConfig;
use crate::run::RunRequest;

#[derive(Args, Clone)]
pub struct RunArgs {
    /// Project address to remix
    #[arg(long)]
    pub project_url: String,

    /// Account e-mail on the automated site
    #[arg(long, env = "REMIXPILOT_EMAIL")]
    pub email: String,

    /// Account password on the automated site
    #[arg(long, env = "REMIXPILOT_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// Base of the generated account names
    #[arg(long)]
    pub base_name: Option<String>,

    /// Number of iterations
    #[arg(short = 'n', long)]
    pub iterations: Option<i64>,

    /// Run the browser without a window
    #[arg(long)]
    pub headless: bool,
}

pub async fn cmd_run(args: RunArgs, config: AppConfig) -> Result<()> {
    let bus = InMemoryBus::<RunEvent>::new(256);
    let mut events = to_mpsc(bus.clone(), 256);
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if !matches!(event.payload, EventPayload::Log { .. }) {
                info!(target: "run", event = %event.to_wire(), "{}", event.kind());
            }
        }
    });

    let controller = chromium_controller(&config, bus)?;
    let request = RunRequest {
        project_url: Some(args.project_url),
        base_name: args.base_name,
        remix_repeat_count: args.iterations,
        headless: args.headless.then_some(true),
        email: Some(args.email),
        password: Some(args.password),
    };
    let run_id = controller.start(request)?;
    info!(run_id = %run_id, "run started; press Ctrl-C to stop");

    let stopper = controller.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; stopping before the next step");
            stopper.stop();
        }
    });
    controller.join().await;
    interrupt.abort();
    printer.abort();

    let state = controller.snapshot();
    info!(
        phase = %state.phase,
        iterations = state.completed_iterations,
        credits = state.credits,
        "run finished"
    );
    if state.phase == RunPhase::Error {
        bail!(state
            .last_error
            .unwrap_or_else(|| "run failed".to_string()));
    }
    Ok(())
}
