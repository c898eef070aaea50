//! Owns the single active run: validation, mutual exclusion, the run
//! task, cancellation and teardown.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use action_flow::{
    Bindings, DefaultFailureHandler, DefaultStepExecutor, IterationContext, IterationEnd,
    IterationEngine, Reporter, SiteProfile, StepExecutor, StepOutcome, WorkflowTemplate,
};
use action_locator::SequentialResolver;
use cdp_adapter::{LaunchOptions, PageDriver, SessionLauncher};
use chrono::Utc;
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use remixpilot_core_types::{EventPayload, RunId, RunPhase};
use remixpilot_event_bus::EventSink;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::{RunConfig, RunLimits, RunRequest, ValidationError};
use super::state::RunState;
use crate::metrics;

#[derive(Clone, Debug)]
pub struct ControllerSettings {
    pub credits_per_cycle: u64,
    pub limits: RunLimits,
    pub site: SiteProfile,
    pub navigation_timeout: Duration,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            credits_per_cycle: 10,
            limits: RunLimits::default(),
            site: SiteProfile::default(),
            navigation_timeout: action_flow::executor::DEFAULT_NAVIGATION_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RunRejected {
    #[error("A run is already active")]
    AlreadyRunning,
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// How the run task ended, before it is folded into [`RunState`].
#[derive(Debug, Clone, PartialEq, Eq)]
enum RunExit {
    Completed,
    Stopped,
    Failed(String),
}

/// Starts, stops and observes runs. Cheap to clone; clones share the run.
#[derive(Clone)]
pub struct RunController {
    inner: Arc<Inner>,
}

struct Inner {
    launcher: Arc<dyn SessionLauncher>,
    reporter: Reporter,
    workflow: Arc<WorkflowTemplate>,
    settings: ControllerSettings,
    executor: Arc<dyn StepExecutor>,
    engine: IterationEngine,
    state: RwLock<RunState>,
    /// Set on acceptance, cleared after teardown.
    active: AtomicBool,
    cancel: Mutex<Option<CancellationToken>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl RunController {
    pub fn new(
        launcher: Arc<dyn SessionLauncher>,
        sink: Arc<dyn EventSink>,
        workflow: Arc<WorkflowTemplate>,
        settings: ControllerSettings,
    ) -> Self {
        let reporter = Reporter::new(sink);
        let executor: Arc<dyn StepExecutor> = Arc::new(
            DefaultStepExecutor::new(
                Arc::new(SequentialResolver::new()),
                Arc::new(DefaultFailureHandler::new()),
                reporter.clone(),
            )
            .with_navigation_timeout(settings.navigation_timeout),
        );
        let engine =
            IterationEngine::new(executor.clone(), reporter.clone(), settings.credits_per_cycle);

        Self {
            inner: Arc::new(Inner {
                launcher,
                reporter,
                workflow,
                settings,
                executor,
                engine,
                state: RwLock::new(RunState::default()),
                active: AtomicBool::new(false),
                cancel: Mutex::new(None),
                task: Mutex::new(None),
            }),
        }
    }

    /// Validates `request` and spawns the run task. Must be called from
    /// within a tokio runtime.
    pub fn start(&self, request: RunRequest) -> Result<RunId, RunRejected> {
        let inner = &self.inner;
        if inner
            .active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            inner.reporter.warn("A run is already active; start request ignored");
            metrics::record_run_rejected("already_running");
            return Err(RunRejected::AlreadyRunning);
        }

        let config = match RunConfig::from_request(
            &request,
            &inner.settings.limits,
            &inner.settings.site,
        ) {
            Ok(config) => config,
            Err(err) => {
                let message = err.to_string();
                let total = {
                    let mut state = inner.state.write();
                    state.phase = RunPhase::Error;
                    state.last_error = Some(message.clone());
                    state.finished_at = Some(Utc::now());
                    state.total_iterations
                };
                inner.reporter.error(message.clone());
                inner
                    .reporter
                    .status(RunPhase::Error, Some(message), None, total);
                metrics::record_run_rejected("invalid");
                inner.active.store(false, Ordering::SeqCst);
                return Err(err.into());
            }
        };

        let run_id = RunId::new();
        let token = CancellationToken::new();
        *inner.state.write() = RunState::starting(run_id.clone(), config.iterations);
        *inner.cancel.lock() = Some(token.clone());
        info!(target: "run", run_id = %run_id, iterations = config.iterations, "run accepted");

        let mut slot = inner.task.lock();
        let task_inner = Arc::clone(inner);
        *slot = Some(tokio::spawn(async move {
            task_inner.run(config, token).await;
        }));
        Ok(run_id)
    }

    /// Requests cooperative cancellation. The run halts before its next
    /// step; no-op when idle or already requested.
    pub fn stop(&self) {
        let token = self.inner.cancel.lock().clone();
        match token {
            Some(token) if self.is_running() && !token.is_cancelled() => {
                self.inner.reporter.warn("Run stop requested by user");
                token.cancel();
            }
            _ => debug!(target: "run", "stop ignored: nothing to cancel"),
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.active.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> RunState {
        self.inner.state.read().clone()
    }

    /// Waits for the current run task, if any, to finish.
    pub async fn join(&self) {
        let handle = self.inner.task.lock().take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                warn!(target: "run", ?err, "run task ended abnormally");
            }
        }
    }
}

/// Clears the active flag when the run task ends, however it ends.
struct ActiveGuard<'a> {
    inner: &'a Inner,
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        {
            let mut state = self.inner.state.write();
            if state.is_active() {
                state.phase = RunPhase::Error;
                state.last_error = Some("Internal error: run task ended unexpectedly".into());
                state.finished_at = Some(Utc::now());
            }
        }
        *self.inner.cancel.lock() = None;
        self.inner.active.store(false, Ordering::SeqCst);
    }
}

/// Terminal phase already written to [`RunState`], awaiting announcement.
struct Settled {
    phase: RunPhase,
    message: String,
    iteration: Option<u32>,
}

impl Inner {
    async fn run(self: Arc<Self>, config: RunConfig, cancel: CancellationToken) {
        let _guard = ActiveGuard { inner: &self };
        metrics::record_run_started();
        let total = config.iterations;
        self.reporter.info(format!(
            "Starting run: {total} iteration(s), base name {}, account {}",
            config.base_name, config.credentials.email
        ));
        self.reporter.info(format!("Project: {}", config.project_url));
        self.reporter
            .status(RunPhase::Starting, Some("Launching browser".into()), None, total);

        let settled = AssertUnwindSafe(self.lifecycle(&config, &cancel))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| self.settle(RunExit::Failed(internal_error(&*panic)), total));
        self.announce(settled, total);
    }

    /// Launch, drive and tear down. The terminal phase is settled before
    /// the session closes.
    async fn lifecycle(&self, config: &RunConfig, cancel: &CancellationToken) -> Settled {
        let total = config.iterations;
        let options = LaunchOptions {
            headless: config.headless,
        };
        let session = match self.launcher.launch(&options).await {
            Ok(session) => session,
            Err(err) => {
                return self.settle(RunExit::Failed(format!("Browser launch failed: {err}")), total)
            }
        };

        let page = session.page();
        let exit = AssertUnwindSafe(self.drive(config, page.as_ref(), cancel))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| RunExit::Failed(internal_error(&*panic)));
        let settled = self.settle(exit, total);

        self.reporter.info("Closing browser");
        if let Err(err) = session.close().await {
            warn!(target: "run", %err, "failed to close browser session");
        }
        settled
    }

    async fn drive(
        &self,
        config: &RunConfig,
        page: &dyn PageDriver,
        cancel: &CancellationToken,
    ) -> RunExit {
        if cancel.is_cancelled() {
            return RunExit::Stopped;
        }
        let total = config.iterations;
        let bindings = Bindings {
            project_url: config.project_url.clone(),
            email: config.credentials.email.clone(),
            password: config.credentials.password.clone(),
            iteration_name: None,
        };

        self.reporter.status(
            RunPhase::Starting,
            Some(self.workflow.login.status_label.clone()),
            None,
            total,
        );
        match self
            .executor
            .execute(&self.workflow.login, page, &bindings)
            .await
        {
            StepOutcome::Success | StepOutcome::Degraded(_) => {}
            other => {
                let reason = other.reason().unwrap_or("unknown failure").to_string();
                return RunExit::Failed(format!("Login failed: {reason}"));
            }
        }

        self.state.write().phase = RunPhase::Running;
        self.reporter
            .success(format!("Logged in as {}", config.credentials.email));
        self.reporter.emit(EventPayload::LoginSuccess {
            email: config.credentials.email.clone(),
        });

        for iteration in 1..=total {
            if cancel.is_cancelled() {
                return RunExit::Stopped;
            }
            self.state.write().current_iteration = iteration;
            self.reporter
                .info(format!("Iteration {iteration}/{total} started"));

            let ctx = IterationContext {
                iteration,
                total,
                base_name: &config.base_name,
                bindings: &bindings,
                cancel,
            };
            let result = self
                .engine
                .run_iteration(&self.workflow.iteration, ctx, page)
                .await;

            match result.end {
                IterationEnd::Counted => {
                    metrics::record_iteration("counted");
                    let credits = {
                        let mut state = self.state.write();
                        state.credits += result.credits;
                        state.completed_iterations += 1;
                        state.credits
                    };
                    self.reporter.success(format!(
                        "Iteration {iteration} complete: +{} credits, total {credits}",
                        result.credits
                    ));
                    self.reporter.emit(EventPayload::CreditsUpdate { credits });
                    self.reporter.emit(EventPayload::IterationComplete {
                        iteration,
                        total,
                        name: result.name,
                    });
                }
                IterationEnd::Skipped { step, reason } => {
                    metrics::record_iteration("skipped");
                    self.reporter.warn(format!(
                        "Iteration {iteration} skipped at {step}: {reason}; no credit awarded"
                    ));
                }
                IterationEnd::Aborted { step, reason } => {
                    metrics::record_iteration("aborted");
                    return RunExit::Failed(format!("{step} failed: {reason}"));
                }
                IterationEnd::Cancelled => {
                    metrics::record_iteration("cancelled");
                    return RunExit::Stopped;
                }
            }
        }

        RunExit::Completed
    }

    /// Moves the state to its terminal phase.
    fn settle(&self, exit: RunExit, total: u32) -> Settled {
        let mut state = self.state.write();
        let (phase, message) = match exit {
            RunExit::Completed => (
                RunPhase::Completed,
                format!(
                    "Run complete: {} of {total} iteration(s) counted, {} credits",
                    state.completed_iterations, state.credits
                ),
            ),
            RunExit::Stopped => (RunPhase::Stopped, "Run stopped by user".to_string()),
            RunExit::Failed(reason) => (RunPhase::Error, reason),
        };
        state.phase = phase;
        state.finished_at = Some(Utc::now());
        if phase == RunPhase::Error {
            state.last_error = Some(message.clone());
        }
        Settled {
            phase,
            message,
            iteration: Some(state.current_iteration).filter(|i| *i > 0),
        }
    }

    /// Logs the outcome and emits the final status.
    fn announce(&self, settled: Settled, total: u32) {
        let Settled {
            phase,
            message,
            iteration,
        } = settled;
        match phase {
            RunPhase::Completed => self.reporter.success(message.clone()),
            RunPhase::Stopped => self.reporter.warn(message.clone()),
            _ => self.reporter.error(format!("Run failed: {message}")),
        }
        metrics::record_run_finished(phase.as_str());
        self.reporter.status(phase, Some(message), iteration, total);
    }
}

fn internal_error(panic: &(dyn Any + Send)) -> String {
    format!("Internal error: {}", panic_message(panic))
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic".to_string()
    }
}
