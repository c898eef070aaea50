//! Step executor implementation

use std::sync::Arc;

use action_locator::ElementResolver;
use async_trait::async_trait;
use cdp_adapter::PageDriver;
use tokio::time::{sleep, timeout, Duration, Instant};
use tracing::{debug, info};

use crate::errors::FlowError;
use crate::reporter::Reporter;
use crate::strategies::FailureHandler;
use crate::types::*;

/// Default wait for a page load.
pub const DEFAULT_NAVIGATION_TIMEOUT: Duration = Duration::from_secs(60);

/// Step executor trait
#[async_trait]
pub trait StepExecutor: Send + Sync {
    /// Run every action of `step` within its budget and classify the result
    async fn execute(&self, step: &Step, page: &dyn PageDriver, bindings: &Bindings)
        -> StepOutcome;
}

/// Default step executor implementation
pub struct DefaultStepExecutor {
    resolver: Arc<dyn ElementResolver>,
    failure_handler: Arc<dyn FailureHandler>,
    reporter: Reporter,
    navigation_timeout: Duration,
    url_poll_interval: Duration,
}

impl DefaultStepExecutor {
    /// Create a new step executor
    pub fn new(
        resolver: Arc<dyn ElementResolver>,
        failure_handler: Arc<dyn FailureHandler>,
        reporter: Reporter,
    ) -> Self {
        Self {
            resolver,
            failure_handler,
            reporter,
            navigation_timeout: DEFAULT_NAVIGATION_TIMEOUT,
            url_poll_interval: Duration::from_millis(250),
        }
    }

    pub fn with_navigation_timeout(mut self, navigation_timeout: Duration) -> Self {
        self.navigation_timeout = navigation_timeout;
        self
    }

    async fn run_actions(
        &self,
        step: &Step,
        page: &dyn PageDriver,
        bindings: &Bindings,
    ) -> Result<(), FlowError> {
        for action in &step.actions {
            self.reporter.info(format!("{}...", action.label));
            match self.run_action(action, page, bindings).await {
                Ok(Some(note)) => self.reporter.info(format!("{}: {note}", action.label)),
                Ok(None) => debug!(target: "flow", action = %action.label, "action done"),
                Err(err) if action.is_optional() && !err.is_session_fault() => {
                    self.reporter
                        .warn(format!("{} skipped (optional): {err}", action.label));
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// Runs one action, returning an optional note worth logging.
    async fn run_action(
        &self,
        action: &Action,
        page: &dyn PageDriver,
        bindings: &Bindings,
    ) -> Result<Option<String>, FlowError> {
        match &action.kind {
            ActionKind::Goto(target) => {
                let url = match target {
                    Target::ProjectUrl => bindings.project_url.as_str(),
                    Target::Fixed(url) => url.as_str(),
                };
                page.navigate(url, self.navigation_timeout)
                    .await
                    .map_err(|err| FlowError::from_navigation(url, err))?;
                Ok(None)
            }
            ActionKind::Click(spec) => {
                let resolved = self
                    .resolver
                    .resolve(page, &spec.name, &spec.strategies)
                    .await?;
                page.click(&resolved.query)
                    .await
                    .map_err(|err| FlowError::from_adapter(&spec.name, err))?;
                Ok(resolved
                    .used_fallback()
                    .then(|| format!("clicked via {} strategy", resolved.strategy_label)))
            }
            ActionKind::Fill(spec, value) => {
                let text = resolve_value(value, bindings)?;
                let resolved = self
                    .resolver
                    .resolve(page, &spec.name, &spec.strategies)
                    .await?;
                page.fill(&resolved.query, text)
                    .await
                    .map_err(|err| FlowError::from_adapter(&spec.name, err))?;
                Ok(None)
            }
            ActionKind::Await(spec) => {
                self.resolver
                    .resolve(page, &spec.name, &spec.strategies)
                    .await?;
                Ok(Some(format!("{} present", spec.name)))
            }
            ActionKind::AwaitUrl {
                pattern,
                timeout: wait,
                accept_if_contains,
            } => {
                self.await_url(page, pattern, *wait, accept_if_contains.as_deref())
                    .await
            }
            ActionKind::Pause(duration) => {
                sleep(*duration).await;
                Ok(None)
            }
        }
    }

    async fn await_url(
        &self,
        page: &dyn PageDriver,
        pattern: &regex::Regex,
        wait: Duration,
        accept_if_contains: Option<&str>,
    ) -> Result<Option<String>, FlowError> {
        let deadline = Instant::now() + wait;
        loop {
            let url = page
                .current_url()
                .await
                .map_err(|err| FlowError::from_adapter("page address", err))?;
            if pattern.is_match(&url) {
                return Ok(Some(format!("now at {url}")));
            }

            let now = Instant::now();
            if now >= deadline {
                if let Some(fragment) = accept_if_contains {
                    if url.contains(fragment) {
                        self.reporter.warn(format!(
                            "Address {url} does not match the expected pattern, accepting it anyway"
                        ));
                        return Ok(Some(format!("now at {url}")));
                    }
                }
                return Err(FlowError::NavigationTimeout {
                    url,
                    reason: format!(
                        "address did not match {} within {}s",
                        pattern.as_str(),
                        wait.as_secs()
                    ),
                });
            }
            sleep(self.url_poll_interval.min(deadline - now)).await;
        }
    }
}

fn resolve_value<'a>(value: &'a Value, bindings: &'a Bindings) -> Result<&'a str, FlowError> {
    match value {
        Value::Email => Ok(&bindings.email),
        Value::Password => Ok(&bindings.password),
        Value::IterationName => bindings.iteration_name.as_deref().ok_or_else(|| {
            FlowError::InvalidWorkflow("iteration name is not available here".to_string())
        }),
        Value::Literal(text) => Ok(text),
    }
}

#[async_trait]
impl StepExecutor for DefaultStepExecutor {
    async fn execute(
        &self,
        step: &Step,
        page: &dyn PageDriver,
        bindings: &Bindings,
    ) -> StepOutcome {
        let started = Instant::now();
        info!(target: "flow", step = %step.kind, budget_s = step.budget.as_secs(), "step started");

        let result = match timeout(step.budget, self.run_actions(step, page, bindings)).await {
            Ok(result) => result,
            Err(_) => Err(FlowError::StepTimeout(step.budget)),
        };

        let outcome = match result {
            Ok(()) => StepOutcome::Success,
            Err(err) => self.failure_handler.handle_failure(step, &err),
        };

        match &outcome {
            StepOutcome::Success => {}
            StepOutcome::Degraded(reason) => self.reporter.warn(format!(
                "{} failed, continuing: {reason}",
                step.status_label
            )),
            StepOutcome::Skipped(reason) => self.reporter.error(format!(
                "{} failed: {reason}. Moving on to the next iteration",
                step.status_label
            )),
            StepOutcome::Aborted(reason) => self
                .reporter
                .error(format!("{} failed: {reason}", step.status_label)),
        }
        info!(
            target: "flow",
            step = %step.kind,
            elapsed_ms = started.elapsed().as_millis() as u64,
            outcome = ?outcome,
            "step finished"
        );
        outcome
    }
}
