//! Failure handling strategies

use tracing::warn;

use crate::errors::FlowError;
use crate::types::{FailurePolicy, Step, StepOutcome};

/// Failure handler trait
pub trait FailureHandler: Send + Sync {
    /// Classify a failed step into the outcome the iteration acts on
    fn handle_failure(&self, step: &Step, error: &FlowError) -> StepOutcome;
}

/// Default failure handler implementation
///
/// Session faults always abort. Everything else follows the step's
/// declared [`FailurePolicy`].
pub struct DefaultFailureHandler;

impl DefaultFailureHandler {
    /// Create a new default failure handler
    pub fn new() -> Self {
        Self
    }
}

impl Default for DefaultFailureHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl FailureHandler for DefaultFailureHandler {
    fn handle_failure(&self, step: &Step, error: &FlowError) -> StepOutcome {
        let reason = error.to_string();
        if error.is_session_fault() {
            warn!(target: "flow", step = %step.kind, %reason, "session fault, aborting run");
            return StepOutcome::Aborted(reason);
        }

        match step.policy {
            FailurePolicy::AbortRun => {
                warn!(target: "flow", step = %step.kind, %reason, "step failed, aborting run");
                StepOutcome::Aborted(reason)
            }
            FailurePolicy::SkipIteration => {
                warn!(target: "flow", step = %step.kind, %reason, "step failed, skipping iteration");
                StepOutcome::Skipped(reason)
            }
            FailurePolicy::Tolerate => {
                warn!(target: "flow", step = %step.kind, %reason, "step failed, tolerated");
                StepOutcome::Degraded(reason)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StepKind;
    use std::time::Duration;

    fn step(policy: FailurePolicy) -> Step {
        Step {
            kind: StepKind::Publish,
            status_label: "Publishing".into(),
            actions: Vec::new(),
            policy,
            budget: Duration::from_secs(60),
        }
    }

    fn not_found() -> FlowError {
        FlowError::ElementNotFound {
            element: "Publish button".into(),
            attempts: vec!["role".into()],
        }
    }

    #[test]
    fn policy_decides_ordinary_failures() {
        let handler = DefaultFailureHandler::new();
        assert!(matches!(
            handler.handle_failure(&step(FailurePolicy::SkipIteration), &not_found()),
            StepOutcome::Skipped(_)
        ));
        assert!(matches!(
            handler.handle_failure(&step(FailurePolicy::AbortRun), &not_found()),
            StepOutcome::Aborted(_)
        ));
        assert!(matches!(
            handler.handle_failure(&step(FailurePolicy::Tolerate), &not_found()),
            StepOutcome::Degraded(_)
        ));
    }

    #[test]
    fn session_faults_override_tolerance() {
        let handler = DefaultFailureHandler::new();
        let outcome = handler.handle_failure(
            &step(FailurePolicy::Tolerate),
            &FlowError::Session("browser gone".into()),
        );
        assert_eq!(
            outcome,
            StepOutcome::Aborted("Browser session failed: browser gone".into())
        );
    }

    #[test]
    fn step_timeout_is_classified_like_any_failure() {
        let handler = DefaultFailureHandler::new();
        let outcome = handler.handle_failure(
            &step(FailurePolicy::SkipIteration),
            &FlowError::StepTimeout(Duration::from_secs(60)),
        );
        assert_eq!(outcome, StepOutcome::Skipped("Step timed out after 60s".into()));
    }
}
