//! Step and action model

use std::fmt;
use std::time::Duration;

use action_locator::LocatorStrategy;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub use remixpilot_core_types::StepKind;

/// What a failed step does to the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Give up on the current iteration, carry on with the next one.
    SkipIteration,
    /// End the whole run with an error.
    AbortRun,
    /// Record the failure and continue as if the step had succeeded.
    Tolerate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Necessity {
    Required,
    /// A failure is logged and the step moves on.
    Optional,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// The project address given for the run.
    ProjectUrl,
    Fixed(String),
}

/// Text typed by a fill action.
#[derive(Clone, PartialEq, Eq)]
pub enum Value {
    Email,
    Password,
    IterationName,
    Literal(String),
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Email => f.write_str("Email"),
            Value::Password => f.write_str("Password"),
            Value::IterationName => f.write_str("IterationName"),
            Value::Literal(text) => f.debug_tuple("Literal").field(text).finish(),
        }
    }
}

/// A named element plus the ordered ways of finding it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementSpec {
    pub name: String,
    pub strategies: Vec<LocatorStrategy>,
}

impl ElementSpec {
    pub fn new(name: impl Into<String>, strategies: Vec<LocatorStrategy>) -> Self {
        Self {
            name: name.into(),
            strategies,
        }
    }
}

#[derive(Debug, Clone)]
pub enum ActionKind {
    Goto(Target),
    Click(ElementSpec),
    Fill(ElementSpec, Value),
    /// Succeeds once the element is present.
    Await(ElementSpec),
    /// Polls the page address until it matches `pattern`. On timeout the
    /// action still succeeds when the address contains `accept_if_contains`.
    AwaitUrl {
        pattern: Regex,
        timeout: Duration,
        accept_if_contains: Option<String>,
    },
    Pause(Duration),
}

#[derive(Debug, Clone)]
pub struct Action {
    pub label: String,
    pub kind: ActionKind,
    pub necessity: Necessity,
}

impl Action {
    pub fn required(label: impl Into<String>, kind: ActionKind) -> Self {
        Self {
            label: label.into(),
            kind,
            necessity: Necessity::Required,
        }
    }

    pub fn optional(label: impl Into<String>, kind: ActionKind) -> Self {
        Self {
            label: label.into(),
            kind,
            necessity: Necessity::Optional,
        }
    }

    pub fn is_optional(&self) -> bool {
        self.necessity == Necessity::Optional
    }
}

/// A named unit of browser work with one failure policy and a total budget.
#[derive(Debug, Clone)]
pub struct Step {
    pub kind: StepKind,
    /// Human-readable label shown in status events.
    pub status_label: String,
    pub actions: Vec<Action>,
    pub policy: FailurePolicy,
    pub budget: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Success,
    /// Failed under a tolerate policy.
    Degraded(String),
    /// The rest of the iteration is abandoned.
    Skipped(String),
    /// The run must end.
    Aborted(String),
}

impl StepOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, StepOutcome::Success)
    }

    /// Whether the iteration may go on to its next step.
    pub fn proceeds(&self) -> bool {
        matches!(self, StepOutcome::Success | StepOutcome::Degraded(_))
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            StepOutcome::Success => None,
            StepOutcome::Degraded(r) | StepOutcome::Skipped(r) | StepOutcome::Aborted(r) => {
                Some(r)
            }
        }
    }
}

/// Per-run values substituted into actions.
#[derive(Clone)]
pub struct Bindings {
    pub project_url: String,
    pub email: String,
    pub password: String,
    pub iteration_name: Option<String>,
}

impl Bindings {
    pub fn with_iteration_name(&self, name: impl Into<String>) -> Self {
        Self {
            iteration_name: Some(name.into()),
            ..self.clone()
        }
    }
}

impl fmt::Debug for Bindings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bindings")
            .field("project_url", &self.project_url)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("iteration_name", &self.iteration_name)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    pub step: StepKind,
    pub outcome: StepOutcome,
    pub elapsed: Duration,
}

/// How an iteration ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IterationEnd {
    /// Every step succeeded or was tolerated; the cycle counts.
    Counted,
    Skipped { step: StepKind, reason: String },
    Aborted { step: StepKind, reason: String },
    /// Stop was requested between steps.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IterationResult {
    pub iteration: u32,
    pub name: String,
    /// Credits earned by this iteration; zero unless counted.
    pub credits: u64,
    pub steps: Vec<StepRecord>,
    pub end: IterationEnd,
}

impl IterationResult {
    pub fn is_counted(&self) -> bool {
        self.end == IterationEnd::Counted
    }

    pub fn outcome_of(&self, step: StepKind) -> Option<&StepOutcome> {
        self.steps.iter().find(|r| r.step == step).map(|r| &r.outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bindings_debug_hides_password() {
        let bindings = Bindings {
            project_url: "https://example.test/p/1".into(),
            email: "a@b.c".into(),
            password: "hunter2".into(),
            iteration_name: None,
        };
        let debug = format!("{bindings:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
        let named = bindings.with_iteration_name("STORE2");
        assert_eq!(named.iteration_name.as_deref(), Some("STORE2"));
        assert_eq!(named.password, "hunter2");
    }

    #[test]
    fn outcome_progression() {
        assert!(StepOutcome::Success.proceeds());
        assert!(StepOutcome::Degraded("x".into()).proceeds());
        assert!(!StepOutcome::Skipped("x".into()).proceeds());
        assert_eq!(StepOutcome::Aborted("boom".into()).reason(), Some("boom"));
    }
}
