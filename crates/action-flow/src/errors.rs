//! Step execution error types

use std::time::Duration;

use action_locator::LocatorError;
use cdp_adapter::{AdapterError, AdapterErrorKind};
use thiserror::Error;

/// Step execution errors
#[derive(Debug, Error, Clone)]
pub enum FlowError {
    /// Workflow structure is unusable
    #[error("Invalid workflow: {0}")]
    InvalidWorkflow(String),

    /// No strategy found the element in time
    #[error("{element} not found (tried {})", .attempts.join(", "))]
    ElementNotFound {
        element: String,
        attempts: Vec<String>,
    },

    /// Element was found but the interaction failed
    #[error("Interaction with {element} failed: {reason}")]
    Interaction { element: String, reason: String },

    /// Page did not finish loading
    #[error("Navigation to {url} failed: {reason}")]
    NavigationTimeout { url: String, reason: String },

    /// Browser session is gone
    #[error("Browser session failed: {0}")]
    Session(String),

    /// Step exceeded its total budget
    #[error("Step timed out after {}s", .0.as_secs())]
    StepTimeout(Duration),
}

impl FlowError {
    /// Session faults end the run whatever the step policy says.
    pub fn is_session_fault(&self) -> bool {
        matches!(self, FlowError::Session(_))
    }

    pub(crate) fn from_adapter(element: &str, err: AdapterError) -> Self {
        if err.is_session_fault() {
            return FlowError::Session(err.to_string());
        }
        match err.kind {
            AdapterErrorKind::TargetNotFound => FlowError::ElementNotFound {
                element: element.to_string(),
                attempts: Vec::new(),
            },
            _ => FlowError::Interaction {
                element: element.to_string(),
                reason: err.to_string(),
            },
        }
    }

    pub(crate) fn from_navigation(url: &str, err: AdapterError) -> Self {
        if err.is_session_fault() {
            return FlowError::Session(err.to_string());
        }
        FlowError::NavigationTimeout {
            url: url.to_string(),
            reason: err.to_string(),
        }
    }
}

impl From<LocatorError> for FlowError {
    fn from(err: LocatorError) -> Self {
        match err {
            LocatorError::ElementNotFound { element, attempts } => FlowError::ElementNotFound {
                element,
                attempts: attempts.into_iter().map(|a| a.label).collect(),
            },
            LocatorError::InvalidStrategy { element, reason } => {
                FlowError::InvalidWorkflow(format!("{element}: {reason}"))
            }
            LocatorError::Adapter(err) if err.is_session_fault() => {
                FlowError::Session(err.to_string())
            }
            LocatorError::Adapter(err) => FlowError::Interaction {
                element: String::from("page"),
                reason: err.to_string(),
            },
        }
    }
}
