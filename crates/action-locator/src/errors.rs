//! Error types for locator system

use cdp_adapter::AdapterError;
use thiserror::Error;

use crate::types::Attempt;

/// Locator error enumeration
#[derive(Debug, Error, Clone)]
pub enum LocatorError {
    /// Every strategy ran out of time
    #[error("{element} not found after {}", describe_attempts(.attempts))]
    ElementNotFound {
        element: String,
        attempts: Vec<Attempt>,
    },

    /// The strategy list cannot be used
    #[error("invalid locator for {element}: {reason}")]
    InvalidStrategy { element: String, reason: String },

    /// The browser session failed underneath the locator
    #[error("page error: {0}")]
    Adapter(#[from] AdapterError),
}

fn describe_attempts(attempts: &[Attempt]) -> String {
    attempts
        .iter()
        .map(|attempt| attempt.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl LocatorError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            LocatorError::ElementNotFound { .. } => true,
            LocatorError::InvalidStrategy { .. } => false,
            LocatorError::Adapter(err) => !err.is_session_fault(),
        }
    }

    pub fn is_session_fault(&self) -> bool {
        matches!(self, LocatorError::Adapter(err) if err.is_session_fault())
    }

    /// Get error severity (0=low, 1=medium, 2=high, 3=critical)
    pub fn severity(&self) -> u8 {
        match self {
            LocatorError::ElementNotFound { .. } => 1,
            LocatorError::InvalidStrategy { .. } => 2,
            LocatorError::Adapter(err) if err.is_session_fault() => 3,
            LocatorError::Adapter(_) => 2,
        }
    }

    /// Labels of the strategies that were tried, in order.
    pub fn attempted_labels(&self) -> Vec<String> {
        match self {
            LocatorError::ElementNotFound { attempts, .. } => {
                attempts.iter().map(|a| a.label.clone()).collect()
            }
            _ => Vec::new(),
        }
    }
}
