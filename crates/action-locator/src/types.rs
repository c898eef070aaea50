//! Core types for locator system

use std::fmt;
use std::time::Duration;

use cdp_adapter::{ElementProbe, ElementQuery};
use serde::Serialize;

/// Deadline applied to a strategy that does not set one.
pub const DEFAULT_STRATEGY_TIMEOUT: Duration = Duration::from_secs(8);

/// Pause between probes of the same strategy.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// One way of finding an element, with its own deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatorStrategy {
    /// Short label for logs, e.g. `role`, `text`, `css`.
    pub label: String,
    pub query: ElementQuery,
    pub timeout: Duration,
}

impl LocatorStrategy {
    pub fn new(label: impl Into<String>, query: ElementQuery) -> Self {
        Self {
            label: label.into(),
            query,
            timeout: DEFAULT_STRATEGY_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout_secs(self, secs: u64) -> Self {
        self.with_timeout(Duration::from_secs(secs))
    }

    pub fn labeled(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

impl fmt::Display for LocatorStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label, self.query)
    }
}

/// Outcome of a single strategy during resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attempt {
    pub label: String,
    pub timeout_ms: u64,
    /// Last non-fatal probe error seen, if any.
    pub error: Option<String>,
}

impl fmt::Display for Attempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}ms)", self.label, self.timeout_ms)?;
        if let Some(error) = &self.error {
            write!(f, ": {error}")?;
        }
        Ok(())
    }
}

/// Handle to an element found on the page.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedElement {
    pub element: String,
    /// Position of the winning strategy in the supplied list.
    pub strategy_index: usize,
    pub strategy_label: String,
    pub query: ElementQuery,
    pub probe: ElementProbe,
    pub elapsed: Duration,
}

impl ResolvedElement {
    /// True when a strategy other than the first one found the element.
    pub fn used_fallback(&self) -> bool {
        self.strategy_index > 0
    }
}
