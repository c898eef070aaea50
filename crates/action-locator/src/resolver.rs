//! Element resolver with fallback chain orchestration

use std::time::Duration;

use async_trait::async_trait;
use cdp_adapter::{AdapterError, ElementProbe, PageDriver};
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::{errors::LocatorError, types::*};

/// Element resolver trait
#[async_trait]
pub trait ElementResolver: Send + Sync {
    /// Resolve `element` by trying `strategies` strictly in order.
    async fn resolve(
        &self,
        page: &dyn PageDriver,
        element: &str,
        strategies: &[LocatorStrategy],
    ) -> Result<ResolvedElement, LocatorError>;
}

/// Polls each strategy until it matches or its deadline passes.
///
/// A later strategy is never consulted while an earlier one still has
/// time left, and the first match wins. Session faults end resolution
/// immediately.
#[derive(Debug, Clone)]
pub struct SequentialResolver {
    poll_interval: Duration,
}

impl Default for SequentialResolver {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl SequentialResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(Duration::from_millis(1));
        self
    }

    async fn wait_for(&self, page: &dyn PageDriver, strategy: &LocatorStrategy) -> WaitOutcome {
        let deadline = Instant::now() + strategy.timeout;
        let mut last_error = None;
        loop {
            match page.probe(&strategy.query).await {
                Ok(Some(probe)) => return WaitOutcome::Found(probe),
                Ok(None) => {}
                Err(err) if err.is_session_fault() => return WaitOutcome::Fatal(err),
                Err(err) => {
                    debug!(target: "locator", strategy = %strategy.label, error = %err, "probe failed");
                    last_error = Some(err.to_string());
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return WaitOutcome::Exhausted(last_error);
            }
            sleep(self.poll_interval.min(deadline - now)).await;
        }
    }
}

enum WaitOutcome {
    Found(ElementProbe),
    Exhausted(Option<String>),
    Fatal(AdapterError),
}

#[async_trait]
impl ElementResolver for SequentialResolver {
    async fn resolve(
        &self,
        page: &dyn PageDriver,
        element: &str,
        strategies: &[LocatorStrategy],
    ) -> Result<ResolvedElement, LocatorError> {
        if strategies.is_empty() {
            return Err(LocatorError::InvalidStrategy {
                element: element.to_string(),
                reason: "no strategies supplied".to_string(),
            });
        }

        let started = Instant::now();
        let mut attempts = Vec::with_capacity(strategies.len());

        for (index, strategy) in strategies.iter().enumerate() {
            debug!(target: "locator", element, strategy = %strategy, "trying strategy");

            let error = match self.wait_for(page, strategy).await {
                WaitOutcome::Found(probe) => {
                    let resolved = ResolvedElement {
                        element: element.to_string(),
                        strategy_index: index,
                        strategy_label: strategy.label.clone(),
                        query: strategy.query.clone(),
                        probe,
                        elapsed: started.elapsed(),
                    };
                    if resolved.used_fallback() {
                        info!(
                            target: "locator",
                            element,
                            strategy = %strategy.label,
                            index,
                            "resolved through fallback strategy"
                        );
                    } else {
                        debug!(target: "locator", element, strategy = %strategy.label, "resolved");
                    }
                    return Ok(resolved);
                }
                WaitOutcome::Exhausted(error) => error,
                WaitOutcome::Fatal(err) => {
                    warn!(target: "locator", element, error = %err, "session fault during resolution");
                    return Err(LocatorError::Adapter(err));
                }
            };

            debug!(
                target: "locator",
                element,
                strategy = %strategy.label,
                timeout_ms = strategy.timeout.as_millis() as u64,
                "strategy exhausted"
            );
            attempts.push(Attempt {
                label: strategy.label.clone(),
                timeout_ms: strategy.timeout.as_millis() as u64,
                error,
            });
        }

        Err(LocatorError::ElementNotFound {
            element: element.to_string(),
            attempts,
        })
    }
}
