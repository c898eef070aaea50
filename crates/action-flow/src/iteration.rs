//! One pass of the remix cycle.

use std::sync::Arc;

use cdp_adapter::PageDriver;
use remixpilot_core_types::{EventPayload, RunPhase};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::executor::StepExecutor;
use crate::reporter::Reporter;
use crate::types::*;

/// Name given to the account during iteration `iteration` (1-based).
///
/// The suffix is offset by one: iteration 1 of base `STORE` yields `STORE2`.
pub fn iteration_name(base: &str, iteration: u32) -> String {
    format!("{base}{}", iteration + 1)
}

pub struct IterationContext<'a> {
    /// 1-based index of this iteration.
    pub iteration: u32,
    pub total: u32,
    pub base_name: &'a str,
    pub bindings: &'a Bindings,
    /// Checked before every step.
    pub cancel: &'a CancellationToken,
}

/// Runs the iteration steps in order and decides whether the cycle counts.
pub struct IterationEngine {
    executor: Arc<dyn StepExecutor>,
    reporter: Reporter,
    credits_per_cycle: u64,
}

impl IterationEngine {
    pub fn new(executor: Arc<dyn StepExecutor>, reporter: Reporter, credits_per_cycle: u64) -> Self {
        Self {
            executor,
            reporter,
            credits_per_cycle,
        }
    }

    pub async fn run_iteration(
        &self,
        steps: &[Step],
        ctx: IterationContext<'_>,
        page: &dyn PageDriver,
    ) -> IterationResult {
        let name = iteration_name(ctx.base_name, ctx.iteration);
        let bindings = ctx.bindings.with_iteration_name(name.clone());
        let mut records = Vec::with_capacity(steps.len());

        let finish = |records: Vec<StepRecord>, end: IterationEnd, credits: u64| IterationResult {
            iteration: ctx.iteration,
            name: name.clone(),
            credits,
            steps: records,
            end,
        };

        for step in steps {
            if ctx.cancel.is_cancelled() {
                debug!(target: "flow", iteration = ctx.iteration, step = %step.kind, "cancelled before step");
                return finish(records, IterationEnd::Cancelled, 0);
            }

            self.reporter.status(
                RunPhase::Running,
                Some(format!(
                    "[{}/{}] {}",
                    ctx.iteration, ctx.total, step.status_label
                )),
                Some(ctx.iteration),
                ctx.total,
            );
            if step.kind == StepKind::Rename {
                self.reporter.info(format!("Renaming account to {name}"));
            }

            let started = Instant::now();
            let outcome = self.executor.execute(step, page, &bindings).await;
            records.push(StepRecord {
                step: step.kind,
                outcome: outcome.clone(),
                elapsed: started.elapsed(),
            });

            match outcome {
                StepOutcome::Success => self.announce(step.kind, ctx.iteration, &name),
                StepOutcome::Degraded(_) => {}
                StepOutcome::Skipped(reason) => {
                    return finish(
                        records,
                        IterationEnd::Skipped {
                            step: step.kind,
                            reason,
                        },
                        0,
                    );
                }
                StepOutcome::Aborted(reason) => {
                    return finish(
                        records,
                        IterationEnd::Aborted {
                            step: step.kind,
                            reason,
                        },
                        0,
                    );
                }
            }
        }

        finish(records, IterationEnd::Counted, self.credits_per_cycle)
    }

    fn announce(&self, step: StepKind, iteration: u32, name: &str) {
        match step {
            StepKind::Remix => {
                self.reporter.success("Remix done");
                self.reporter
                    .emit(EventPayload::StepSuccess { step, iteration });
            }
            StepKind::Publish => {
                self.reporter.success("Published");
                self.reporter
                    .emit(EventPayload::StepSuccess { step, iteration });
            }
            StepKind::Rename => {
                self.reporter.success(format!("Account renamed to {name}"));
                self.reporter.emit(EventPayload::NameChanged {
                    iteration,
                    name: name.to_string(),
                });
            }
            StepKind::Login | StepKind::Navigate => {}
        }
    }
}
