use chrono::{DateTime, Utc};
use remixpilot_core_types::{RunId, RunPhase};
use serde::Serialize;

/// Progress of the current (or most recent) run.
///
/// Written only by the run controller; observers read snapshots.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunState {
    pub run_id: Option<RunId>,
    pub phase: RunPhase,
    pub current_iteration: u32,
    pub total_iterations: u32,
    /// Iterations that earned credit.
    pub completed_iterations: u32,
    pub credits: u64,
    pub last_error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunState {
    pub(crate) fn starting(run_id: RunId, total_iterations: u32) -> Self {
        Self {
            run_id: Some(run_id),
            phase: RunPhase::Starting,
            total_iterations,
            started_at: Some(Utc::now()),
            ..Self::default()
        }
    }

    pub fn is_active(&self) -> bool {
        self.phase.is_active()
    }
}
