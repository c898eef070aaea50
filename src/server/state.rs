use std::sync::Arc;

use remixpilot_core_types::RunEvent;
use remixpilot_event_bus::InMemoryBus;

use crate::auth::SessionStore;
use crate::config::AppConfig;
use crate::run::RunController;

/// Shared handles for every request handler.
#[derive(Clone)]
pub struct ServeState {
    pub controller: RunController,
    pub sessions: Arc<SessionStore>,
    pub bus: Arc<InMemoryBus<RunEvent>>,
    pub config: Arc<AppConfig>,
}

impl ServeState {
    pub fn new(
        controller: RunController,
        sessions: Arc<SessionStore>,
        bus: Arc<InMemoryBus<RunEvent>>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            controller,
            sessions,
            bus,
            config,
        }
    }
}
