//! Event emission helpers shared by the executor, the iteration engine
//! and the run controller.

use std::sync::Arc;

use remixpilot_core_types::{EventPayload, LogLevel, RunEvent, RunPhase};
use remixpilot_event_bus::EventSink;
use tracing::{error, info, warn};

/// Publishes run events and mirrors log lines to tracing.
#[derive(Clone)]
pub struct Reporter {
    sink: Arc<dyn EventSink>,
}

impl Reporter {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self { sink }
    }

    pub fn emit(&self, payload: EventPayload) {
        self.sink.emit(RunEvent::new(payload));
    }

    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            LogLevel::Info | LogLevel::Success => info!(target: "run", "{message}"),
            LogLevel::Warn => warn!(target: "run", "{message}"),
            LogLevel::Error => error!(target: "run", "{message}"),
        }
        self.emit(EventPayload::Log { message, level });
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.log(LogLevel::Success, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.log(LogLevel::Warn, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }

    pub fn status(
        &self,
        status: RunPhase,
        step: Option<String>,
        iteration: Option<u32>,
        total_iterations: u32,
    ) {
        self.emit(EventPayload::Status {
            status,
            step,
            iteration,
            total_iterations,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use remixpilot_event_bus::{EventBus, InMemoryBus};

    #[test]
    fn log_lines_become_events() {
        let bus = InMemoryBus::<RunEvent>::new(8);
        let mut rx = bus.subscribe();
        let reporter = Reporter::new(bus.clone());

        reporter.warn("dialog did not open");
        reporter.status(RunPhase::Running, Some("Publishing".into()), Some(2), 5);

        match rx.try_recv().unwrap().payload {
            EventPayload::Log { message, level } => {
                assert_eq!(message, "dialog did not open");
                assert_eq!(level, LogLevel::Warn);
            }
            other => panic!("unexpected payload {other:?}"),
        }
        assert_eq!(rx.try_recv().unwrap().kind(), "status");
    }
}
