//! Shared primitives for the RemixPilot crates: run identifiers, step
//! kinds, run phases and the events a run publishes to observers.

use std::fmt;

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use uuid::Uuid;

/// Shared error type for the lower crates.
#[derive(Debug, Error, Clone)]
pub enum CoreError {
    #[error("{message}")]
    Message { message: String },
}

impl CoreError {
    pub fn new(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The five steps a run is built from.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    Login,
    Navigate,
    Remix,
    Publish,
    Rename,
}

impl StepKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepKind::Login => "login",
            StepKind::Navigate => "navigate",
            StepKind::Remix => "remix",
            StepKind::Publish => "publish",
            StepKind::Rename => "rename",
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "info",
            LogLevel::Success => "success",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Lifecycle phase of a run.
///
/// `Completed`, `Error` and `Stopped` are terminal; only `Idle` and the
/// terminal phases accept a new start.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunPhase {
    #[default]
    Idle,
    Starting,
    Running,
    Completed,
    Error,
    Stopped,
}

impl RunPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunPhase::Idle => "idle",
            RunPhase::Starting => "starting",
            RunPhase::Running => "running",
            RunPhase::Completed => "completed",
            RunPhase::Error => "error",
            RunPhase::Stopped => "stopped",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunPhase::Completed | RunPhase::Error | RunPhase::Stopped)
    }

    pub fn is_active(&self) -> bool {
        matches!(self, RunPhase::Starting | RunPhase::Running)
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum EventPayload {
    Log {
        message: String,
        level: LogLevel,
    },
    Status {
        status: RunPhase,
        step: Option<String>,
        iteration: Option<u32>,
        total_iterations: u32,
    },
    LoginSuccess {
        email: String,
    },
    StepSuccess {
        step: StepKind,
        iteration: u32,
    },
    NameChanged {
        iteration: u32,
        name: String,
    },
    IterationComplete {
        iteration: u32,
        total: u32,
        name: String,
    },
    CreditsUpdate {
        credits: u64,
    },
}

/// A timestamped notification published by a run.
#[derive(Clone, Debug, PartialEq)]
pub struct RunEvent {
    pub timestamp: DateTime<Utc>,
    pub payload: EventPayload,
}

impl RunEvent {
    pub fn new(payload: EventPayload) -> Self {
        Self {
            timestamp: Utc::now(),
            payload,
        }
    }

    pub fn log(level: LogLevel, message: impl Into<String>) -> Self {
        Self::new(EventPayload::Log {
            message: message.into(),
            level,
        })
    }

    /// Short kind name, e.g. `log`, `status` or `iteration-complete`.
    pub fn kind(&self) -> &'static str {
        match &self.payload {
            EventPayload::Log { .. } => "log",
            EventPayload::Status { .. } => "status",
            EventPayload::LoginSuccess { .. } => "login-success",
            EventPayload::StepSuccess { .. } => "step-success",
            EventPayload::NameChanged { .. } => "name-changed",
            EventPayload::IterationComplete { .. } => "iteration-complete",
            EventPayload::CreditsUpdate { .. } => "credits-update",
        }
    }

    /// Type tag used on the websocket channel.
    ///
    /// Step successes keep their historical per-step names
    /// (`remix-remix-success`, `remix-publish-success`).
    pub fn wire_type(&self) -> String {
        match &self.payload {
            EventPayload::StepSuccess { step, .. } => format!("remix-{}-success", step.as_str()),
            _ => format!("remix-{}", self.kind()),
        }
    }

    /// Encodes the event as `{ "type", "data", "timestamp" }`.
    pub fn to_wire(&self) -> Value {
        let data = match &self.payload {
            EventPayload::Log { message, level } => json!({
                "message": message,
                "level": level.as_str(),
                "timestamp": self.timestamp.with_timezone(&Local).format("%H:%M:%S").to_string(),
            }),
            EventPayload::Status {
                status,
                step,
                iteration,
                total_iterations,
            } => json!({
                "status": status.as_str(),
                "step": step,
                "iteration": iteration,
                "totalIterations": total_iterations,
            }),
            EventPayload::LoginSuccess { email } => json!({ "email": email }),
            EventPayload::StepSuccess { step, iteration } => json!({
                "step": step.as_str(),
                "iteration": iteration,
            }),
            EventPayload::NameChanged { iteration, name } => json!({
                "iteration": iteration,
                "name": name,
            }),
            EventPayload::IterationComplete {
                iteration,
                total,
                name,
            } => json!({
                "iteration": iteration,
                "total": total,
                "name": name,
            }),
            EventPayload::CreditsUpdate { credits } => json!({ "credits": credits }),
        };
        json!({
            "type": self.wire_type(),
            "data": data,
            "timestamp": self.timestamp.to_rfc3339(),
        })
    }
}
