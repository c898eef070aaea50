//! RemixPilot: drives a login followed by repeated remix, publish and
//! rename cycles in a browser, with an HTTP/WebSocket control panel.
//!
//! The workflow engine lives in the workspace crates (`action-locator`,
//! `action-flow`, `cdp-adapter`); this crate owns the run lifecycle and
//! everything around it.

pub mod auth;
pub mod cli;
pub mod config;
pub mod errors;
pub mod metrics;
pub mod run;
pub mod server;

pub use config::AppConfig;
pub use run::{RunController, RunRejected, RunRequest, RunState};
