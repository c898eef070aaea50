//! Run lifecycle: request validation, state and the controller.

pub mod config;
pub mod controller;
pub mod state;

pub use config::{Credentials, RunConfig, RunLimits, RunRequest, ValidationError};
pub use controller::{ControllerSettings, RunController, RunRejected};
pub use state::RunState;
