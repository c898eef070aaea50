pub mod app;
pub mod commands;
pub mod env;
pub mod run;
pub mod runtime;
pub mod serve;

pub use run::{cmd_run, RunArgs};
pub use serve::{cmd_serve, ServeArgs};
