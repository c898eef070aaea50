//! Workflow execution layer
//!
//! Steps are interpreted by the [`StepExecutor`], failures are classified
//! by the [`FailureHandler`], and one iteration of the remix cycle is
//! driven by the [`IterationEngine`]. [`WorkflowTemplate`] holds the
//! concrete steps for a site.

pub mod errors;
pub mod executor;
pub mod iteration;
pub mod reporter;
pub mod strategies;
pub mod types;
pub mod workflow;

pub use errors::FlowError;
pub use executor::{DefaultStepExecutor, StepExecutor};
pub use iteration::{iteration_name, IterationContext, IterationEngine};
pub use reporter::Reporter;
pub use strategies::{DefaultFailureHandler, FailureHandler};
pub use types::*;
pub use workflow::{validate_step, SiteProfile, WorkflowTemplate};
