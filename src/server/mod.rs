//! HTTP and WebSocket surface over the run controller.

mod router;
mod state;

pub use router::build_router;
pub use state::ServeState;
