use clap::Subcommand;

use super::run::RunArgs;
use super::serve::ServeArgs;

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Serve the control panel API, WebSocket feed and static files
    Serve(ServeArgs),

    /// Execute a single run from the command line
    Run(RunArgs),
}
