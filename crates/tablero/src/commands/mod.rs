//! Command dispatch: bridges CLI args -> dashboard calls -> output formatting.

pub mod config_cmd;
pub mod reservations;
pub mod stats;
pub mod tables;
pub mod util;
pub mod watch;

use std::sync::Arc;

use tablero_core::{AuthProvider, DashboardConfig};

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a server-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    config: DashboardConfig,
    auth: Arc<dyn AuthProvider>,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Tables(args) => tables::handle(config, auth, args, global).await,
        Command::Reservations(args) => reservations::handle(config, auth, args, global).await,
        Command::Stats(args) => stats::handle(config, auth, &args, global).await,
        Command::Watch(args) => watch::handle(config, auth, &args, global).await,
        Command::Config(_) | Command::Completions(_) => Err(CliError::Internal(
            "config and completions are handled before dispatch".into(),
        )),
    }
}
