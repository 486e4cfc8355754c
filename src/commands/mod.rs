//! Command dispatch and handlers.

pub mod check;
pub mod info;
pub mod init;
pub mod validate;

use crate::cli::Command;
use crate::Result;

/// Dispatch a parsed command to its handler.
///
/// # Errors
///
/// Returns an error if the selected command handler fails.
pub fn dispatch(command: &Command) -> Result<()> {
    match command {
        Command::Info { path } => info::run(path),
        Command::Validate { path } => validate::run(path),
        Command::Check { path, config } => check::run(path, config.as_deref()),
        Command::Init => init::run(std::path::Path::new(".")),
    }
}
