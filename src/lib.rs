//! Record, replay and check agent trajectories.
//!
//! A [`trajectory::Run`] is recorded once (see [`cassette::Recorder`] and
//! [`adapters::recording::RecordingTools`]), persisted as a cassette, then
//! replayed deterministically through [`replay::ReplayEngine`] and checked
//! against a behavioral [`contract::Contract`].

pub mod adapters;
pub mod cassette;
pub mod cli;
pub mod commands;
pub mod contract;
pub mod error;
pub mod ports;
pub mod replay;
pub mod trajectory;

use clap::error::ErrorKind;
use clap::Parser;

pub use error::{Error, Result};

/// Run the CLI with the provided arguments.
///
/// `--help` and `--version` print their output and succeed.
///
/// # Errors
///
/// Returns an error when argument parsing fails or command execution fails.
pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = match cli::Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                print!("{err}");
                return Ok(());
            }
            _ => return Err(Error::Usage(err.to_string())),
        },
    };
    commands::dispatch(&cli.command)
}
