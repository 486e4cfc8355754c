//! Crate-level error aggregating every layer.

use std::path::PathBuf;

use crate::cassette::CassetteError;
use crate::contract::{ConfigError, SpecError};
use crate::ports::ToolError;
use crate::replay::ReplayError;
use crate::trajectory::RunError;

/// Any error surfaced by the library or the CLI.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Command-line parsing failed.
    #[error("{0}")]
    Usage(String),
    /// Cassette encoding, decoding or I/O.
    #[error(transparent)]
    Cassette(#[from] CassetteError),
    /// Rejected append to a run.
    #[error(transparent)]
    Run(#[from] RunError),
    /// Replay divergence.
    #[error(transparent)]
    Replay(#[from] ReplayError),
    /// Invalid assertion or policy declaration.
    #[error(transparent)]
    Spec(#[from] SpecError),
    /// Unreadable contract configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Tool port failure.
    #[error(transparent)]
    Tool(#[from] ToolError),
    /// `init` refused to overwrite an existing file.
    #[error("{} already exists", .0.display())]
    AlreadyExists(PathBuf),
    /// Writing a file failed.
    #[error("failed to write {path}: {source}")]
    Io {
        /// Target path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// A contract evaluated with failing checks.
    #[error("contract failed for scenario '{scenario}': {failures} check(s) failed")]
    ContractFailed {
        /// Evaluated scenario.
        scenario: String,
        /// Number of failed checks.
        failures: usize,
    },
}

/// Crate-wide result alias.
pub type Result<T, E = Error> = std::result::Result<T, E>;
