//! Lossless encoding of a [`Run`] to and from its persisted document.
//!
//! The document is a JSON value. JSON files are written pretty-printed and
//! YAML files via `serde_yaml`; the format is chosen from the extension.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::trajectory::Run;

/// Errors raised while encoding, decoding or persisting a cassette.
#[derive(Debug, thiserror::Error)]
pub enum CassetteError {
    /// The document does not describe a valid run.
    #[error("malformed cassette: {0}")]
    Malformed(String),
    /// The run could not be turned into a document.
    #[error("failed to encode cassette: {0}")]
    Encode(String),
    /// Reading or writing the cassette file failed.
    #[error("cassette I/O error at {path}: {source}")]
    Io {
        /// File that was being accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// On-disk cassette formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// `.json` and any unrecognised extension.
    Json,
    /// `.yaml` / `.yml`.
    Yaml,
}

impl Format {
    /// Pick the format from a file extension.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml" | "yml") => Self::Yaml,
            _ => Self::Json,
        }
    }
}

/// Encode a run as a document.
///
/// # Errors
///
/// Returns [`CassetteError::Encode`] if a value cannot be represented as JSON.
pub fn encode(run: &Run) -> Result<Value, CassetteError> {
    serde_json::to_value(run).map_err(encode_error)
}

/// Decode a document into a run.
///
/// # Errors
///
/// Returns [`CassetteError::Malformed`] if a field has the wrong shape, turn
/// indices are not contiguous from zero, or a tool-call id repeats.
pub fn decode(document: Value) -> Result<Run, CassetteError> {
    serde_json::from_value(document).map_err(malformed)
}

/// Render a run in the given format.
///
/// # Errors
///
/// Returns [`CassetteError::Encode`] if serialization fails.
pub fn to_string(run: &Run, format: Format) -> Result<String, CassetteError> {
    let document = encode(run)?;
    match format {
        Format::Json => {
            let mut text = serde_json::to_string_pretty(&document).map_err(encode_error)?;
            text.push('\n');
            Ok(text)
        }
        Format::Yaml => serde_yaml::to_string(&document).map_err(encode_error),
    }
}

/// Parse a run from text in the given format.
///
/// # Errors
///
/// Returns [`CassetteError::Malformed`] if the text is not valid for the
/// format or does not describe a valid run.
pub fn from_str(text: &str, format: Format) -> Result<Run, CassetteError> {
    let document: Value = match format {
        Format::Json => serde_json::from_str(text).map_err(malformed)?,
        Format::Yaml => serde_yaml::from_str(text).map_err(malformed)?,
    };
    decode(document)
}

/// Write a run to `path`, creating parent directories.
///
/// # Errors
///
/// Returns an error if encoding fails or the file cannot be written.
pub fn save(run: &Run, path: &Path) -> Result<(), CassetteError> {
    let text = to_string(run, Format::from_path(path))?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_error(parent))?;
    }
    std::fs::write(path, text).map_err(io_error(path))?;
    tracing::debug!(path = %path.display(), turns = run.turns().len(), "cassette written");
    Ok(())
}

/// Read a run from `path`.
///
/// # Errors
///
/// Returns [`CassetteError::Io`] if the file cannot be read and
/// [`CassetteError::Malformed`] if its contents are invalid.
pub fn load(path: &Path) -> Result<Run, CassetteError> {
    let text = std::fs::read_to_string(path).map_err(io_error(path))?;
    let run = from_str(&text, Format::from_path(path))?;
    tracing::debug!(
        path = %path.display(),
        scenario = %run.metadata.scenario,
        turns = run.turns().len(),
        "cassette loaded"
    );
    Ok(run)
}

fn encode_error(err: impl ToString) -> CassetteError {
    CassetteError::Encode(err.to_string())
}

fn malformed(err: impl ToString) -> CassetteError {
    CassetteError::Malformed(err.to_string())
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> CassetteError + '_ {
    move |source| CassetteError::Io {
        path: path.to_path_buf(),
        source,
    }
}
