//! `agentcontract.yml` loading and per-scenario contract assembly.
//!
//! ```yaml
//! version: "1"
//! defaults:
//!   assertions:
//!     - type: contains
//!       target: final_response
//!       value: refund
//! overrides:
//!   refund-happy-path:
//!     assertions:
//!       - type: called_count
//!         target: tool_call:lookup_order:result
//!         value: 1
//! policies:
//!   - name: allowed-tools
//!     type: tool_allowlist
//!     tools: [lookup_order, check_eligibility, process_refund]
//! ```
//!
//! Sections this crate does not evaluate (`scenarios`, `replay`, `budgets`,
//! `reporting`) are accepted and ignored.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};

use super::assertion::AssertionSpec;
use super::policy::PolicySpec;
use super::{Contract, ContractSpec, SpecError};

/// File name searched for by [`ContractConfig::discover`].
pub const CONFIG_FILE: &str = "agentcontract.yml";

/// Starter configuration written by `agentcontract init`.
pub const STARTER_CONFIG: &str = r#"version: "1"

defaults:
  assertions:
    - type: contains
      target: final_response
      value: ""  # customize this

# overrides:
#   my-scenario:
#     assertions:
#       - type: called_count
#         target: tool_call:lookup_order:result
#         value: 1

policies:
  - name: allowed-tools
    type: tool_allowlist
    tools: []  # list your agent's tools here
"#;

/// Errors raised while reading a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Config file path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The file is not a valid configuration document.
    #[error("invalid config {path}: {message}")]
    Parse {
        /// Config file path, empty for in-memory documents.
        path: PathBuf,
        /// Parser message.
        message: String,
    },
}

/// Assertions shared by every scenario.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Defaults {
    /// Default assertions.
    #[serde(default, deserialize_with = "null_as_default")]
    pub assertions: Vec<AssertionSpec>,
}

/// Extra assertions for one scenario.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioOverride {
    /// Assertions appended after the defaults.
    #[serde(default, deserialize_with = "null_as_default")]
    pub assertions: Vec<AssertionSpec>,
}

/// Parsed `agentcontract.yml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractConfig {
    /// Config format version.
    #[serde(default = "default_version", deserialize_with = "scalar_as_string")]
    pub version: String,
    /// Assertions applied to every scenario.
    #[serde(default, deserialize_with = "null_as_default")]
    pub defaults: Defaults,
    /// Per-scenario assertion additions, keyed by scenario name.
    #[serde(default, deserialize_with = "null_as_default")]
    pub overrides: BTreeMap<String, ScenarioOverride>,
    /// Policies applied to every scenario.
    #[serde(default, deserialize_with = "null_as_default")]
    pub policies: Vec<PolicySpec>,
}

fn default_version() -> String {
    "1".to_string()
}

impl Default for ContractConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            defaults: Defaults::default(),
            overrides: BTreeMap::new(),
            policies: Vec::new(),
        }
    }
}

impl ContractConfig {
    /// Parse a YAML document. An empty document yields the default config.
    ///
    /// Assertion and policy specs are only checked for shape here; their
    /// contents are validated by [`ContractConfig::contract_for`].
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] if the document does not match the schema.
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let parsed: Option<Self> = serde_yaml::from_str(text).map_err(|e| ConfigError::Parse {
            path: PathBuf::new(),
            message: e.to_string(),
        })?;
        Ok(parsed.unwrap_or_default())
    }

    /// Read and parse a config file.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`] or [`ConfigError::Parse`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml_str(&text).map_err(|err| match err {
            ConfigError::Parse { message, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                message,
            },
            other => other,
        })?;
        tracing::debug!(path = %path.display(), "loaded contract config");
        Ok(config)
    }

    /// Find the nearest `agentcontract.yml` at or above `start` and load it.
    ///
    /// `start` may be a file, in which case the search begins in its
    /// directory. Falls back to the default config when nothing is found.
    ///
    /// # Errors
    ///
    /// Any error from [`ContractConfig::load`] on the file that was found.
    pub fn discover(start: &Path) -> Result<Self, ConfigError> {
        if let Some(path) = Self::find(start) {
            return Self::load(&path);
        }
        tracing::debug!(start = %start.display(), "no contract config found, using defaults");
        Ok(Self::default())
    }

    /// Path of the nearest `agentcontract.yml` at or above `start`.
    #[must_use]
    pub fn find(start: &Path) -> Option<PathBuf> {
        let dir = if start.is_file() {
            start.parent()?
        } else {
            start
        };
        let mut candidates = dir.ancestors().map(|d| d.join(CONFIG_FILE));
        candidates.find(|candidate| candidate.is_file())
    }

    /// Declared contract for `scenario`: defaults, then that scenario's
    /// overrides, then every policy.
    #[must_use]
    pub fn spec_for(&self, scenario: &str) -> ContractSpec {
        let mut assertions = self.defaults.assertions.clone();
        if let Some(extra) = self.overrides.get(scenario) {
            assertions.extend(extra.assertions.iter().cloned());
        }
        ContractSpec {
            assertions,
            policies: self.policies.clone(),
        }
    }

    /// Compiled contract for `scenario`.
    ///
    /// # Errors
    ///
    /// Any [`SpecError`] from compiling the assembled specs.
    pub fn contract_for(&self, scenario: &str) -> Result<Contract, SpecError> {
        Contract::compile(&self.spec_for(scenario))
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn scalar_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match serde_yaml::Value::deserialize(deserializer)? {
        serde_yaml::Value::Null => Ok(default_version()),
        serde_yaml::Value::String(s) => Ok(s),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        serde_yaml::Value::Bool(b) => Ok(b.to_string()),
        _ => Err(D::Error::custom("expected a scalar")),
    }
}
