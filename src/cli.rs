//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Top-level CLI parser for `agentcontract`.
#[derive(Debug, Parser)]
#[command(
    name = "agentcontract",
    version,
    about = "Deterministic checks for recorded agent trajectories"
)]
pub struct Cli {
    /// The command to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Supported top-level subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show summary information about a cassette.
    Info {
        /// Path to a `.agentrun.json` (or `.yaml`) cassette.
        path: PathBuf,
    },
    /// Check that a cassette decodes into a valid run.
    Validate {
        /// Path to a cassette.
        path: PathBuf,
    },
    /// Evaluate the scenario's contract against a cassette.
    Check {
        /// Path to a cassette.
        path: PathBuf,
        /// Contract config; discovered from the cassette's directory upwards when omitted.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Write a starter `agentcontract.yml` in the current directory.
    Init,
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command};
    use clap::Parser;

    #[test]
    fn parses_info_subcommand() {
        let cli = Cli::parse_from(["agentcontract", "info", "run.agentrun.json"]);
        let Command::Info { path } = cli.command else {
            panic!("expected the info command");
        };
        assert!(path.ends_with("run.agentrun.json"));
    }

    #[test]
    fn parses_check_with_config() {
        let cli = Cli::parse_from(["agentcontract", "check", "r.json", "--config", "c.yml"]);
        match cli.command {
            Command::Check { path, config } => {
                assert_eq!(path.to_str(), Some("r.json"));
                assert_eq!(config.as_deref().and_then(|p| p.to_str()), Some("c.yml"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn validate_requires_a_path() {
        assert!(Cli::try_parse_from(["agentcontract", "validate"]).is_err());
    }

    #[test]
    fn parses_init() {
        let cli = Cli::parse_from(["agentcontract", "init"]);
        assert!(matches!(cli.command, Command::Init));
    }
}
