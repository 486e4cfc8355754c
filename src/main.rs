//! Binary entrypoint for the `agentcontract` CLI.

use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_tracing();

    match agentcontract::run(std::env::args()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

/// Log to stderr, filtered by `AGENTCONTRACT_LOG` (default `warn`).
fn init_tracing() {
    let filter = EnvFilter::try_from_env("AGENTCONTRACT_LOG")
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
