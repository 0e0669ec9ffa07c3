use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const DEFAULT_LOG_FILTER: &str = "info";
pub const ENV_VAR_LOG_FILE: &str = "MESHVPN_LOG_FILE";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Initializes the global `tracing` subscriber appending to the file at `log_path`.
///
/// Verbosity comes from `RUST_LOG`, falling back to `"info"`. Set
/// `RUST_LOG=meshvpn_lib=trace` to see the raw output of every `route` run.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn setup_log_file(log_path: &Path) -> Result<(), io::Error> {
    let file = OpenOptions::new().create(true).append(true).open(log_path)?;
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
        .with(env_filter())
        .init();
    tracing::debug!("logging initialized with file output: {}", log_path.display());
    Ok(())
}

/// Initializes the global `tracing` subscriber writing to stderr.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn setup_stderr() {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr).with_ansi(true))
        .with(env_filter())
        .init();
    tracing::debug!("logging initialized with stderr output");
}
