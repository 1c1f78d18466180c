//! Diagnostic logging setup for the command line tools

use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter
pub const LOG_ENV: &str = "PERMFIND_LOG";

/// Install a stderr logger filtered by `PERMFIND_LOG`, defaulting to `warn`
///
/// Stdout carries results, so nothing is ever logged there.
pub fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
