//! Tracing subscriber setup.

use crate::config::LogSection;
use tracing_subscriber::EnvFilter;

/// Environment variable holding a filter directive that overrides the
/// configured level.
pub const LOG_ENV: &str = "ARBOR_LOG";

pub fn filter(log: &LogSection) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(&log.level))
}

/// Installs the global subscriber. Records go to stderr so that stdout
/// carries only analysis output.
pub fn init(log: &LogSection) -> anyhow::Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter(log))
        .with_writer(std::io::stderr)
        .with_target(false);
    let installed = if log.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|err| anyhow::anyhow!("failed to install log subscriber: {err}"))
}
