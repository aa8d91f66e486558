// 📜 Logging - tracing subscriber setup for the CLI
//
// One global subscriber, installed once at startup. The level comes from
// configuration unless RUST_LOG is set.

use anyhow::{anyhow, Result};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::SubscriberBuilder;

/// Installs the global tracing subscriber. `RUST_LOG` overrides `level`.
///
/// Output goes to stderr so CSV printed on stdout stays clean.
pub fn init_tracing(level: Option<&str>) -> Result<()> {
    let default_level = level.unwrap_or("info");
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    SubscriberBuilder::default()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow!("failed to install tracing subscriber: {}", err))?;

    Ok(())
}
