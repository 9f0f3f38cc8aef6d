//! Logging setup using tracing.
//!
//! Log lines go to stderr so that stdout stays free for outbound messages.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Default filter when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "info";

/// Initialize the global subscriber.
///
/// `RUST_LOG` wins over `filter`.
///
/// # Errors
/// Fails if the filter does not parse or a subscriber is already installed.
pub fn init_logging(filter: &str) -> anyhow::Result<()> {
    let filter_layer = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(filter))?;

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true);

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(filter_layer)
        .try_init()?;

    tracing::debug!(filter = %filter, "logging initialized");
    Ok(())
}

/// Initialize logging for unit tests (captured by the test harness)
#[cfg(test)]
pub(crate) fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("debug")
        .try_init();
}
