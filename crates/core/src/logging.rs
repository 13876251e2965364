//! Structured logging infrastructure for the residency verifier.
//!
//! Log level comes from `RUST_LOG` when set, otherwise from
//! [`LoggingConfig::level`]. Verified address fields never reach a log
//! statement anywhere in the workspace; only protocol names, error kinds and
//! resolved districts are recorded.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Initialize the logging system from configuration.
///
/// Safe to call more than once; later calls leave the first subscriber in
/// place.
///
/// # Example
/// ```no_run
/// use residency_core::{config::LoggingConfig, logging};
///
/// logging::init(&LoggingConfig::default());
/// tracing::info!(protocol = "mdoc", "verifier started");
/// ```
pub fn init(config: &LoggingConfig) {
    let filter = env_filter(&config.level);
    let registry = tracing_subscriber::registry().with(filter);

    let result = if config.json {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(true))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .try_init()
    };

    if result.is_err() {
        tracing::debug!("global subscriber already installed");
    }
}

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}
