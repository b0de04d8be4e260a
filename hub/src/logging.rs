//! Tracing subscriber setup.

use tracing_subscriber::{
    filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

use crate::{
    core::LoggingConfig,
    error::{HubError, HubResult},
};

/// Install the global subscriber. `RUST_LOG` overrides the configured level.
///
/// Fails with [`HubError::Config`] if the level does not parse or a
/// subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> HubResult<()> {
    let default_directive = config
        .level
        .parse::<LevelFilter>()
        .map_err(|e| HubError::Config(format!("invalid log level '{}': {}", config.level, e)))?;
    let filter = EnvFilter::builder()
        .with_default_directive(default_directive.into())
        .from_env_lossy();

    let fmt_layer = if config.json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(filter)
        .try_init()
        .map_err(|e| HubError::Config(format!("logging already initialized: {}", e)))
}
