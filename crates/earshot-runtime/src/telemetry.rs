//! Tracing setup

use earshot_core::{EarshotError, EarshotResult};
use tracing::Subscriber;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::{LogFormat, RuntimeConfig};

/// Build a subscriber for `config` without installing it.
///
/// `RUST_LOG` wins over `config.log_filter`.
pub fn build_subscriber(config: &RuntimeConfig) -> EarshotResult<Box<dyn Subscriber + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .map_err(|e| EarshotError::InvalidConfig(format!("log filter: {}", e)))?;

    let registry = tracing_subscriber::registry().with(filter);
    Ok(match config.log_format {
        LogFormat::Pretty => Box::new(registry.with(fmt::layer().pretty().with_target(true))),
        LogFormat::Json => Box::new(registry.with(fmt::layer().json())),
    })
}

/// Install the global tracing subscriber. Fails if one is already installed.
pub fn init_tracing(config: &RuntimeConfig) -> EarshotResult<()> {
    build_subscriber(config)?
        .try_init()
        .map_err(|e| EarshotError::InvalidConfig(format!("tracing: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_fails() {
        let config = RuntimeConfig::default();
        let _ = init_tracing(&config);
        assert!(init_tracing(&config).is_err());
    }

    #[test]
    fn test_both_formats_build() {
        for log_format in [LogFormat::Pretty, LogFormat::Json] {
            let config = RuntimeConfig {
                log_format,
                ..RuntimeConfig::default()
            };
            let subscriber = build_subscriber(&config).unwrap();
            tracing::subscriber::with_default(subscriber, || {
                tracing::info!(format = ?log_format, "subscriber installed");
            });
        }
    }
}
