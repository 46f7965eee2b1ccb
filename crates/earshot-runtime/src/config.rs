//! Runtime configuration

use std::time::Duration;

use earshot_core::{EarshotError, EarshotResult};
use serde::{Deserialize, Deserializer};

/// Log output format
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Earshot runtime configuration
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Reconciliation cadence, e.g. `"10ms"`
    #[serde(deserialize_with = "deserialize_duration")]
    pub tick_interval: Duration,
    /// Blocking workers used for a parallel pass
    pub workers: usize,
    /// Streams needed before a pass is split across workers
    pub parallel_threshold: usize,
    /// Outgoing control packet buffer
    pub packet_buffer: usize,
    /// Default `EnvFilter` directive when `RUST_LOG` is unset
    pub log_filter: String,
    pub log_format: LogFormat,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            tick_interval: Duration::from_millis(10),
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            parallel_threshold: 64,
            packet_buffer: 1024,
            log_filter: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

impl RuntimeConfig {
    /// Parse from JSON; missing fields take their defaults
    pub fn from_json_str(json: &str) -> EarshotResult<Self> {
        let config: RuntimeConfig =
            serde_json::from_str(json).map_err(|e| EarshotError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> EarshotResult<()> {
        if self.tick_interval.is_zero() {
            return Err(EarshotError::InvalidConfig("tick_interval must be non-zero".into()));
        }
        if self.workers == 0 {
            return Err(EarshotError::InvalidConfig("workers must be at least 1".into()));
        }
        if self.packet_buffer == 0 {
            return Err(EarshotError::InvalidConfig("packet_buffer must be at least 1".into()));
        }
        Ok(())
    }
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = RuntimeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.tick_interval, Duration::from_millis(10));
    }

    #[test]
    fn test_parse_partial_json() {
        let config = RuntimeConfig::from_json_str(
            r#"{ "tick_interval": "50ms", "workers": 2, "log_format": "json" }"#,
        )
        .unwrap();

        assert_eq!(config.tick_interval, Duration::from_millis(50));
        assert_eq!(config.workers, 2);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.parallel_threshold, 64);
    }

    #[test]
    fn test_rejects_zero_interval() {
        let err = RuntimeConfig::from_json_str(r#"{ "tick_interval": "0s" }"#).unwrap_err();
        assert!(matches!(err, EarshotError::InvalidConfig(_)));
    }

    #[test]
    fn test_rejects_bad_duration() {
        assert!(RuntimeConfig::from_json_str(r#"{ "tick_interval": "soon" }"#).is_err());
    }
}
