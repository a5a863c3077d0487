//! Console configuration and endpoint derivation.

use rl_telemetry::TELEMETRY_CAPACITY;
use rl_types::{ConfigError, FIXED_CONFIDENCE};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::consumer::StreamConsumerConfig;

pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8001";
/// Fixed delay between a disconnect and the next connection attempt.
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 3000;

pub const ENV_BACKEND_URL: &str = "RISKLENS_BACKEND_URL";
pub const ENV_RECONNECT_DELAY_MS: &str = "RISKLENS_RECONNECT_DELAY_MS";

/// Configuration for a console session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsoleConfig {
    /// Base HTTP(S) URL of the analysis backend.
    pub backend_url: String,
    pub reconnect_delay_ms: u64,
    pub buffer_capacity: usize,
    /// Confidence attached to successful analysis results.
    pub fixed_confidence: u8,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            reconnect_delay_ms: DEFAULT_RECONNECT_DELAY_MS,
            buffer_capacity: TELEMETRY_CAPACITY,
            fixed_confidence: FIXED_CONFIDENCE,
        }
    }
}

impl ConsoleConfig {
    /// Defaults overridden by `RISKLENS_BACKEND_URL` and
    /// `RISKLENS_RECONNECT_DELAY_MS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ConsoleConfig::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup(ENV_BACKEND_URL) {
            config.backend_url = url;
        }

        if let Some(raw) = lookup(ENV_RECONNECT_DELAY_MS) {
            config.reconnect_delay_ms = raw.trim().parse().map_err(|e| ConfigError::InvalidValue {
                key: ENV_RECONNECT_DELAY_MS.to_string(),
                message: format!("{raw:?} is not a millisecond count: {e}"),
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.base_url()?;
        if self.buffer_capacity == 0 || self.buffer_capacity > TELEMETRY_CAPACITY {
            return Err(ConfigError::InvalidValue {
                key: "buffer_capacity".to_string(),
                message: format!(
                    "{} is outside 1..={TELEMETRY_CAPACITY}",
                    self.buffer_capacity
                ),
            });
        }
        if self.fixed_confidence > 100 {
            return Err(ConfigError::InvalidValue {
                key: "fixed_confidence".to_string(),
                message: format!("{} is not a percentage", self.fixed_confidence),
            });
        }
        Ok(())
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn consumer_config(&self) -> StreamConsumerConfig {
        StreamConsumerConfig {
            reconnect_delay: self.reconnect_delay(),
            buffer_capacity: self.buffer_capacity,
        }
    }

    /// `POST` target for analysis requests.
    pub fn analyze_url(&self) -> Result<String, ConfigError> {
        let base = self.base_url()?;
        Ok(format!("{}/analyze", base.as_str().trim_end_matches('/')))
    }

    /// WebSocket URL of the telemetry feed (`http` → `ws`, `https` → `wss`).
    pub fn stream_url(&self) -> Result<String, ConfigError> {
        let mut base = self.base_url()?;
        let scheme = if base.scheme() == "https" { "wss" } else { "ws" };
        base.set_scheme(scheme).map_err(|()| ConfigError::InvalidUrl {
            url: self.backend_url.clone(),
            reason: format!("cannot switch scheme to {scheme}"),
        })?;
        Ok(format!("{}/ws/stream", base.as_str().trim_end_matches('/')))
    }

    fn base_url(&self) -> Result<Url, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidUrl {
            url: self.backend_url.clone(),
            reason,
        };

        let url = Url::parse(self.backend_url.trim()).map_err(|e| invalid(e.to_string()))?;
        match url.scheme() {
            "http" | "https" => {}
            other => return Err(invalid(format!("unsupported scheme {other:?}"))),
        }
        if url.host_str().map_or(true, str::is_empty) {
            return Err(invalid("missing host".to_string()));
        }
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_match_backend() {
        let config = ConsoleConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.reconnect_delay(), Duration::from_millis(3000));
        assert_eq!(config.buffer_capacity, 8);
        assert_eq!(config.fixed_confidence, 98);
        assert_eq!(config.analyze_url().unwrap(), "http://127.0.0.1:8001/analyze");
        assert_eq!(config.stream_url().unwrap(), "ws://127.0.0.1:8001/ws/stream");
    }

    #[test]
    fn https_maps_to_wss() {
        let config = ConsoleConfig {
            backend_url: "https://risk.example.com/api/".into(),
            ..Default::default()
        };
        assert_eq!(config.analyze_url().unwrap(), "https://risk.example.com/api/analyze");
        assert_eq!(config.stream_url().unwrap(), "wss://risk.example.com/api/ws/stream");
    }

    #[test]
    fn env_overrides_defaults() {
        let config = ConsoleConfig::from_lookup(lookup(&[
            (ENV_BACKEND_URL, "http://10.0.0.5:9000"),
            (ENV_RECONNECT_DELAY_MS, "250"),
        ]))
        .unwrap();
        assert_eq!(config.backend_url, "http://10.0.0.5:9000");
        assert_eq!(config.reconnect_delay_ms, 250);

        let config = ConsoleConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ConsoleConfig::default());
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(matches!(
            ConsoleConfig::from_lookup(lookup(&[(ENV_RECONNECT_DELAY_MS, "soon")])),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            ConsoleConfig::from_lookup(lookup(&[(ENV_BACKEND_URL, "ftp://127.0.0.1")])),
            Err(ConfigError::InvalidUrl { .. })
        ));
        assert!(matches!(
            ConsoleConfig::from_lookup(lookup(&[(ENV_BACKEND_URL, "")])),
            Err(ConfigError::InvalidUrl { .. })
        ));

        let config = ConsoleConfig {
            buffer_capacity: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn buffer_capacity_is_capped_at_telemetry_capacity() {
        for capacity in [TELEMETRY_CAPACITY + 1, 1 << 24, usize::MAX] {
            let config = ConsoleConfig {
                buffer_capacity: capacity,
                ..Default::default()
            };
            assert!(matches!(
                config.validate(),
                Err(ConfigError::InvalidValue { ref key, .. }) if key == "buffer_capacity"
            ));
        }

        let config = ConsoleConfig {
            buffer_capacity: 1,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }
}
