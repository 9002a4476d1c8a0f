use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use signo_frame::DEFAULT_MAX_FRAME_LEN;

use crate::error::{ChannelError, Result};

/// Controls connection and reconnection behavior of a channel.
///
/// Field names follow the camelCase JSON the web client has always used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChannelConfig {
    /// Reconnect after connectivity loss.
    pub auto_reconnect: bool,
    /// Base delay before the first reconnect attempt.
    pub reconnect_interval_ms: u64,
    /// Reconnect attempts allowed before giving up.
    pub max_reconnect_attempts: u32,
    /// Growth factor applied to the delay on each further attempt.
    pub backoff_multiplier: f64,
    /// Ceiling on the reconnect delay.
    pub max_reconnect_interval_ms: u64,
    /// Delay before the first connect after `start`, letting the host settle.
    pub initial_connection_delay_ms: Option<u64>,
    /// Delay before retrying a connect deferred by a busy [`ConnectGuard`](crate::ConnectGuard).
    pub guard_retry_delay_ms: u64,
    /// Deferrals allowed before connecting without the guard.
    pub max_guard_deferrals: u32,
    /// Largest inbound frame decoded; larger frames become error messages.
    pub max_frame_len: usize,
    /// How long `close` waits for the peer's close frame before dropping the
    /// transport. `None` or zero waits indefinitely.
    pub close_timeout_ms: Option<u64>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            auto_reconnect: true,
            reconnect_interval_ms: 1_000,
            max_reconnect_attempts: 5,
            backoff_multiplier: 1.5,
            max_reconnect_interval_ms: 10_000,
            initial_connection_delay_ms: None,
            guard_retry_delay_ms: 500,
            max_guard_deferrals: 10,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            close_timeout_ms: Some(5_000),
        }
    }
}

impl ChannelConfig {
    /// Parse a JSON config document. Missing fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|err| ChannelError::InvalidConfig(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|err| {
            ChannelError::InvalidConfig(format!("failed reading {}: {err}", path.display()))
        })?;
        Self::from_json_str(&json)
    }

    /// Reject values the reconnect policy cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.reconnect_interval_ms == 0 {
            return Err(ChannelError::InvalidConfig(
                "reconnectIntervalMs must be greater than zero".to_string(),
            ));
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(ChannelError::InvalidConfig(format!(
                "backoffMultiplier must be a finite value >= 1.0 (got {})",
                self.backoff_multiplier
            )));
        }
        if self.max_reconnect_interval_ms < self.reconnect_interval_ms {
            return Err(ChannelError::InvalidConfig(format!(
                "maxReconnectIntervalMs ({}) is below reconnectIntervalMs ({})",
                self.max_reconnect_interval_ms, self.reconnect_interval_ms
            )));
        }
        if self.max_frame_len == 0 {
            return Err(ChannelError::InvalidConfig(
                "maxFrameLen must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }

    pub fn max_reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.max_reconnect_interval_ms)
    }

    pub fn initial_connection_delay(&self) -> Option<Duration> {
        self.initial_connection_delay_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }

    pub fn guard_retry_delay(&self) -> Duration {
        Duration::from_millis(self.guard_retry_delay_ms)
    }

    pub fn close_timeout(&self) -> Option<Duration> {
        self.close_timeout_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ChannelConfig::default();
        config.validate().unwrap();
        assert!(config.auto_reconnect);
        assert_eq!(config.guard_retry_delay(), Duration::from_millis(500));
        assert_eq!(config.initial_connection_delay(), None);
        assert_eq!(config.close_timeout(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn close_timeout_can_be_disabled() {
        let config = ChannelConfig::from_json_str(r#"{"closeTimeoutMs":null}"#).unwrap();
        assert_eq!(config.close_timeout(), None);
        let config = ChannelConfig::from_json_str(r#"{"closeTimeoutMs":0}"#).unwrap();
        assert_eq!(config.close_timeout(), None);
    }

    #[test]
    fn json_uses_camel_case_and_keeps_defaults() {
        let config = ChannelConfig::from_json_str(
            r#"{"autoReconnect":false,"reconnectIntervalMs":250,"initialConnectionDelayMs":100}"#,
        )
        .unwrap();
        assert!(!config.auto_reconnect);
        assert_eq!(config.reconnect_interval(), Duration::from_millis(250));
        assert_eq!(
            config.initial_connection_delay(),
            Some(Duration::from_millis(100))
        );
        assert_eq!(config.max_reconnect_attempts, 5);
    }

    #[test]
    fn rejects_out_of_range_values() {
        let zero_interval = ChannelConfig {
            reconnect_interval_ms: 0,
            ..ChannelConfig::default()
        };
        assert!(zero_interval.validate().is_err());

        let shrinking = ChannelConfig {
            backoff_multiplier: 0.5,
            ..ChannelConfig::default()
        };
        assert!(shrinking.validate().is_err());

        let cap_below_base = ChannelConfig {
            reconnect_interval_ms: 5_000,
            max_reconnect_interval_ms: 1_000,
            ..ChannelConfig::default()
        };
        assert!(matches!(
            cap_below_base.validate(),
            Err(ChannelError::InvalidConfig(_))
        ));
    }

    #[test]
    fn unknown_json_is_an_invalid_config() {
        assert!(ChannelConfig::from_json_str("{\"autoReconnect\":\"yes\"}").is_err());
    }
}
