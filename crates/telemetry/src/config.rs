//! Bus configuration.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Environment variable overriding [`TelemetryConfig::channel_capacity`].
pub const ENV_CHANNEL_CAPACITY: &str = "BEACON_CHANNEL_CAPACITY";

/// Largest accepted [`TelemetryConfig::channel_capacity`].
///
/// Each channel preallocates its ring buffer, so this also bounds the
/// memory one channel can reserve up front.
pub const MAX_CHANNEL_CAPACITY: usize = 1 << 20;

/// Configuration for a [`TelemetryBus`](crate::TelemetryBus).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// How many records a subscriber may fall behind on one channel before
    /// it starts losing the oldest ones.
    pub channel_capacity: usize,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
        }
    }
}

impl TelemetryConfig {
    /// Set the per-channel capacity.
    pub fn with_channel_capacity(mut self, channel_capacity: usize) -> Self {
        self.channel_capacity = channel_capacity;
        self
    }

    /// Load from the process environment, falling back to defaults for
    /// unset variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(raw) = lookup(ENV_CHANNEL_CAPACITY) {
            config.channel_capacity = raw.trim().parse().map_err(|err| {
                Error::config(format!("{ENV_CHANNEL_CAPACITY}={raw:?}: {err}"))
            })?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Check invariants the channels rely on.
    pub fn validate(&self) -> Result<()> {
        if self.channel_capacity == 0 {
            return Err(Error::config("channel_capacity must be greater than zero"));
        }
        if self.channel_capacity > MAX_CHANNEL_CAPACITY {
            return Err(Error::config(format!(
                "channel_capacity {} exceeds the maximum of {MAX_CHANNEL_CAPACITY}",
                self.channel_capacity
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_capacity() {
        let config = TelemetryConfig::default();
        assert_eq!(config.channel_capacity, 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn lookup_overrides_capacity() {
        let config = TelemetryConfig::from_lookup(|key| {
            (key == ENV_CHANNEL_CAPACITY).then(|| " 64 ".to_string())
        })
        .unwrap();
        assert_eq!(config.channel_capacity, 64);
    }

    #[test]
    fn unset_variables_use_defaults() {
        let config = TelemetryConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, TelemetryConfig::default());
    }

    #[test]
    fn unparsable_capacity_is_rejected() {
        let err = TelemetryConfig::from_lookup(|_| Some("lots".into())).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));
        assert!(err.to_string().contains(ENV_CHANNEL_CAPACITY));
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let config = TelemetryConfig::default().with_channel_capacity(0);
        assert!(config.validate().is_err());
        assert!(TelemetryConfig::from_lookup(|_| Some("0".into())).is_err());
    }

    #[test]
    fn capacity_above_maximum_is_rejected() {
        assert!(
            TelemetryConfig::default()
                .with_channel_capacity(MAX_CHANNEL_CAPACITY)
                .validate()
                .is_ok()
        );

        let oversized = (MAX_CHANNEL_CAPACITY + 1).to_string();
        let err = TelemetryConfig::from_lookup(|_| Some(oversized.clone())).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));

        let huge = (usize::MAX / 2).to_string();
        assert!(TelemetryConfig::from_lookup(|_| Some(huge.clone())).is_err());
    }

    #[test]
    fn deserializes_with_defaults_for_missing_fields() {
        let config: TelemetryConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, TelemetryConfig::default());

        let config: TelemetryConfig =
            serde_json::from_str(r#"{"channel_capacity": 32}"#).unwrap();
        assert_eq!(config.channel_capacity, 32);
    }
}
