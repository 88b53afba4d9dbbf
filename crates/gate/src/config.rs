//! Gate configuration
//!
//! Durations are stored as [`Duration`] in memory and written as integer
//! milliseconds when serialized, so a TOML table looks like:
//!
//! ```toml
//! delay_ms = 200
//! rolling_bump_ms = 50
//! rolling_max_ms = 1000
//! cool_time_ms = 0
//! trailing = true
//! wait = true
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Largest duration `validate` accepts for any field (24h)
pub const MAX_DURATION: Duration = Duration::from_secs(24 * 60 * 60);

/// Configuration for a [`Gate`](crate::Gate)
///
/// Immutable once the gate is built. Every field is optional when
/// deserializing; missing fields take the defaults below.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Base debounce window (default: 200ms)
    #[serde(rename = "delay_ms", with = "millis")]
    pub delay: Duration,

    /// Extension applied per extra hit while debouncing (default: 0, disabled)
    #[serde(rename = "rolling_bump_ms", with = "millis")]
    pub rolling_bump: Duration,

    /// Ceiling on the total debounce time measured from the first hit
    /// (default: 0, disabled)
    #[serde(rename = "rolling_max_ms", with = "millis")]
    pub rolling_max: Duration,

    /// Quiet period after an execution finishes before the gate unlocks
    /// (default: 0, disabled)
    #[serde(rename = "cool_time_ms", with = "millis")]
    pub cool_time: Duration,

    /// Replay one hit that arrived while execution-locked (default: true)
    pub trailing: bool,

    /// Hand the job a completion it must signal (default: true)
    pub wait: bool,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(200),
            rolling_bump: Duration::ZERO,
            rolling_max: Duration::ZERO,
            cool_time: Duration::ZERO,
            trailing: true,
            wait: true,
        }
    }
}

impl GateConfig {
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_rolling_bump(mut self, bump: Duration) -> Self {
        self.rolling_bump = bump;
        self
    }

    pub fn with_rolling_max(mut self, max: Duration) -> Self {
        self.rolling_max = max;
        self
    }

    pub fn with_cool_time(mut self, cool_time: Duration) -> Self {
        self.cool_time = cool_time;
        self
    }

    pub fn with_trailing(mut self, trailing: bool) -> Self {
        self.trailing = trailing;
        self
    }

    pub fn with_wait(mut self, wait: bool) -> Self {
        self.wait = wait;
        self
    }

    /// Whether additional hits may extend the debounce window
    pub fn rolling_enabled(&self) -> bool {
        !self.rolling_bump.is_zero()
    }

    /// The rolling ceiling, if one is configured
    pub fn ceiling(&self) -> Option<Duration> {
        (!self.rolling_max.is_zero()).then_some(self.rolling_max)
    }

    /// Check the configuration for values that make scheduling meaningless
    ///
    /// The gate itself never calls this: a bad configuration degrades to
    /// odd timing, not to an error. Callers loading configuration from
    /// users (the CLI does) should.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("delay_ms", self.delay),
            ("rolling_bump_ms", self.rolling_bump),
            ("rolling_max_ms", self.rolling_max),
            ("cool_time_ms", self.cool_time),
        ] {
            if value > MAX_DURATION {
                return Err(ConfigError::OutOfRange {
                    field,
                    value_ms: value.as_millis() as u64,
                    max_ms: MAX_DURATION.as_millis() as u64,
                });
            }
        }

        if let Some(max) = self.ceiling() {
            if max < self.delay {
                return Err(ConfigError::CeilingBelowDelay {
                    rolling_max_ms: max.as_millis() as u64,
                    delay_ms: self.delay.as_millis() as u64,
                });
            }
        }

        Ok(())
    }
}

/// Configuration validation errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{field} = {value_ms} exceeds the maximum of {max_ms}ms")]
    OutOfRange {
        field: &'static str,
        value_ms: u64,
        max_ms: u64,
    },

    #[error("rolling_max_ms ({rolling_max_ms}) is below delay_ms ({delay_ms})")]
    CeilingBelowDelay { rolling_max_ms: u64, delay_ms: u64 },
}

/// Serde adapter: `Duration` <-> integer milliseconds
mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
