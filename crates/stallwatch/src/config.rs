//! Watchdog configuration.
//!
//! The threshold and strict-mode flag are fixed once a [`Watchdog`] is
//! constructed. Configuration can be built in code, through
//! [`WatchdogConfigBuilder`], or parsed from JSON where the threshold is
//! written as fractional seconds:
//!
//! ```json
//! { "threshold_secs": 0.25, "strict_mode": false }
//! ```
//!
//! [`Watchdog`]: crate::watchdog::Watchdog

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{WatchdogError, WatchdogResult};

/// Threshold used when none is configured.
pub const DEFAULT_THRESHOLD: Duration = Duration::from_millis(400);

/// Largest accepted threshold.
pub const MAX_THRESHOLD: Duration = Duration::from_secs(3600);

/// Stall watchdog configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchdogConfig {
    /// Maximum tolerated round-trip latency of the main context.
    #[serde(rename = "threshold_secs", with = "duration_secs")]
    pub threshold: Duration,
    /// Invoke the fatal hook on a stall instead of logging.
    pub strict_mode: bool,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            strict_mode: false,
        }
    }
}

impl WatchdogConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the threshold is zero or above [`MAX_THRESHOLD`].
    pub fn validate(&self) -> WatchdogResult<()> {
        if self.threshold.is_zero() {
            return Err(WatchdogError::invalid_configuration(
                "threshold must be greater than zero",
            ));
        }
        if self.threshold > MAX_THRESHOLD {
            return Err(WatchdogError::invalid_configuration(format!(
                "threshold must not exceed {}s",
                MAX_THRESHOLD.as_secs()
            )));
        }
        Ok(())
    }

    /// Parse and validate a JSON configuration document.
    ///
    /// Missing fields fall back to their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`WatchdogError::ConfigParse`] for malformed JSON and
    /// [`WatchdogError::InvalidConfiguration`] when validation fails.
    pub fn from_json_str(text: &str) -> WatchdogResult<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Create a configuration builder.
    #[must_use]
    pub fn builder() -> WatchdogConfigBuilder {
        WatchdogConfigBuilder::default()
    }
}

/// Builder for `WatchdogConfig`.
#[derive(Debug, Default)]
pub struct WatchdogConfigBuilder {
    config: WatchdogConfig,
}

impl WatchdogConfigBuilder {
    /// Set the stall threshold.
    #[must_use]
    pub fn threshold(mut self, threshold: Duration) -> Self {
        self.config.threshold = threshold;
        self
    }

    /// Set the stall threshold in milliseconds.
    #[must_use]
    pub fn threshold_ms(mut self, ms: u64) -> Self {
        self.config.threshold = Duration::from_millis(ms);
        self
    }

    /// Enable or disable strict mode.
    #[must_use]
    pub fn strict_mode(mut self, strict: bool) -> Self {
        self.config.strict_mode = strict;
        self
    }

    /// Build the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> WatchdogResult<WatchdogConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};
    use std::time::Duration;

    pub(super) fn serialize<S: Serializer>(
        value: &Duration,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs)
            .map_err(|err| D::Error::custom(format!("invalid threshold_secs {secs}: {err}")))
    }
}
