//! Resolve the effective watchdog configuration from a file and flags.

use anyhow::{Context, Result};
use clap::Args;
use stallwatch::{WatchdogConfig, WatchdogError};
use std::path::Path;
use std::time::Duration;

/// Flags overriding the configuration file.
#[derive(Args, Debug, Clone, Default)]
pub struct WatchdogArgs {
    /// Stall threshold in seconds (fractional)
    #[arg(long, env = "STALLWATCH_THRESHOLD")]
    pub threshold: Option<f64>,

    /// Abort the process on a stall instead of logging it
    #[arg(long)]
    pub strict: bool,
}

impl WatchdogArgs {
    /// Load `path` (or the defaults), apply the flags and validate.
    pub fn resolve_from(&self, path: Option<&Path>) -> Result<WatchdogConfig> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file {}", path.display()))?;
                WatchdogConfig::from_json_str(&text)?
            }
            None => WatchdogConfig::default(),
        };

        if let Some(secs) = self.threshold {
            config.threshold = Duration::try_from_secs_f64(secs).map_err(|_out_of_range| {
                WatchdogError::invalid_configuration(format!(
                    "threshold must be a positive number of seconds, got {secs}s"
                ))
            })?;
        }
        if self.strict {
            config.strict_mode = true;
        }

        config.validate()?;
        Ok(config)
    }
}
