//! Kiosk configuration parameters
//!
//! All tunable parameters for the dispense screen.
//! Values can be loaded from a JSON file or persisted through a
//! [`ConfigPort`](crate::app::ports::ConfigPort).

use core::time::Duration;

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;
use crate::model::DispenseMode;

/// Core kiosk configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KioskConfig {
    // --- Session ---
    /// Dispense flow for the session
    pub dispense_mode: DispenseMode,

    // --- Polling ---
    /// Controller poll cadence (milliseconds)
    pub poll_interval_ms: u32,
    /// Upper bound on a single fact fetch (milliseconds)
    pub fetch_timeout_ms: u32,
    /// Consecutive failed cycles before the poller escalates to `error!`
    pub failure_warn_cycles: u16,

    // --- Dispatch ---
    /// Poll immediately after a sent intent
    pub refresh_after_confirm: bool,
}

impl Default for KioskConfig {
    fn default() -> Self {
        Self {
            dispense_mode: DispenseMode::Classic,

            // Polling
            poll_interval_ms: 250, // 4 Hz
            fetch_timeout_ms: 200,
            failure_warn_cycles: 8, // ~2 s at 4 Hz

            // Dispatch
            refresh_after_confirm: true,
        }
    }
}

impl KioskConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(u64::from(self.poll_interval_ms))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.fetch_timeout_ms))
    }

    /// Range-check every field.  Invalid values are rejected, never clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(50..=5000).contains(&self.poll_interval_ms) {
            return Err(ConfigError::ValidationFailed(
                "poll_interval_ms must be 50–5000",
            ));
        }
        if self.fetch_timeout_ms < 10 {
            return Err(ConfigError::ValidationFailed(
                "fetch_timeout_ms must be at least 10",
            ));
        }
        if self.fetch_timeout_ms > self.poll_interval_ms {
            return Err(ConfigError::ValidationFailed(
                "fetch_timeout_ms must be <= poll_interval_ms",
            ));
        }
        if self.failure_warn_cycles == 0 {
            return Err(ConfigError::ValidationFailed(
                "failure_warn_cycles must be non-zero",
            ));
        }
        Ok(())
    }
}
