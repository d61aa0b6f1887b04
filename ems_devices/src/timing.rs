//! Lifecycle timings of one device.
//!
//! # TOML Example
//!
//! ```toml
//! [battery.timing]
//! retry_interval_s = 30
//! max_start_attempts = 10
//! error_wait_s = 120
//! precharge_timeout_s = 60
//! ```

use ems_common::config::ConfigError;
use ems_common::consts::{
    DEFAULT_ERROR_WAIT, DEFAULT_MAX_START_ATTEMPTS, DEFAULT_PRECHARGE_TIMEOUT,
    DEFAULT_RETRY_INTERVAL,
};
use ems_statemachine::timer::{RetryTimer, WaitWindow};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timing {
    /// Minimum time between two start (or stop) commands [s].
    pub retry_interval_s: u64,
    /// Start attempts per GO_RUNNING sojourn.
    pub max_start_attempts: u8,
    /// Dwell time in ERROR [s].
    pub error_wait_s: u64,
    /// Precharge limit, battery only [s].
    pub precharge_timeout_s: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            retry_interval_s: DEFAULT_RETRY_INTERVAL.as_secs(),
            max_start_attempts: DEFAULT_MAX_START_ATTEMPTS,
            error_wait_s: DEFAULT_ERROR_WAIT.as_secs(),
            precharge_timeout_s: DEFAULT_PRECHARGE_TIMEOUT.as_secs(),
        }
    }
}

impl Timing {
    #[inline]
    pub const fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_s)
    }

    #[inline]
    pub const fn error_wait(&self) -> Duration {
        Duration::from_secs(self.error_wait_s)
    }

    #[inline]
    pub const fn precharge_timeout(&self) -> Duration {
        Duration::from_secs(self.precharge_timeout_s)
    }

    /// Retry timer bounded by `max_start_attempts`.
    pub const fn retry_timer(&self) -> RetryTimer {
        RetryTimer::new(self.retry_interval(), self.max_start_attempts)
    }

    pub const fn error_window(&self) -> WaitWindow {
        WaitWindow::new(self.error_wait())
    }

    /// # Errors
    /// `ConfigError::ValidationError` if `max_start_attempts` is zero or the
    /// retry interval is zero.
    pub fn validate(&self, device: &str) -> Result<(), ConfigError> {
        if self.max_start_attempts == 0 {
            return Err(ConfigError::ValidationError(format!(
                "{device}: max_start_attempts must be > 0"
            )));
        }
        if self.retry_interval_s == 0 {
            return Err(ConfigError::ValidationError(format!(
                "{device}: retry_interval_s must be > 0"
            )));
        }
        Ok(())
    }
}
