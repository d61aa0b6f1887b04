//! Convenience re-exports.

pub use crate::clock::{Clock, ManualClock, SystemClock};
pub use crate::config::{ConfigError, ConfigLoader, LogLevel, SharedConfig};
pub use crate::consts::*;
pub use crate::startstop::{StartStop, StartStopConfig, StartStopTarget};
