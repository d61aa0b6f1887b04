//! Start/stop intent of a device.
//!
//! Three related types:
//!
//! - [`StartStop`]: the tri-state value. Used both as the operator target and
//!   as the run state a device publishes once its state machine confirms it.
//! - [`StartStopConfig`]: static configuration. `Auto` defers to the runtime
//!   request, `Start`/`Stop` pin the target.
//! - [`StartStopTarget`]: configuration plus the last runtime request, resolved
//!   into the effective target every cycle.

use serde::{Deserialize, Serialize};
use std::fmt;

// ─── StartStop ──────────────────────────────────────────────────────

/// Start/stop value. `Undefined` means "no preference" as a target and
/// "not confirmed" as a published run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum StartStop {
    #[default]
    Undefined = 0,
    Start = 1,
    Stop = 2,
}

impl StartStop {
    /// Convert from raw `u8`. Returns `None` for invalid values.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Undefined),
            1 => Some(Self::Start),
            2 => Some(Self::Stop),
            _ => None,
        }
    }

    /// Upper-case display name.
    #[inline]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Undefined => "UNDEFINED",
            Self::Start => "START",
            Self::Stop => "STOP",
        }
    }
}

impl fmt::Display for StartStop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ─── StartStopConfig ────────────────────────────────────────────────

/// Configured start/stop behavior of a device.
///
/// # TOML Example
///
/// ```toml
/// start_stop = "auto"
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum StartStopConfig {
    /// Follow the runtime request (e.g. from a parent ESS or an operator).
    #[default]
    Auto = 0,
    /// Always start.
    Start = 1,
    /// Always stop.
    Stop = 2,
}

// ─── StartStopTarget ────────────────────────────────────────────────

/// Effective start/stop target of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StartStopTarget {
    config: StartStopConfig,
    requested: StartStop,
}

impl StartStopTarget {
    /// Create a target with no runtime request.
    pub const fn new(config: StartStopConfig) -> Self {
        Self {
            config,
            requested: StartStop::Undefined,
        }
    }

    #[inline]
    pub const fn config(&self) -> StartStopConfig {
        self.config
    }

    /// Last runtime request, regardless of configuration.
    #[inline]
    pub const fn requested(&self) -> StartStop {
        self.requested
    }

    /// Store a runtime request. Returns `true` if the stored value changed.
    pub fn request(&mut self, value: StartStop) -> bool {
        let changed = self.requested != value;
        self.requested = value;
        changed
    }

    /// Replace the configuration. Returns `true` if the effective target changed.
    pub fn set_config(&mut self, config: StartStopConfig) -> bool {
        let before = self.resolve();
        self.config = config;
        before != self.resolve()
    }

    /// Effective target: configuration wins over the runtime request.
    #[inline]
    pub const fn resolve(&self) -> StartStop {
        match self.config {
            StartStopConfig::Auto => self.requested,
            StartStopConfig::Start => StartStop::Start,
            StartStopConfig::Stop => StartStop::Stop,
        }
    }
}
