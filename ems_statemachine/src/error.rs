//! Error types of the state machine engine.

use static_assertions::assert_impl_all;
use thiserror::Error;

/// Failure of a device command or status read.
///
/// Commands are fire-and-forget: `Ok` means the request was accepted by the
/// protocol bridge, not that the hardware executed it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    /// The command could not be written.
    #[error("command '{command}' failed: {reason}")]
    CommandFailed {
        command: &'static str,
        reason: String,
    },

    /// The device does not answer at all.
    #[error("device not reachable")]
    Unreachable,
}

impl DeviceError {
    pub fn command(command: &'static str, reason: impl Into<String>) -> Self {
        Self::CommandFailed {
            command,
            reason: reason.into(),
        }
    }
}

/// Failure of one engine tick. The state is never advanced on error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateMachineError {
    /// Entry action failed; it is retried on the next tick.
    #[error("entry action of {state} failed: {source}")]
    Entry {
        state: &'static str,
        source: DeviceError,
    },

    /// Transition function failed.
    #[error("{state} handler failed: {source}")]
    Handler {
        state: &'static str,
        source: DeviceError,
    },
}

impl StateMachineError {
    /// Name of the state the machine stayed in.
    pub const fn state(&self) -> &'static str {
        match self {
            Self::Entry { state, .. } | Self::Handler { state, .. } => *state,
        }
    }

    pub const fn device_error(&self) -> &DeviceError {
        match self {
            Self::Entry { source, .. } | Self::Handler { source, .. } => source,
        }
    }
}

assert_impl_all!(StateMachineError: Send, Sync, std::error::Error);
