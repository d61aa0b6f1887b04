//! State and handler abstractions.
//!
//! Each device family defines a closed state enum implementing
//! [`LifecycleState`] and a handler set mapping every variant to one
//! [`StateHandler`] with an exhaustive `match`, so a missing handler is a
//! compile error rather than a runtime lookup failure.

use crate::context::Context;
use crate::device::ManagedDevice;
use crate::error::DeviceError;
use std::fmt::Debug;

/// Family state enum with the common lifecycle skeleton.
///
/// Families may add intermediate variants (e.g. a precharge phase) but must
/// name the six skeleton states so shared handlers can target them.
pub trait LifecycleState: Copy + Eq + Debug + 'static {
    /// Initial and recovery landing state.
    const UNDEFINED: Self;
    const GO_RUNNING: Self;
    const RUNNING: Self;
    const GO_STOPPED: Self;
    const STOPPED: Self;
    const ERROR: Self;

    /// Upper-case display name.
    fn name(self) -> &'static str;
}

/// Behavior of one state.
pub trait StateHandler<S, D: ?Sized> {
    /// Called once on the first tick of each sojourn, before [`run`](Self::run).
    fn on_entry(&mut self, _ctx: &mut Context<'_, D>) -> Result<(), DeviceError> {
        Ok(())
    }

    /// Called every tick. Returns the state for the next tick.
    fn run(&mut self, ctx: &mut Context<'_, D>) -> Result<S, DeviceError>;
}

/// Fixed table of one handler per state.
pub trait HandlerSet {
    type State: LifecycleState;
    type Device: ManagedDevice + ?Sized;

    fn handler(&mut self, state: Self::State) -> &mut dyn StateHandler<Self::State, Self::Device>;
}
