//! # Device-lifecycle state machine engine
//!
//! Drives a power-electronics device through
//! `UNDEFINED → GO_RUNNING → RUNNING → GO_STOPPED → STOPPED` and `ERROR`,
//! advancing exactly once per control cycle.
//!
//! ## Building blocks
//!
//! | Module | Content |
//! |---|---|
//! | [`device`] | [`ManagedDevice`] capability contract and [`DeviceCore`] bookkeeping |
//! | [`context`] | per-cycle [`Context`] and [`Dependencies`] snapshot |
//! | [`state`] | [`LifecycleState`], [`StateHandler`], [`HandlerSet`] |
//! | [`machine`] | [`StateMachine`] engine (entry once per sojourn, forced states) |
//! | [`timer`] | [`RetryTimer`] and [`WaitWindow`] |
//! | [`status`] | per-family status-to-state tables |
//! | [`handlers`] | UNDEFINED, RUNNING and STOPPED handlers shared by all families |
//! | [`controller`] | [`DeviceController`]: device + engine + run-failed flag |
//!
//! A device family supplies a state enum, a handler set, and a device trait
//! extending [`ManagedDevice`] with its live status and commands.

pub mod context;
pub mod controller;
pub mod device;
pub mod error;
pub mod handlers;
pub mod machine;
pub mod prelude;
pub mod state;
pub mod status;
pub mod timer;

pub use context::{Context, Dependencies, Dependency, Role};
pub use controller::{DeviceController, DeviceSnapshot};
pub use device::{DeviceCore, ManagedDevice};
pub use error::{DeviceError, StateMachineError};
pub use machine::StateMachine;
pub use state::{HandlerSet, LifecycleState, StateHandler};
pub use status::{StatusMap, StopStep};
pub use timer::{RetryDecision, RetryTimer, WaitWindow};
