//! Convenience re-exports for device family implementations.

pub use crate::context::{Context, Dependencies, Dependency, Role};
pub use crate::controller::{DeviceController, DeviceSnapshot};
pub use crate::device::{DeviceCore, ManagedDevice};
pub use crate::error::{DeviceError, StateMachineError};
pub use crate::handlers::{RunningHandler, StoppedHandler, UndefinedHandler};
pub use crate::machine::StateMachine;
pub use crate::state::{HandlerSet, LifecycleState, StateHandler};
pub use crate::status::{StatusMap, StopStep};
pub use crate::timer::{RetryDecision, RetryTimer, WaitWindow};
pub use ems_common::clock::Clock;
pub use ems_common::startstop::StartStop;
