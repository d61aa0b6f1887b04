//! Device controller: one device, its engine, and the per-cycle bookkeeping.
//!
//! Per cycle (`run_cycle`):
//! 1. the published run state is reset to UNDEFINED (RUNNING/STOPPED
//!    re-confirm it during the tick),
//! 2. a [`Context`] is built from the device, the clock and the dependency
//!    snapshot,
//! 3. the engine ticks,
//! 4. failures raise the `run_failed` flag and are logged.
//!
//! A changed start/stop request forces the engine back to UNDEFINED so the
//! new target is arbitrated on the next tick.

use crate::context::{Context, Dependencies};
use crate::device::ManagedDevice;
use crate::error::StateMachineError;
use crate::machine::StateMachine;
use crate::state::{HandlerSet, LifecycleState};
use ems_common::clock::Clock;
use ems_common::startstop::{StartStop, StartStopConfig};
use tracing::{debug, error};

/// Observable status of one device, for logs and monitoring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSnapshot {
    pub id: String,
    pub state: &'static str,
    pub start_stop: StartStop,
    pub faulted: bool,
    pub run_failed: bool,
    pub max_start_attempts: bool,
}

/// Owns a device and drives it once per cycle.
pub struct DeviceController<H: HandlerSet> {
    device: Box<H::Device>,
    machine: StateMachine<H>,
    run_failed: bool,
}

impl<H: HandlerSet> DeviceController<H> {
    pub fn new(device: Box<H::Device>, handlers: H) -> Self {
        Self {
            device,
            machine: StateMachine::new(handlers),
            run_failed: false,
        }
    }

    #[inline]
    pub fn id(&self) -> &str {
        self.device.id()
    }

    #[inline]
    pub fn state(&self) -> H::State {
        self.machine.state()
    }

    pub fn machine(&self) -> &StateMachine<H> {
        &self.machine
    }

    pub fn device(&self) -> &H::Device {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut H::Device {
        &mut self.device
    }

    /// Published run state.
    #[inline]
    pub fn start_stop(&self) -> StartStop {
        self.device.start_stop()
    }

    #[inline]
    pub fn run_failed(&self) -> bool {
        self.run_failed
    }

    #[inline]
    pub fn max_start_attempts(&self) -> bool {
        self.device.max_start_attempts()
    }

    /// Runtime start/stop request (AUTO mode). Forces UNDEFINED on change.
    pub fn set_start_stop(&mut self, value: StartStop) {
        if self.device.request_start_stop(value) {
            debug!(device = self.device.id(), request = %value, "start/stop request changed");
            self.machine.force_next_state(H::State::UNDEFINED);
        }
    }

    /// Replace the start/stop configuration. Forces UNDEFINED if the
    /// effective target changed.
    pub fn set_start_stop_config(&mut self, config: StartStopConfig) {
        if self.device.core_mut().target_mut().set_config(config) {
            debug!(device = self.device.id(), ?config, "start/stop config changed");
            self.machine.force_next_state(H::State::UNDEFINED);
        }
    }

    /// Advance the device by one cycle.
    ///
    /// # Errors
    /// The engine error of this tick. The controller stays usable; the next
    /// cycle retries.
    pub fn run_cycle(
        &mut self,
        clock: &dyn Clock,
        dependencies: Dependencies,
    ) -> Result<H::State, StateMachineError> {
        self.device.mark_start_stop(StartStop::Undefined);

        let result = {
            let mut ctx = Context::new(&mut *self.device, clock, dependencies);
            self.machine.tick(&mut ctx)
        };

        match result {
            Ok(state) => {
                self.run_failed = false;
                Ok(state)
            }
            Err(e) => {
                self.run_failed = true;
                error!(device = self.device.id(), error = %e, "state machine run failed");
                Err(e)
            }
        }
    }

    pub fn snapshot(&self) -> DeviceSnapshot {
        DeviceSnapshot {
            id: self.device.id().to_string(),
            state: self.machine.state().name(),
            start_stop: self.device.start_stop(),
            faulted: self.device.has_faults(),
            run_failed: self.run_failed,
            max_start_attempts: self.device.max_start_attempts(),
        }
    }
}
