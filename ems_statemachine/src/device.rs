//! Capability contract between a device and its state machine.
//!
//! A device exposes its fault status, its start/stop target and the run state
//! it publishes. Family traits (battery, inverter, ESS) extend
//! [`ManagedDevice`] with live status accessors and command methods.
//!
//! The bookkeeping every device needs is bundled in [`DeviceCore`]; an
//! implementation only provides `core()`/`core_mut()` and `has_faults()`.

use ems_common::startstop::{StartStop, StartStopConfig, StartStopTarget};

/// Identity, target and published flags of one device.
#[derive(Debug, Clone)]
pub struct DeviceCore {
    id: String,
    target: StartStopTarget,
    start_stop: StartStop,
    max_start_attempts: bool,
}

impl DeviceCore {
    pub fn new(id: impl Into<String>, config: StartStopConfig) -> Self {
        Self {
            id: id.into(),
            target: StartStopTarget::new(config),
            start_stop: StartStop::Undefined,
            max_start_attempts: false,
        }
    }

    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[inline]
    pub const fn target(&self) -> &StartStopTarget {
        &self.target
    }

    #[inline]
    pub fn target_mut(&mut self) -> &mut StartStopTarget {
        &mut self.target
    }
}

/// Minimal interface a device must provide to be driven by the engine.
pub trait ManagedDevice {
    fn core(&self) -> &DeviceCore;

    fn core_mut(&mut self) -> &mut DeviceCore;

    /// True while any fault is latched. Must be free of side effects.
    fn has_faults(&self) -> bool;

    fn id(&self) -> &str {
        self.core().id()
    }

    /// Effective operator target for this cycle.
    fn start_stop_target(&self) -> StartStop {
        self.core().target.resolve()
    }

    /// Store a runtime request. Returns `true` if it changed.
    fn request_start_stop(&mut self, value: StartStop) -> bool {
        self.core_mut().target.request(value)
    }

    /// Published run state.
    fn start_stop(&self) -> StartStop {
        self.core().start_stop
    }

    fn mark_start_stop(&mut self, value: StartStop) {
        self.core_mut().start_stop = value;
    }

    fn mark_started(&mut self) {
        self.mark_start_stop(StartStop::Start);
    }

    fn mark_stopped(&mut self) {
        self.mark_start_stop(StartStop::Stop);
    }

    fn is_started(&self) -> bool {
        self.start_stop() == StartStop::Start
    }

    fn is_stopped(&self) -> bool {
        self.start_stop() == StartStop::Stop
    }

    /// Raised when GO_RUNNING ran out of start attempts.
    fn max_start_attempts(&self) -> bool {
        self.core().max_start_attempts
    }

    fn set_max_start_attempts(&mut self, value: bool) {
        self.core_mut().max_start_attempts = value;
    }
}
