//! Generic energy storage system composed of one battery and one inverter.
//!
//! The ESS never ticks its sub-devices. It reads their published run state
//! from the [`Dependencies`] snapshot and asks for start/stop through
//! [`EssDevice`] requests, which the scheduler forwards to the sub-device
//! controllers after the tick.
//!
//! Start order: battery, then inverter. Stop order: inverter, then battery.

mod handlers;

pub use handlers::{
    EssErrorHandler, EssGoRunningHandler, EssGoStoppedHandler, StartBatteryInverterHandler,
    StopBatteryHandler,
};

use crate::timing::Timing;
use ems_common::startstop::StartStopConfig;
use ems_statemachine::prelude::*;
use serde::{Deserialize, Serialize};
use static_assertions::assert_impl_all;

// ─── Device contract ────────────────────────────────────────────────

/// Sub-device start/stop requests issued during one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EssRequests {
    pub battery: Option<StartStop>,
    pub inverter: Option<StartStop>,
}

impl EssRequests {
    pub const fn is_empty(&self) -> bool {
        self.battery.is_none() && self.inverter.is_none()
    }
}

pub trait EssDevice: ManagedDevice + Send {
    fn battery_id(&self) -> &str;

    fn inverter_id(&self) -> &str;

    fn request_battery(&mut self, target: StartStop) -> Result<(), DeviceError>;

    fn request_inverter(&mut self, target: StartStop) -> Result<(), DeviceError>;

    /// Drain the pending sub-device requests.
    fn take_requests(&mut self) -> EssRequests;
}

/// ESS made of a configured battery and inverter.
#[derive(Debug, Clone)]
pub struct ComposedEss {
    core: DeviceCore,
    battery_id: String,
    inverter_id: String,
    faulted: bool,
    requests: EssRequests,
}

impl ComposedEss {
    pub fn new(
        id: impl Into<String>,
        config: StartStopConfig,
        battery_id: impl Into<String>,
        inverter_id: impl Into<String>,
    ) -> Self {
        Self {
            core: DeviceCore::new(id, config),
            battery_id: battery_id.into(),
            inverter_id: inverter_id.into(),
            faulted: false,
            requests: EssRequests::default(),
        }
    }

    /// ESS-level fault (e.g. emergency stop input, grid meter loss).
    pub fn set_faulted(&mut self, faulted: bool) {
        self.faulted = faulted;
    }

    pub fn pending(&self) -> EssRequests {
        self.requests
    }
}

impl ManagedDevice for ComposedEss {
    fn core(&self) -> &DeviceCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut DeviceCore {
        &mut self.core
    }

    fn has_faults(&self) -> bool {
        self.faulted
    }
}

impl EssDevice for ComposedEss {
    fn battery_id(&self) -> &str {
        &self.battery_id
    }

    fn inverter_id(&self) -> &str {
        &self.inverter_id
    }

    fn request_battery(&mut self, target: StartStop) -> Result<(), DeviceError> {
        self.requests.battery = Some(target);
        Ok(())
    }

    fn request_inverter(&mut self, target: StartStop) -> Result<(), DeviceError> {
        self.requests.inverter = Some(target);
        Ok(())
    }

    fn take_requests(&mut self) -> EssRequests {
        std::mem::take(&mut self.requests)
    }
}

// ─── States ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum EssState {
    #[default]
    Undefined = 0,
    /// Starting the battery.
    GoRunning = 1,
    StartBatteryInverter = 2,
    Running = 3,
    /// Stopping the inverter.
    GoStopped = 4,
    StopBattery = 5,
    Stopped = 6,
    Error = 7,
}

impl EssState {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Undefined),
            1 => Some(Self::GoRunning),
            2 => Some(Self::StartBatteryInverter),
            3 => Some(Self::Running),
            4 => Some(Self::GoStopped),
            5 => Some(Self::StopBattery),
            6 => Some(Self::Stopped),
            7 => Some(Self::Error),
            _ => None,
        }
    }
}

impl LifecycleState for EssState {
    const UNDEFINED: Self = Self::Undefined;
    const GO_RUNNING: Self = Self::GoRunning;
    const RUNNING: Self = Self::Running;
    const GO_STOPPED: Self = Self::GoStopped;
    const STOPPED: Self = Self::Stopped;
    const ERROR: Self = Self::Error;

    fn name(self) -> &'static str {
        match self {
            Self::Undefined => "UNDEFINED",
            Self::GoRunning => "GO_RUNNING",
            Self::StartBatteryInverter => "START_BATTERY_INVERTER",
            Self::Running => "RUNNING",
            Self::GoStopped => "GO_STOPPED",
            Self::StopBattery => "STOP_BATTERY",
            Self::Stopped => "STOPPED",
            Self::Error => "ERROR",
        }
    }
}

// ─── Handler set ────────────────────────────────────────────────────

pub struct EssHandlers {
    undefined: UndefinedHandler,
    go_running: EssGoRunningHandler,
    start_inverter: StartBatteryInverterHandler,
    running: RunningHandler,
    go_stopped: EssGoStoppedHandler,
    stop_battery: StopBatteryHandler,
    stopped: StoppedHandler,
    error: EssErrorHandler,
}

impl EssHandlers {
    pub fn new(timing: &Timing) -> Self {
        Self {
            undefined: UndefinedHandler,
            go_running: EssGoRunningHandler::new(timing),
            start_inverter: StartBatteryInverterHandler::new(timing),
            running: RunningHandler,
            go_stopped: EssGoStoppedHandler::new(timing),
            stop_battery: StopBatteryHandler::new(timing),
            stopped: StoppedHandler,
            error: EssErrorHandler::new(timing),
        }
    }
}

impl HandlerSet for EssHandlers {
    type State = EssState;
    type Device = dyn EssDevice;

    fn handler(&mut self, state: EssState) -> &mut dyn StateHandler<EssState, dyn EssDevice> {
        match state {
            EssState::Undefined => &mut self.undefined,
            EssState::GoRunning => &mut self.go_running,
            EssState::StartBatteryInverter => &mut self.start_inverter,
            EssState::Running => &mut self.running,
            EssState::GoStopped => &mut self.go_stopped,
            EssState::StopBattery => &mut self.stop_battery,
            EssState::Stopped => &mut self.stopped,
            EssState::Error => &mut self.error,
        }
    }
}

pub type EssController = DeviceController<EssHandlers>;

pub fn controller(device: Box<dyn EssDevice>, timing: &Timing) -> EssController {
    DeviceController::new(device, EssHandlers::new(timing))
}

assert_impl_all!(EssController: Send);
