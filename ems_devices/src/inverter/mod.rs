//! Battery inverter family.
//!
//! The inverter is started by requesting `GRID_CONNECTED` and stopped by
//! requesting `STANDBY`. When attached to a battery, RUNNING also requires the
//! battery to report started.

mod handlers;

pub use handlers::{
    InverterErrorHandler, InverterGoRunningHandler, InverterGoStoppedHandler, START_PROGRESS,
    STOP_TABLE,
};

use crate::timing::Timing;
use ems_statemachine::prelude::*;
use serde::{Deserialize, Serialize};
use static_assertions::assert_impl_all;
use std::time::Instant;

// ─── Live status ────────────────────────────────────────────────────

/// Operating status reported by the inverter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum InverterStatus {
    #[default]
    Undefined = 0,
    Off = 1,
    Sleeping = 2,
    Starting = 3,
    Mppt = 4,
    Throttled = 5,
    ShuttingDown = 6,
    Fault = 7,
    Standby = 8,
    Precharge = 9,
    GridPreConnected = 10,
    GridConnected = 11,
    NoErrorPending = 12,
}

impl InverterStatus {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Undefined),
            1 => Some(Self::Off),
            2 => Some(Self::Sleeping),
            3 => Some(Self::Starting),
            4 => Some(Self::Mppt),
            5 => Some(Self::Throttled),
            6 => Some(Self::ShuttingDown),
            7 => Some(Self::Fault),
            8 => Some(Self::Standby),
            9 => Some(Self::Precharge),
            10 => Some(Self::GridPreConnected),
            11 => Some(Self::GridConnected),
            12 => Some(Self::NoErrorPending),
            _ => None,
        }
    }
}

/// Operating mode requested from the inverter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum RequestedState {
    Off = 1,
    Standby = 8,
    GridPreConnected = 10,
    GridConnected = 11,
}

// ─── Device contract ────────────────────────────────────────────────

pub trait BatteryInverterDevice: ManagedDevice + Send {
    fn status(&self) -> InverterStatus;

    fn set_requested_state(&mut self, state: RequestedState) -> Result<(), DeviceError>;

    /// Acknowledge the fault latch.
    fn clear_failure(&mut self) -> Result<(), DeviceError>;

    /// Refresh live data before the cycle's tick.
    fn refresh(&mut self, _now: Instant) {}
}

// ─── States ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum InverterState {
    #[default]
    Undefined = 0,
    GoRunning = 1,
    Running = 2,
    GoStopped = 3,
    Stopped = 4,
    Error = 5,
}

impl InverterState {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Undefined),
            1 => Some(Self::GoRunning),
            2 => Some(Self::Running),
            3 => Some(Self::GoStopped),
            4 => Some(Self::Stopped),
            5 => Some(Self::Error),
            _ => None,
        }
    }
}

impl LifecycleState for InverterState {
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
            Self::Running => "RUNNING",
            Self::GoStopped => "GO_STOPPED",
            Self::Stopped => "STOPPED",
            Self::Error => "ERROR",
        }
    }
}

// ─── Handler set ────────────────────────────────────────────────────

pub struct InverterHandlers {
    undefined: UndefinedHandler,
    go_running: InverterGoRunningHandler,
    running: RunningHandler,
    go_stopped: InverterGoStoppedHandler,
    stopped: StoppedHandler,
    error: InverterErrorHandler,
}

impl InverterHandlers {
    pub fn new(timing: &Timing) -> Self {
        Self {
            undefined: UndefinedHandler,
            go_running: InverterGoRunningHandler::new(timing),
            running: RunningHandler,
            go_stopped: InverterGoStoppedHandler::new(timing),
            stopped: StoppedHandler,
            error: InverterErrorHandler::new(timing),
        }
    }

    pub fn go_running(&self) -> &InverterGoRunningHandler {
        &self.go_running
    }
}

impl HandlerSet for InverterHandlers {
    type State = InverterState;
    type Device = dyn BatteryInverterDevice;

    fn handler(
        &mut self,
        state: InverterState,
    ) -> &mut dyn StateHandler<InverterState, dyn BatteryInverterDevice> {
        match state {
            InverterState::Undefined => &mut self.undefined,
            InverterState::GoRunning => &mut self.go_running,
            InverterState::Running => &mut self.running,
            InverterState::GoStopped => &mut self.go_stopped,
            InverterState::Stopped => &mut self.stopped,
            InverterState::Error => &mut self.error,
        }
    }
}

pub type InverterController = DeviceController<InverterHandlers>;

pub fn controller(device: Box<dyn BatteryInverterDevice>, timing: &Timing) -> InverterController {
    DeviceController::new(device, InverterHandlers::new(timing))
}

assert_impl_all!(InverterController: Send);
