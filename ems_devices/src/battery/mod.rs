//! Battery family.
//!
//! A battery rack is connected to the DC bus through main contactors. Start
//! means closing them via precharge; stop means cutting them off.
//!
//! ```text
//! UNDEFINED ─START─▶ GO_RUNNING ─CONNECTION_INITIATING─▶ PRECHARGE ─ON_GRID─▶ RUNNING
//!     │                 └──────────────ON_GRID──────────────────────────────────▲
//!     ├─STOP─▶ GO_STOPPED ─CUT_OFF─▶ STOPPED
//!     └─START + faults─▶ ERROR ─wait─▶ UNDEFINED
//! ```

mod handlers;

pub use handlers::{
    BatteryErrorHandler, BatteryGoRunningHandler, BatteryGoStoppedHandler, PrechargeHandler,
    START_PROGRESS, STOP_TABLE,
};

use crate::timing::Timing;
use bitflags::bitflags;
use ems_statemachine::prelude::*;
use serde::{Deserialize, Serialize};
use static_assertions::assert_impl_all;
use std::time::Instant;

// ─── Live status ────────────────────────────────────────────────────

/// Main contactor status, also used as contactor command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum ContactorState {
    #[default]
    Undefined = 0,
    /// Contactors open.
    CutOff = 1,
    /// Precharge in progress.
    ConnectionInitiating = 2,
    /// Contactors closed.
    OnGrid = 3,
}

impl ContactorState {
    /// Convert from raw `u8`. Returns `None` for invalid values.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Undefined),
            1 => Some(Self::CutOff),
            2 => Some(Self::ConnectionInitiating),
            3 => Some(Self::OnGrid),
            _ => None,
        }
    }
}

bitflags! {
    /// Battery fault flags.
    ///
    /// CRITICAL flags survive `reset_system`: CELL_OVER_VOLTAGE,
    /// OVER_TEMPERATURE, INSULATION.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BatteryFault: u16 {
        const CELL_OVER_VOLTAGE   = 0x0001;
        const CELL_UNDER_VOLTAGE  = 0x0002;
        const OVER_TEMPERATURE    = 0x0004;
        const UNDER_TEMPERATURE   = 0x0008;
        const CHARGE_OVER_CURRENT = 0x0010;
        const DISCHARGE_OVER_CURRENT = 0x0020;
        const INSULATION          = 0x0040;
        const CELL_IMBALANCE      = 0x0080;
        const COMMUNICATION       = 0x0100;
    }
}

impl BatteryFault {
    pub const CRITICAL_MASK: Self = Self::from_bits_truncate(
        Self::CELL_OVER_VOLTAGE.bits() | Self::OVER_TEMPERATURE.bits() | Self::INSULATION.bits(),
    );

    #[inline]
    pub const fn has_critical(&self) -> bool {
        self.intersects(Self::CRITICAL_MASK)
    }
}

// ─── Device contract ────────────────────────────────────────────────

/// Battery rack as seen by its state machine.
pub trait BatteryDevice: ManagedDevice + Send {
    fn contactor_state(&self) -> ContactorState;

    fn faults(&self) -> BatteryFault;

    /// Request a contactor position.
    fn set_contactor_control(&mut self, target: ContactorState) -> Result<(), DeviceError>;

    /// Clear latched, non-critical faults.
    fn reset_system(&mut self) -> Result<(), DeviceError>;

    /// Refresh live data before the cycle's tick.
    fn refresh(&mut self, _now: Instant) {}
}

// ─── States ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum BatteryState {
    #[default]
    Undefined = 0,
    GoRunning = 1,
    Precharge = 2,
    Running = 3,
    GoStopped = 4,
    Stopped = 5,
    Error = 6,
}

impl BatteryState {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Undefined),
            1 => Some(Self::GoRunning),
            2 => Some(Self::Precharge),
            3 => Some(Self::Running),
            4 => Some(Self::GoStopped),
            5 => Some(Self::Stopped),
            6 => Some(Self::Error),
            _ => None,
        }
    }
}

impl LifecycleState for BatteryState {
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
            Self::Precharge => "PRECHARGE",
            Self::Running => "RUNNING",
            Self::GoStopped => "GO_STOPPED",
            Self::Stopped => "STOPPED",
            Self::Error => "ERROR",
        }
    }
}

// ─── Handler set ────────────────────────────────────────────────────

pub struct BatteryHandlers {
    undefined: UndefinedHandler,
    go_running: BatteryGoRunningHandler,
    precharge: PrechargeHandler,
    running: RunningHandler,
    go_stopped: BatteryGoStoppedHandler,
    stopped: StoppedHandler,
    error: BatteryErrorHandler,
}

impl BatteryHandlers {
    pub fn new(timing: &Timing) -> Self {
        Self {
            undefined: UndefinedHandler,
            go_running: BatteryGoRunningHandler::new(timing),
            precharge: PrechargeHandler::new(timing),
            running: RunningHandler,
            go_stopped: BatteryGoStoppedHandler::new(timing),
            stopped: StoppedHandler,
            error: BatteryErrorHandler::new(timing),
        }
    }

    pub fn go_running(&self) -> &BatteryGoRunningHandler {
        &self.go_running
    }
}

impl HandlerSet for BatteryHandlers {
    type State = BatteryState;
    type Device = dyn BatteryDevice;

    fn handler(
        &mut self,
        state: BatteryState,
    ) -> &mut dyn StateHandler<BatteryState, dyn BatteryDevice> {
        match state {
            BatteryState::Undefined => &mut self.undefined,
            BatteryState::GoRunning => &mut self.go_running,
            BatteryState::Precharge => &mut self.precharge,
            BatteryState::Running => &mut self.running,
            BatteryState::GoStopped => &mut self.go_stopped,
            BatteryState::Stopped => &mut self.stopped,
            BatteryState::Error => &mut self.error,
        }
    }
}

pub type BatteryController = DeviceController<BatteryHandlers>;

/// Wrap a battery device into a controller starting in UNDEFINED.
pub fn controller(device: Box<dyn BatteryDevice>, timing: &Timing) -> BatteryController {
    DeviceController::new(device, BatteryHandlers::new(timing))
}

assert_impl_all!(BatteryController: Send);
