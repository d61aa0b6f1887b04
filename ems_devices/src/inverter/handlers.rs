//! Inverter-specific state handlers.

use super::{BatteryInverterDevice, InverterState, InverterStatus, RequestedState};
use crate::timing::Timing;
use ems_statemachine::prelude::*;
use tracing::{info, warn};

type Ctx<'a> = Context<'a, dyn BatteryInverterDevice>;

/// Statuses that count as running.
pub const START_PROGRESS: StatusMap<InverterStatus, Option<InverterState>> = StatusMap::new(
    &[
        (InverterStatus::GridConnected, Some(InverterState::Running)),
        (InverterStatus::Throttled, Some(InverterState::Running)),
    ],
    None,
);

/// GO_STOPPED reaction per inverter status.
pub const STOP_TABLE: StatusMap<InverterStatus, StopStep> = StatusMap::new(
    &[
        (InverterStatus::Off, StopStep::Stopped),
        (InverterStatus::Standby, StopStep::Stopped),
        (InverterStatus::Sleeping, StopStep::Stopped),
        (InverterStatus::ShuttingDown, StopStep::Wait),
        (InverterStatus::Fault, StopStep::Rearbitrate),
        (InverterStatus::Undefined, StopStep::Rearbitrate),
    ],
    StopStep::IssueStop,
);

// ─── GO_RUNNING ─────────────────────────────────────────────────────

/// Requests `GRID_CONNECTED` with bounded retries.
pub struct InverterGoRunningHandler {
    timer: RetryTimer,
}

impl InverterGoRunningHandler {
    pub fn new(timing: &Timing) -> Self {
        Self {
            timer: timing.retry_timer(),
        }
    }

    pub fn attempts(&self) -> u8 {
        self.timer.attempts()
    }
}

impl StateHandler<InverterState, dyn BatteryInverterDevice> for InverterGoRunningHandler {
    fn on_entry(&mut self, ctx: &mut Ctx<'_>) -> Result<(), DeviceError> {
        self.timer.reset();
        ctx.device.set_max_start_attempts(false);
        Ok(())
    }

    fn run(&mut self, ctx: &mut Ctx<'_>) -> Result<InverterState, DeviceError> {
        if ctx.device.has_faults() || ctx.device.start_stop_target() == StartStop::Stop {
            return Ok(InverterState::Undefined);
        }

        if let Some(next) = START_PROGRESS.lookup(ctx.device.status()) {
            return Ok(next);
        }

        match self.timer.poll(ctx.now()) {
            RetryDecision::Wait => Ok(InverterState::GoRunning),
            RetryDecision::Exhausted => {
                warn!(
                    device = ctx.device.id(),
                    attempts = self.timer.attempts(),
                    status = ?ctx.device.status(),
                    "max start attempts reached"
                );
                ctx.device.set_max_start_attempts(true);
                Ok(InverterState::Undefined)
            }
            RetryDecision::Attempt => {
                ctx.device
                    .set_requested_state(RequestedState::GridConnected)?;
                self.timer.record_attempt(ctx.now());
                info!(
                    device = ctx.device.id(),
                    attempt = self.timer.attempts(),
                    "grid connection requested"
                );
                Ok(InverterState::GoRunning)
            }
        }
    }
}

// ─── GO_STOPPED ─────────────────────────────────────────────────────

pub struct InverterGoStoppedHandler {
    timer: RetryTimer,
}

impl InverterGoStoppedHandler {
    pub fn new(timing: &Timing) -> Self {
        Self {
            timer: timing.retry_timer(),
        }
    }
}

impl StateHandler<InverterState, dyn BatteryInverterDevice> for InverterGoStoppedHandler {
    fn on_entry(&mut self, _ctx: &mut Ctx<'_>) -> Result<(), DeviceError> {
        self.timer.reset();
        Ok(())
    }

    fn run(&mut self, ctx: &mut Ctx<'_>) -> Result<InverterState, DeviceError> {
        match STOP_TABLE.lookup(ctx.device.status()) {
            StopStep::Stopped => Ok(InverterState::Stopped),
            StopStep::Wait => Ok(InverterState::GoStopped),
            StopStep::Rearbitrate => Ok(InverterState::Undefined),
            StopStep::IssueStop => match self.timer.poll(ctx.now()) {
                RetryDecision::Wait => Ok(InverterState::GoStopped),
                RetryDecision::Exhausted => {
                    warn!(device = ctx.device.id(), "inverter did not stop");
                    Ok(InverterState::Undefined)
                }
                RetryDecision::Attempt => {
                    ctx.device.set_requested_state(RequestedState::Standby)?;
                    self.timer.record_attempt(ctx.now());
                    info!(device = ctx.device.id(), "standby requested");
                    Ok(InverterState::GoStopped)
                }
            },
        }
    }
}

// ─── ERROR ──────────────────────────────────────────────────────────

/// Acknowledges the fault, switches the inverter off and waits.
pub struct InverterErrorHandler {
    window: WaitWindow,
}

impl InverterErrorHandler {
    pub fn new(timing: &Timing) -> Self {
        Self {
            window: timing.error_window(),
        }
    }
}

impl StateHandler<InverterState, dyn BatteryInverterDevice> for InverterErrorHandler {
    fn on_entry(&mut self, ctx: &mut Ctx<'_>) -> Result<(), DeviceError> {
        ctx.device.clear_failure()?;
        ctx.device.set_requested_state(RequestedState::Off)?;
        self.window.start(ctx.now());
        warn!(
            device = ctx.device.id(),
            status = ?ctx.device.status(),
            "inverter error: failure cleared and switched off"
        );
        Ok(())
    }

    fn run(&mut self, ctx: &mut Ctx<'_>) -> Result<InverterState, DeviceError> {
        if self.window.has_elapsed(ctx.now()) {
            Ok(InverterState::Undefined)
        } else {
            Ok(InverterState::Error)
        }
    }
}
