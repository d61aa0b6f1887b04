//! Battery-specific state handlers.

use super::{BatteryDevice, BatteryState, ContactorState};
use crate::timing::Timing;
use ems_statemachine::prelude::*;
use tracing::{debug, info, warn};

type Ctx<'a> = Context<'a, dyn BatteryDevice>;

/// Contactor status that lets GO_RUNNING move on without another command.
pub const START_PROGRESS: StatusMap<ContactorState, Option<BatteryState>> = StatusMap::new(
    &[
        (ContactorState::OnGrid, Some(BatteryState::Running)),
        (ContactorState::ConnectionInitiating, Some(BatteryState::Precharge)),
    ],
    None,
);

/// GO_STOPPED reaction per contactor status. A cut-off rack is never sent
/// CUT_OFF again.
pub const STOP_TABLE: StatusMap<ContactorState, StopStep> = StatusMap::new(
    &[
        (ContactorState::CutOff, StopStep::Stopped),
        (ContactorState::ConnectionInitiating, StopStep::IssueStop),
        (ContactorState::OnGrid, StopStep::IssueStop),
    ],
    StopStep::Rearbitrate,
);

// ─── GO_RUNNING ─────────────────────────────────────────────────────

/// Requests precharge with bounded retries.
pub struct BatteryGoRunningHandler {
    timer: RetryTimer,
}

impl BatteryGoRunningHandler {
    pub fn new(timing: &Timing) -> Self {
        Self {
            timer: timing.retry_timer(),
        }
    }

    /// Start attempts issued in the current sojourn.
    pub fn attempts(&self) -> u8 {
        self.timer.attempts()
    }
}

impl StateHandler<BatteryState, dyn BatteryDevice> for BatteryGoRunningHandler {
    fn on_entry(&mut self, ctx: &mut Ctx<'_>) -> Result<(), DeviceError> {
        self.timer.reset();
        ctx.device.set_max_start_attempts(false);
        Ok(())
    }

    fn run(&mut self, ctx: &mut Ctx<'_>) -> Result<BatteryState, DeviceError> {
        if ctx.device.has_faults() || ctx.device.start_stop_target() == StartStop::Stop {
            return Ok(BatteryState::Undefined);
        }

        if let Some(next) = START_PROGRESS.lookup(ctx.device.contactor_state()) {
            return Ok(next);
        }

        match self.timer.poll(ctx.now()) {
            RetryDecision::Wait => Ok(BatteryState::GoRunning),
            RetryDecision::Exhausted => {
                warn!(
                    device = ctx.device.id(),
                    attempts = self.timer.attempts(),
                    "max start attempts reached"
                );
                ctx.device.set_max_start_attempts(true);
                Ok(BatteryState::Undefined)
            }
            RetryDecision::Attempt => {
                ctx.device
                    .set_contactor_control(ContactorState::ConnectionInitiating)?;
                self.timer.record_attempt(ctx.now());
                info!(
                    device = ctx.device.id(),
                    attempt = self.timer.attempts(),
                    "precharge requested"
                );
                Ok(BatteryState::GoRunning)
            }
        }
    }
}

// ─── PRECHARGE ──────────────────────────────────────────────────────

/// Waits for the contactors to close after precharge. A precharge that
/// outlives its timeout is handed to ERROR, which opens the contactors.
pub struct PrechargeHandler {
    window: WaitWindow,
}

impl PrechargeHandler {
    pub fn new(timing: &Timing) -> Self {
        Self {
            window: WaitWindow::new(timing.precharge_timeout()),
        }
    }
}

impl StateHandler<BatteryState, dyn BatteryDevice> for PrechargeHandler {
    fn on_entry(&mut self, ctx: &mut Ctx<'_>) -> Result<(), DeviceError> {
        self.window.start(ctx.now());
        Ok(())
    }

    fn run(&mut self, ctx: &mut Ctx<'_>) -> Result<BatteryState, DeviceError> {
        if ctx.device.has_faults() || ctx.device.start_stop_target() == StartStop::Stop {
            return Ok(BatteryState::Undefined);
        }
        match ctx.device.contactor_state() {
            ContactorState::OnGrid => Ok(BatteryState::Running),
            ContactorState::ConnectionInitiating if self.window.has_elapsed(ctx.now()) => {
                warn!(
                    device = ctx.device.id(),
                    timeout_s = self.window.duration().as_secs(),
                    "precharge timed out"
                );
                Ok(BatteryState::Error)
            }
            ContactorState::ConnectionInitiating => Ok(BatteryState::Precharge),
            ContactorState::CutOff | ContactorState::Undefined => {
                debug!(device = ctx.device.id(), "precharge aborted by rack");
                Ok(BatteryState::Undefined)
            }
        }
    }
}

// ─── GO_STOPPED ─────────────────────────────────────────────────────

/// Opens the contactors, following [`STOP_TABLE`].
pub struct BatteryGoStoppedHandler {
    timer: RetryTimer,
}

impl BatteryGoStoppedHandler {
    pub fn new(timing: &Timing) -> Self {
        Self {
            timer: timing.retry_timer(),
        }
    }
}

impl StateHandler<BatteryState, dyn BatteryDevice> for BatteryGoStoppedHandler {
    fn on_entry(&mut self, _ctx: &mut Ctx<'_>) -> Result<(), DeviceError> {
        self.timer.reset();
        Ok(())
    }

    fn run(&mut self, ctx: &mut Ctx<'_>) -> Result<BatteryState, DeviceError> {
        match STOP_TABLE.lookup(ctx.device.contactor_state()) {
            StopStep::Stopped => Ok(BatteryState::Stopped),
            StopStep::Wait => Ok(BatteryState::GoStopped),
            StopStep::Rearbitrate => Ok(BatteryState::Undefined),
            StopStep::IssueStop => match self.timer.poll(ctx.now()) {
                RetryDecision::Wait => Ok(BatteryState::GoStopped),
                RetryDecision::Exhausted => {
                    warn!(device = ctx.device.id(), "contactors did not open");
                    Ok(BatteryState::Undefined)
                }
                RetryDecision::Attempt => {
                    ctx.device.set_contactor_control(ContactorState::CutOff)?;
                    self.timer.record_attempt(ctx.now());
                    info!(device = ctx.device.id(), "cut-off requested");
                    Ok(BatteryState::GoStopped)
                }
            },
        }
    }
}

// ─── ERROR ──────────────────────────────────────────────────────────

/// Resets the rack, opens the contactors and waits before re-arbitration.
pub struct BatteryErrorHandler {
    window: WaitWindow,
}

impl BatteryErrorHandler {
    pub fn new(timing: &Timing) -> Self {
        Self {
            window: timing.error_window(),
        }
    }
}

impl StateHandler<BatteryState, dyn BatteryDevice> for BatteryErrorHandler {
    fn on_entry(&mut self, ctx: &mut Ctx<'_>) -> Result<(), DeviceError> {
        let faults = ctx.device.faults();
        // Cut-off before reset: a failed cut-off is retried without a second reset.
        if ctx.device.contactor_state() != ContactorState::CutOff {
            ctx.device.set_contactor_control(ContactorState::CutOff)?;
        }
        ctx.device.reset_system()?;
        self.window.start(ctx.now());
        warn!(
            device = ctx.device.id(),
            ?faults,
            critical = faults.has_critical(),
            "battery error: system reset and cut-off issued"
        );
        Ok(())
    }

    fn run(&mut self, ctx: &mut Ctx<'_>) -> Result<BatteryState, DeviceError> {
        if self.window.has_elapsed(ctx.now()) {
            return Ok(BatteryState::Undefined);
        }
        Ok(BatteryState::Error)
    }
}
