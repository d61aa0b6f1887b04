//! ESS sequencing handlers.

use super::{EssDevice, EssState};
use crate::timing::Timing;
use ems_statemachine::prelude::*;
use tracing::{debug, warn};

type Ctx<'a> = Context<'a, dyn EssDevice>;

fn must_abort(ctx: &Ctx<'_>) -> bool {
    ctx.device.has_faults() || ctx.device.start_stop_target() == StartStop::Stop
}

// ─── GO_RUNNING: start battery ──────────────────────────────────────

pub struct EssGoRunningHandler {
    timer: RetryTimer,
}

impl EssGoRunningHandler {
    pub fn new(timing: &Timing) -> Self {
        Self {
            timer: timing.retry_timer(),
        }
    }
}

impl StateHandler<EssState, dyn EssDevice> for EssGoRunningHandler {
    fn on_entry(&mut self, ctx: &mut Ctx<'_>) -> Result<(), DeviceError> {
        self.timer.reset();
        ctx.device.set_max_start_attempts(false);
        Ok(())
    }

    fn run(&mut self, ctx: &mut Ctx<'_>) -> Result<EssState, DeviceError> {
        if must_abort(ctx) {
            return Ok(EssState::Undefined);
        }
        if ctx.dependencies().any_faulted() {
            return Ok(EssState::Error);
        }
        if ctx.dependencies().is_started(Role::Battery) {
            return Ok(EssState::StartBatteryInverter);
        }

        match self.timer.poll(ctx.now()) {
            RetryDecision::Wait => Ok(EssState::GoRunning),
            RetryDecision::Exhausted => {
                warn!(device = ctx.device.id(), "battery did not start");
                ctx.device.set_max_start_attempts(true);
                Ok(EssState::Undefined)
            }
            RetryDecision::Attempt => {
                ctx.device.request_battery(StartStop::Start)?;
                self.timer.record_attempt(ctx.now());
                debug!(device = ctx.device.id(), battery = ctx.device.battery_id(), "battery start requested");
                Ok(EssState::GoRunning)
            }
        }
    }
}

// ─── START_BATTERY_INVERTER ─────────────────────────────────────────

pub struct StartBatteryInverterHandler {
    timer: RetryTimer,
}

impl StartBatteryInverterHandler {
    pub fn new(timing: &Timing) -> Self {
        Self {
            timer: timing.retry_timer(),
        }
    }
}

impl StateHandler<EssState, dyn EssDevice> for StartBatteryInverterHandler {
    fn on_entry(&mut self, _ctx: &mut Ctx<'_>) -> Result<(), DeviceError> {
        self.timer.reset();
        Ok(())
    }

    fn run(&mut self, ctx: &mut Ctx<'_>) -> Result<EssState, DeviceError> {
        if must_abort(ctx) {
            return Ok(EssState::Undefined);
        }
        let deps = ctx.dependencies();
        if deps.any_faulted() {
            return Ok(EssState::Error);
        }
        if !deps.is_started(Role::Battery) {
            debug!(device = ctx.device.id(), "battery dropped out during inverter start");
            return Ok(EssState::Undefined);
        }
        if deps.is_started(Role::BatteryInverter) {
            return Ok(EssState::Running);
        }

        match self.timer.poll(ctx.now()) {
            RetryDecision::Wait => Ok(EssState::StartBatteryInverter),
            RetryDecision::Exhausted => {
                warn!(device = ctx.device.id(), "inverter did not start");
                ctx.device.set_max_start_attempts(true);
                Ok(EssState::Undefined)
            }
            RetryDecision::Attempt => {
                ctx.device.request_inverter(StartStop::Start)?;
                self.timer.record_attempt(ctx.now());
                debug!(device = ctx.device.id(), inverter = ctx.device.inverter_id(), "inverter start requested");
                Ok(EssState::StartBatteryInverter)
            }
        }
    }
}

// ─── GO_STOPPED: stop inverter ──────────────────────────────────────

pub struct EssGoStoppedHandler {
    timer: RetryTimer,
}

impl EssGoStoppedHandler {
    pub fn new(timing: &Timing) -> Self {
        Self {
            timer: timing.retry_timer(),
        }
    }
}

impl StateHandler<EssState, dyn EssDevice> for EssGoStoppedHandler {
    fn on_entry(&mut self, _ctx: &mut Ctx<'_>) -> Result<(), DeviceError> {
        self.timer.reset();
        Ok(())
    }

    fn run(&mut self, ctx: &mut Ctx<'_>) -> Result<EssState, DeviceError> {
        let deps = ctx.dependencies();
        if deps.is_stopped(Role::BatteryInverter) {
            return Ok(EssState::StopBattery);
        }
        // A faulted inverter never reports stopped; open the battery anyway.
        if deps.is_faulted(Role::BatteryInverter) {
            warn!(device = ctx.device.id(), "inverter faulted while stopping, stopping battery");
            ctx.device.request_inverter(StartStop::Stop)?;
            return Ok(EssState::StopBattery);
        }
        match self.timer.poll(ctx.now()) {
            RetryDecision::Wait => Ok(EssState::GoStopped),
            RetryDecision::Exhausted => {
                warn!(device = ctx.device.id(), "inverter did not stop");
                Ok(EssState::Undefined)
            }
            RetryDecision::Attempt => {
                ctx.device.request_inverter(StartStop::Stop)?;
                self.timer.record_attempt(ctx.now());
                Ok(EssState::GoStopped)
            }
        }
    }
}

// ─── STOP_BATTERY ───────────────────────────────────────────────────

pub struct StopBatteryHandler {
    timer: RetryTimer,
}

impl StopBatteryHandler {
    pub fn new(timing: &Timing) -> Self {
        Self {
            timer: timing.retry_timer(),
        }
    }
}

impl StateHandler<EssState, dyn EssDevice> for StopBatteryHandler {
    fn on_entry(&mut self, _ctx: &mut Ctx<'_>) -> Result<(), DeviceError> {
        self.timer.reset();
        Ok(())
    }

    fn run(&mut self, ctx: &mut Ctx<'_>) -> Result<EssState, DeviceError> {
        if ctx.device.start_stop_target() != StartStop::Stop {
            return Ok(EssState::Undefined);
        }
        if ctx.dependencies().is_stopped(Role::Battery) {
            return Ok(EssState::Stopped);
        }
        match self.timer.poll(ctx.now()) {
            RetryDecision::Wait => Ok(EssState::StopBattery),
            RetryDecision::Exhausted => {
                warn!(device = ctx.device.id(), "battery did not stop");
                Ok(EssState::Undefined)
            }
            RetryDecision::Attempt => {
                ctx.device.request_battery(StartStop::Stop)?;
                self.timer.record_attempt(ctx.now());
                Ok(EssState::StopBattery)
            }
        }
    }
}

// ─── ERROR ──────────────────────────────────────────────────────────

/// Stops both sub-devices and waits.
pub struct EssErrorHandler {
    window: WaitWindow,
}

impl EssErrorHandler {
    pub fn new(timing: &Timing) -> Self {
        Self {
            window: timing.error_window(),
        }
    }
}

impl StateHandler<EssState, dyn EssDevice> for EssErrorHandler {
    fn on_entry(&mut self, ctx: &mut Ctx<'_>) -> Result<(), DeviceError> {
        ctx.device.request_inverter(StartStop::Stop)?;
        ctx.device.request_battery(StartStop::Stop)?;
        self.window.start(ctx.now());
        warn!(
            device = ctx.device.id(),
            sub_device_fault = ctx.dependencies().any_faulted(),
            "ESS error: stopping battery and inverter"
        );
        Ok(())
    }

    fn run(&mut self, ctx: &mut Ctx<'_>) -> Result<EssState, DeviceError> {
        if self.window.has_elapsed(ctx.now()) {
            return Ok(EssState::Undefined);
        }
        Ok(EssState::Error)
    }
}
