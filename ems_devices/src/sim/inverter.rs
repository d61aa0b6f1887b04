//! Battery inverter simulator.

use crate::inverter::{BatteryInverterDevice, InverterStatus, RequestedState};
use ems_common::startstop::StartStopConfig;
use ems_statemachine::prelude::*;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Inverter with a configurable grid connection delay.
#[derive(Debug)]
pub struct SimulatedInverter {
    core: DeviceCore,
    /// Reported operating status
    status: InverterStatus,
    /// Fault latch
    faulted: bool,
    /// Fault survives `clear_failure`
    persistent: bool,
    /// Request written but not yet applied
    pending: Option<RequestedState>,
    /// When the current start sequence began
    starting_since: Option<Instant>,
    /// Time from STARTING to GRID_CONNECTED
    startup_time: Duration,
    fail_commands: bool,
    start_commands: u32,
    stop_commands: u32,
    clear_commands: u32,
    last_request: Option<RequestedState>,
}

impl SimulatedInverter {
    /// New inverter reporting `OFF`.
    pub fn new(id: impl Into<String>, config: StartStopConfig, startup_time: Duration) -> Self {
        Self {
            core: DeviceCore::new(id, config),
            status: InverterStatus::Off,
            faulted: false,
            persistent: false,
            pending: None,
            starting_since: None,
            startup_time,
            fail_commands: false,
            start_commands: 0,
            stop_commands: 0,
            clear_commands: 0,
            last_request: None,
        }
    }

    /// Override the reported status.
    pub fn set_status(&mut self, status: InverterStatus) {
        self.status = status;
        self.starting_since = None;
    }

    /// Latch a fault. A persistent fault is not cleared by `clear_failure`.
    pub fn inject_fault(&mut self, persistent: bool) {
        self.faulted = true;
        self.persistent = persistent;
        self.status = InverterStatus::Fault;
        self.starting_since = None;
    }

    /// The root cause is gone; the next `clear_failure` succeeds.
    pub fn resolve_fault(&mut self) {
        self.persistent = false;
    }

    pub fn set_fail_commands(&mut self, fail: bool) {
        self.fail_commands = fail;
    }

    pub fn start_commands(&self) -> u32 {
        self.start_commands
    }

    pub fn stop_commands(&self) -> u32 {
        self.stop_commands
    }

    pub fn clear_commands(&self) -> u32 {
        self.clear_commands
    }

    pub fn last_request(&self) -> Option<RequestedState> {
        self.last_request
    }

    fn check_link(&self, command: &'static str) -> Result<(), DeviceError> {
        if self.fail_commands {
            return Err(DeviceError::command(command, "simulated write failure"));
        }
        Ok(())
    }
}

impl ManagedDevice for SimulatedInverter {
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

impl BatteryInverterDevice for SimulatedInverter {
    fn status(&self) -> InverterStatus {
        self.status
    }

    fn set_requested_state(&mut self, state: RequestedState) -> Result<(), DeviceError> {
        self.check_link("requested_state")?;
        match state {
            RequestedState::GridConnected => self.start_commands += 1,
            RequestedState::Off | RequestedState::Standby => self.stop_commands += 1,
            RequestedState::GridPreConnected => {}
        }
        self.pending = Some(state);
        self.last_request = Some(state);
        debug!(device = self.core.id(), ?state, "requested state latched");
        Ok(())
    }

    fn clear_failure(&mut self) -> Result<(), DeviceError> {
        self.check_link("clear_failure")?;
        self.clear_commands += 1;
        if !self.persistent {
            self.faulted = false;
            if self.status == InverterStatus::Fault {
                self.status = InverterStatus::Off;
            }
        }
        Ok(())
    }

    fn refresh(&mut self, now: Instant) {
        if self.faulted {
            self.status = InverterStatus::Fault;
            self.pending = None;
            self.starting_since = None;
            return;
        }

        if let Some(request) = self.pending.take() {
            match request {
                RequestedState::GridConnected => {
                    if self.status != InverterStatus::GridConnected {
                        self.status = InverterStatus::Starting;
                        self.starting_since = Some(now);
                    }
                }
                RequestedState::Standby => self.set_status(InverterStatus::Standby),
                RequestedState::Off => self.set_status(InverterStatus::Off),
                RequestedState::GridPreConnected => {
                    self.set_status(InverterStatus::GridPreConnected)
                }
            }
        }

        if self.status == InverterStatus::Starting
            && let Some(since) = self.starting_since
            && now.saturating_duration_since(since) >= self.startup_time
        {
            self.status = InverterStatus::GridConnected;
            self.starting_since = None;
        }

        trace!(device = self.core.id(), status = ?self.status, "refreshed");
    }
}
