//! Battery rack simulator.

use crate::battery::{BatteryDevice, BatteryFault, ContactorState};
use ems_common::startstop::StartStopConfig;
use ems_statemachine::prelude::*;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Battery rack with contactors and a precharge delay.
#[derive(Debug)]
pub struct SimulatedBattery {
    core: DeviceCore,
    /// Reported contactor position
    contactor: ContactorState,
    /// Latched fault flags
    faults: BatteryFault,
    /// Command written but not yet applied
    pending: Option<ContactorState>,
    /// When the current precharge began
    precharge_started: Option<Instant>,
    /// Time from CONNECTION_INITIATING to ON_GRID
    precharge_time: Duration,
    /// Reject every write with an error
    fail_commands: bool,
    contactor_commands: u32,
    reset_commands: u32,
    last_command: Option<ContactorState>,
}

impl SimulatedBattery {
    /// New rack with open contactors and no faults.
    pub fn new(id: impl Into<String>, config: StartStopConfig, precharge_time: Duration) -> Self {
        Self {
            core: DeviceCore::new(id, config),
            contactor: ContactorState::CutOff,
            faults: BatteryFault::empty(),
            pending: None,
            precharge_started: None,
            precharge_time,
            fail_commands: false,
            contactor_commands: 0,
            reset_commands: 0,
            last_command: None,
        }
    }

    /// Override the reported contactor position.
    pub fn set_contactor_state(&mut self, state: ContactorState) {
        self.contactor = state;
        self.precharge_started = None;
    }

    pub fn inject_fault(&mut self, fault: BatteryFault) {
        self.faults |= fault;
    }

    pub fn clear_faults(&mut self) {
        self.faults = BatteryFault::empty();
    }

    pub fn set_fail_commands(&mut self, fail: bool) {
        self.fail_commands = fail;
    }

    /// Successful contactor writes so far.
    pub fn contactor_commands(&self) -> u32 {
        self.contactor_commands
    }

    pub fn reset_commands(&self) -> u32 {
        self.reset_commands
    }

    pub fn last_command(&self) -> Option<ContactorState> {
        self.last_command
    }

    fn check_link(&self, command: &'static str) -> Result<(), DeviceError> {
        if self.fail_commands {
            return Err(DeviceError::command(command, "simulated write failure"));
        }
        Ok(())
    }
}

impl ManagedDevice for SimulatedBattery {
    fn core(&self) -> &DeviceCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut DeviceCore {
        &mut self.core
    }

    fn has_faults(&self) -> bool {
        !self.faults.is_empty()
    }
}

impl BatteryDevice for SimulatedBattery {
    fn contactor_state(&self) -> ContactorState {
        self.contactor
    }

    fn faults(&self) -> BatteryFault {
        self.faults
    }

    fn set_contactor_control(&mut self, target: ContactorState) -> Result<(), DeviceError> {
        self.check_link("contactor_control")?;
        self.contactor_commands += 1;
        self.pending = Some(target);
        self.last_command = Some(target);
        debug!(device = self.core.id(), ?target, "contactor command latched");
        Ok(())
    }

    fn reset_system(&mut self) -> Result<(), DeviceError> {
        self.check_link("reset_system")?;
        self.reset_commands += 1;
        self.faults &= BatteryFault::CRITICAL_MASK;
        Ok(())
    }

    fn refresh(&mut self, now: Instant) {
        if let Some(command) = self.pending.take() {
            match command {
                ContactorState::ConnectionInitiating
                    if matches!(
                        self.contactor,
                        ContactorState::CutOff | ContactorState::Undefined
                    ) =>
                {
                    self.contactor = ContactorState::ConnectionInitiating;
                    self.precharge_started = Some(now);
                }
                ContactorState::CutOff => {
                    self.contactor = ContactorState::CutOff;
                    self.precharge_started = None;
                }
                _ => {}
            }
        }

        if self.contactor == ContactorState::ConnectionInitiating
            && let Some(started) = self.precharge_started
            && now.saturating_duration_since(started) >= self.precharge_time
        {
            self.contactor = ContactorState::OnGrid;
            self.precharge_started = None;
        }

        // Rack protection opens the contactors on its own.
        if self.faults.has_critical() && self.contactor != ContactorState::CutOff {
            self.contactor = ContactorState::CutOff;
            self.precharge_started = None;
        }

        trace!(device = self.core.id(), contactor = ?self.contactor, "refreshed");
    }
}
