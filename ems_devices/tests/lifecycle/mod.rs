mod battery;
mod inverter;

use ems_common::clock::{Clock, ManualClock};
use ems_devices::battery::{BatteryDevice, BatteryFault, ContactorState};
use ems_devices::inverter::{BatteryInverterDevice, InverterStatus, RequestedState};
use ems_devices::sim::{SimulatedBattery, SimulatedInverter};
use ems_statemachine::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Instant;

// ── Spy ───────────────────────────────────────────────────────────

/// Test handle that stays reachable after a device is boxed into its
/// controller.
#[derive(Debug, Default)]
pub struct Spy {
    commands: AtomicU32,
    resets: AtomicU32,
    fault: AtomicBool,
    /// Count commands but do not forward them.
    deaf: AtomicBool,
    /// Reject commands with an error.
    broken: AtomicBool,
}

impl Spy {
    pub fn commands(&self) -> u32 {
        self.commands.load(Ordering::Relaxed)
    }

    /// Successful battery system resets.
    pub fn resets(&self) -> u32 {
        self.resets.load(Ordering::Relaxed)
    }

    pub fn set_fault(&self, on: bool) {
        self.fault.store(on, Ordering::Relaxed);
    }

    pub fn set_deaf(&self, on: bool) {
        self.deaf.store(on, Ordering::Relaxed);
    }

    pub fn set_broken(&self, on: bool) {
        self.broken.store(on, Ordering::Relaxed);
    }

    fn faulted(&self) -> bool {
        self.fault.load(Ordering::Relaxed)
    }

    /// Count a command; `Ok(true)` if it should reach the device.
    fn command(&self, name: &'static str) -> Result<bool, DeviceError> {
        if self.broken.load(Ordering::Relaxed) {
            return Err(DeviceError::command(name, "spy: link down"));
        }
        self.commands.fetch_add(1, Ordering::Relaxed);
        Ok(!self.deaf.load(Ordering::Relaxed))
    }
}

pub struct SpiedBattery {
    inner: SimulatedBattery,
    spy: Arc<Spy>,
}

impl SpiedBattery {
    pub fn new(inner: SimulatedBattery) -> (Box<dyn BatteryDevice>, Arc<Spy>) {
        let spy = Arc::new(Spy::default());
        let device = Box::new(Self {
            inner,
            spy: Arc::clone(&spy),
        });
        (device, spy)
    }
}

impl ManagedDevice for SpiedBattery {
    fn core(&self) -> &DeviceCore {
        self.inner.core()
    }

    fn core_mut(&mut self) -> &mut DeviceCore {
        self.inner.core_mut()
    }

    fn has_faults(&self) -> bool {
        self.inner.has_faults() || self.spy.faulted()
    }
}

impl BatteryDevice for SpiedBattery {
    fn contactor_state(&self) -> ContactorState {
        self.inner.contactor_state()
    }

    fn faults(&self) -> BatteryFault {
        let mut faults = self.inner.faults();
        if self.spy.faulted() {
            faults |= BatteryFault::INSULATION;
        }
        faults
    }

    fn set_contactor_control(&mut self, target: ContactorState) -> Result<(), DeviceError> {
        if self.spy.command("contactor_control")? {
            self.inner.set_contactor_control(target)?;
        }
        Ok(())
    }

    fn reset_system(&mut self) -> Result<(), DeviceError> {
        self.inner.reset_system()?;
        self.spy.resets.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn refresh(&mut self, now: Instant) {
        self.inner.refresh(now);
    }
}

pub struct SpiedInverter {
    inner: SimulatedInverter,
    spy: Arc<Spy>,
}

impl SpiedInverter {
    pub fn new(inner: SimulatedInverter) -> (Box<dyn BatteryInverterDevice>, Arc<Spy>) {
        let spy = Arc::new(Spy::default());
        let device = Box::new(Self {
            inner,
            spy: Arc::clone(&spy),
        });
        (device, spy)
    }
}

impl ManagedDevice for SpiedInverter {
    fn core(&self) -> &DeviceCore {
        self.inner.core()
    }

    fn core_mut(&mut self) -> &mut DeviceCore {
        self.inner.core_mut()
    }

    fn has_faults(&self) -> bool {
        self.inner.has_faults() || self.spy.faulted()
    }
}

impl BatteryInverterDevice for SpiedInverter {
    fn status(&self) -> InverterStatus {
        if self.spy.faulted() {
            InverterStatus::Fault
        } else {
            self.inner.status()
        }
    }

    fn set_requested_state(&mut self, state: RequestedState) -> Result<(), DeviceError> {
        // Only start requests are counted.
        if state != RequestedState::GridConnected {
            return self.inner.set_requested_state(state);
        }
        if self.spy.command("requested_state")? {
            self.inner.set_requested_state(state)?;
        }
        Ok(())
    }

    fn clear_failure(&mut self) -> Result<(), DeviceError> {
        self.inner.clear_failure()
    }

    fn refresh(&mut self, now: Instant) {
        self.inner.refresh(now);
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

pub fn battery_started() -> Dependencies {
    Dependencies::none()
        .with(Dependency::new(Role::Battery, StartStop::Start, false))
        .unwrap()
}

/// Refresh then tick a battery, as the scheduler does.
pub fn cycle_battery(
    controller: &mut ems_devices::BatteryController,
    clock: &ManualClock,
) -> Result<ems_devices::BatteryState, StateMachineError> {
    controller.device_mut().refresh(clock.now());
    controller.run_cycle(clock, Dependencies::none())
}

pub fn cycle_inverter(
    controller: &mut ems_devices::InverterController,
    clock: &ManualClock,
    dependencies: Dependencies,
) -> Result<ems_devices::InverterState, StateMachineError> {
    controller.device_mut().refresh(clock.now());
    controller.run_cycle(clock, dependencies)
}
