//! Inverter lifecycle against the simulated inverter.

use super::{Spy, SpiedInverter, battery_started, cycle_inverter};
use ems_common::clock::ManualClock;
use ems_common::startstop::StartStopConfig;
use ems_devices::InverterState::*;
use ems_devices::inverter::{self, BatteryInverterDevice, InverterController, InverterStatus};
use ems_devices::sim::SimulatedInverter;
use ems_devices::{InverterState, Timing};
use ems_statemachine::prelude::*;
use std::sync::Arc;
use std::time::Duration;

fn timing() -> Timing {
    Timing {
        retry_interval_s: 10,
        max_start_attempts: 3,
        error_wait_s: 60,
        ..Timing::default()
    }
}

fn inverter(config: StartStopConfig, startup: Duration) -> (InverterController, Arc<Spy>) {
    let (device, spy) = SpiedInverter::new(SimulatedInverter::new("inv0", config, startup));
    (inverter::controller(device, &timing()), spy)
}

fn step(controller: &mut InverterController, clock: &ManualClock) -> InverterState {
    cycle_inverter(controller, clock, Dependencies::none()).unwrap()
}

fn step_with(
    controller: &mut InverterController,
    clock: &ManualClock,
    dependencies: Dependencies,
) -> InverterState {
    cycle_inverter(controller, clock, dependencies).unwrap()
}

#[test]
fn start_with_immediate_grid_connection() {
    let clock = ManualClock::new();
    let (mut inv, spy) = inverter(StartStopConfig::Start, Duration::ZERO);

    assert_eq!(step(&mut inv, &clock), GoRunning);
    assert_eq!(step(&mut inv, &clock), GoRunning);
    assert_eq!(step(&mut inv, &clock), Running);
    assert_eq!(step(&mut inv, &clock), Running);

    assert_eq!(spy.commands(), 1);
    assert_eq!(inv.device().status(), InverterStatus::GridConnected);
    assert_eq!(inv.start_stop(), StartStop::Start);
}

#[test]
fn stop_request_during_start_rearbitrates() {
    let clock = ManualClock::new();
    let (mut inv, spy) = inverter(StartStopConfig::Auto, Duration::from_secs(20));

    inv.set_start_stop(StartStop::Start);
    assert_eq!(step(&mut inv, &clock), GoRunning);
    assert_eq!(step(&mut inv, &clock), GoRunning);
    assert_eq!(spy.commands(), 1);

    inv.set_start_stop(StartStop::Stop);
    assert_eq!(step(&mut inv, &clock), Undefined);
    assert_eq!(inv.device().status(), InverterStatus::Starting);
    assert_eq!(step(&mut inv, &clock), GoStopped);
    assert_eq!(step(&mut inv, &clock), GoStopped);
    assert_eq!(step(&mut inv, &clock), Stopped);
    assert_eq!(step(&mut inv, &clock), Stopped);

    assert_eq!(inv.start_stop(), StartStop::Stop);
    assert_eq!(spy.commands(), 1);
}

#[test]
fn running_requires_started_battery() {
    let clock = ManualClock::new();
    let (mut inv, _spy) = inverter(StartStopConfig::Start, Duration::ZERO);
    let battery_idle = Dependencies::none()
        .with(Dependency::new(Role::Battery, StartStop::Undefined, false))
        .unwrap();

    step_with(&mut inv, &clock, battery_idle.clone());
    step_with(&mut inv, &clock, battery_idle.clone());
    assert_eq!(step_with(&mut inv, &clock, battery_idle.clone()), Running);
    assert_eq!(step_with(&mut inv, &clock, battery_idle), Undefined);
    assert_eq!(inv.start_stop(), StartStop::Undefined);

    assert_eq!(step_with(&mut inv, &clock, battery_started()), GoRunning);
    assert_eq!(step_with(&mut inv, &clock, battery_started()), Running);
    assert_eq!(step_with(&mut inv, &clock, battery_started()), Running);
    assert_eq!(inv.start_stop(), StartStop::Start);
}

#[test]
fn faulted_battery_drops_running_inverter() {
    let clock = ManualClock::new();
    let (mut inv, _spy) = inverter(StartStopConfig::Start, Duration::ZERO);
    for _ in 0..4 {
        step_with(&mut inv, &clock, battery_started());
    }
    assert_eq!(inv.start_stop(), StartStop::Start);

    let battery_faulted = Dependencies::none()
        .with(Dependency::new(Role::Battery, StartStop::Start, true))
        .unwrap();
    assert_eq!(step_with(&mut inv, &clock, battery_faulted), Undefined);
}

#[test]
fn error_wait_then_restart() {
    let clock = ManualClock::new();
    let (mut inv, spy) = inverter(StartStopConfig::Start, Duration::ZERO);
    spy.set_fault(true);

    assert_eq!(step(&mut inv, &clock), Error);
    assert_eq!(step(&mut inv, &clock), Error);
    assert_eq!(step(&mut inv, &clock), Error);
    assert_eq!(spy.commands(), 0);

    spy.set_fault(false);
    clock.advance_secs(60);
    assert_eq!(step(&mut inv, &clock), Error);
    clock.advance_secs(1);
    assert_eq!(step(&mut inv, &clock), Undefined);
    assert_eq!(step(&mut inv, &clock), GoRunning);
    assert_eq!(step(&mut inv, &clock), GoRunning);
    assert_eq!(step(&mut inv, &clock), Running);
    assert_eq!(spy.commands(), 1);
}

#[test]
fn unresponsive_inverter_gets_exactly_max_attempts() {
    let clock = ManualClock::new();
    let (mut inv, spy) = inverter(StartStopConfig::Start, Duration::ZERO);
    spy.set_deaf(true);

    assert_eq!(step(&mut inv, &clock), GoRunning);
    for expected in 1..=3 {
        assert_eq!(step(&mut inv, &clock), GoRunning);
        assert_eq!(spy.commands(), expected);
        // Repeated cycles inside the interval send nothing.
        clock.advance_secs(5);
        assert_eq!(step(&mut inv, &clock), GoRunning);
        clock.advance_secs(6);
    }

    assert_eq!(step(&mut inv, &clock), Undefined);
    assert_eq!(spy.commands(), 3);
    assert!(inv.snapshot().max_start_attempts);
}
