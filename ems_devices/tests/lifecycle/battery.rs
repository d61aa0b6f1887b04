//! Battery lifecycle against the simulated rack.

use super::{Spy, SpiedBattery, cycle_battery};
use ems_common::clock::ManualClock;
use ems_common::startstop::StartStopConfig;
use ems_devices::BatteryState::*;
use ems_devices::Timing;
use ems_devices::battery::{self, BatteryController, BatteryDevice, ContactorState};
use ems_devices::sim::SimulatedBattery;
use ems_statemachine::prelude::*;
use std::sync::Arc;
use std::time::Duration;

fn timing() -> Timing {
    Timing {
        retry_interval_s: 30,
        max_start_attempts: 3,
        error_wait_s: 120,
        precharge_timeout_s: 60,
    }
}

fn rack(config: StartStopConfig, precharge: Duration) -> (BatteryController, Arc<Spy>) {
    let (device, spy) = SpiedBattery::new(SimulatedBattery::new("bms0", config, precharge));
    (battery::controller(device, &timing()), spy)
}

fn step(controller: &mut BatteryController, clock: &ManualClock) -> ems_devices::BatteryState {
    cycle_battery(controller, clock).unwrap()
}

/// Start a rack with 5 s precharge; returns it in RUNNING.
fn running_rack(clock: &ManualClock) -> (BatteryController, Arc<Spy>) {
    let (mut bms, spy) = rack(StartStopConfig::Start, Duration::from_secs(5));
    assert_eq!(step(&mut bms, clock), GoRunning);
    assert_eq!(step(&mut bms, clock), GoRunning);
    assert_eq!(step(&mut bms, clock), Precharge);
    assert_eq!(step(&mut bms, clock), Precharge);
    clock.advance_secs(5);
    assert_eq!(step(&mut bms, clock), Running);
    assert_eq!(step(&mut bms, clock), Running);
    (bms, spy)
}

#[test]
fn start_through_precharge() {
    let clock = ManualClock::new();
    let (bms, spy) = running_rack(&clock);

    assert_eq!(spy.commands(), 1);
    assert_eq!(bms.device().contactor_state(), ContactorState::OnGrid);
    assert_eq!(bms.start_stop(), StartStop::Start);
    assert!(!bms.max_start_attempts());
}

#[test]
fn config_stop_opens_contactors() {
    let clock = ManualClock::new();
    let (mut bms, spy) = running_rack(&clock);

    bms.set_start_stop_config(StartStopConfig::Stop);
    assert_eq!(step(&mut bms, &clock), Undefined);
    assert_eq!(bms.start_stop(), StartStop::Undefined);
    assert_eq!(step(&mut bms, &clock), GoStopped);
    assert_eq!(step(&mut bms, &clock), GoStopped);
    assert_eq!(spy.commands(), 2);
    assert_eq!(step(&mut bms, &clock), Stopped);
    assert_eq!(step(&mut bms, &clock), Stopped);
    assert_eq!(bms.start_stop(), StartStop::Stop);
    assert_eq!(bms.device().contactor_state(), ContactorState::CutOff);
}

#[test]
fn fault_while_running_goes_to_error_and_recovers() {
    let clock = ManualClock::new();
    let (mut bms, spy) = running_rack(&clock);

    spy.set_fault(true);
    assert_eq!(step(&mut bms, &clock), Undefined);
    assert_eq!(step(&mut bms, &clock), Error);
    assert_eq!(step(&mut bms, &clock), Error);
    assert_eq!(spy.commands(), 2);
    assert!(bms.snapshot().faulted);

    assert_eq!(step(&mut bms, &clock), Error);
    assert_eq!(bms.device().contactor_state(), ContactorState::CutOff);

    // Fault still present after the window: back to ERROR.
    clock.advance_secs(121);
    assert_eq!(step(&mut bms, &clock), Undefined);
    assert_eq!(step(&mut bms, &clock), Error);

    spy.set_fault(false);
    assert_eq!(step(&mut bms, &clock), Error);
    clock.advance_secs(121);
    assert_eq!(step(&mut bms, &clock), Undefined);
    assert_eq!(step(&mut bms, &clock), GoRunning);
}

#[test]
fn unresponsive_rack_exhausts_attempts() {
    let clock = ManualClock::new();
    let (mut bms, spy) = rack(StartStopConfig::Start, Duration::from_secs(5));
    spy.set_deaf(true);

    assert_eq!(step(&mut bms, &clock), GoRunning);
    for _ in 0..3 {
        assert_eq!(step(&mut bms, &clock), GoRunning);
        clock.advance_secs(31);
    }
    assert_eq!(spy.commands(), 3);
    assert_eq!(step(&mut bms, &clock), Undefined);
    assert!(bms.max_start_attempts());
    assert!(bms.snapshot().max_start_attempts);

    // Next sojourn gets a fresh budget.
    spy.set_deaf(false);
    assert_eq!(step(&mut bms, &clock), GoRunning);
    assert_eq!(step(&mut bms, &clock), GoRunning);
    assert!(!bms.max_start_attempts());
    assert_eq!(spy.commands(), 4);
}

#[test]
fn precharge_timeout() {
    let clock = ManualClock::new();
    let (mut bms, _spy) = rack(StartStopConfig::Start, Duration::from_secs(600));

    step(&mut bms, &clock);
    step(&mut bms, &clock);
    assert_eq!(step(&mut bms, &clock), Precharge);
    assert_eq!(step(&mut bms, &clock), Precharge);
    clock.advance_secs(61);
    assert_eq!(step(&mut bms, &clock), Error);
    assert_eq!(step(&mut bms, &clock), Error);
    assert_eq!(step(&mut bms, &clock), Error);
    assert_eq!(bms.device().contactor_state(), ContactorState::CutOff);
}

#[test]
fn stuck_precharge_is_opened_on_every_timeout() {
    let clock = ManualClock::new();
    let (mut bms, spy) = rack(StartStopConfig::Start, Duration::from_secs(1_000_000));

    assert_eq!(step(&mut bms, &clock), GoRunning);
    for round in 1..=3u32 {
        assert_eq!(step(&mut bms, &clock), GoRunning);
        assert_eq!(spy.commands(), 2 * round - 1);
        assert_eq!(step(&mut bms, &clock), Precharge);
        assert_eq!(step(&mut bms, &clock), Precharge);

        clock.advance_secs(61);
        assert_eq!(step(&mut bms, &clock), Error);
        assert_eq!(step(&mut bms, &clock), Error);
        assert_eq!(spy.commands(), 2 * round);
        assert_eq!(step(&mut bms, &clock), Error);
        assert_eq!(bms.device().contactor_state(), ContactorState::CutOff);

        // Next precharge only after the error wait.
        clock.advance_secs(121);
        assert_eq!(step(&mut bms, &clock), Undefined);
        assert_eq!(step(&mut bms, &clock), GoRunning);
    }
    assert_eq!(spy.resets(), 3);
}

#[test]
fn error_entry_opens_contactors_before_reset() {
    let clock = ManualClock::new();
    let (mut bms, spy) = running_rack(&clock);

    spy.set_fault(true);
    spy.set_broken(true);
    assert_eq!(step(&mut bms, &clock), Undefined);
    assert_eq!(step(&mut bms, &clock), Error);

    let err = cycle_battery(&mut bms, &clock).unwrap_err();
    assert_eq!(err.state(), "ERROR");
    assert_eq!(spy.resets(), 0);

    spy.set_broken(false);
    assert_eq!(step(&mut bms, &clock), Error);
    assert_eq!(spy.commands(), 2);
    assert_eq!(spy.resets(), 1);
}

#[test]
fn broken_link_sets_run_failed() {
    let clock = ManualClock::new();
    let (mut bms, spy) = rack(StartStopConfig::Start, Duration::from_secs(5));
    assert_eq!(step(&mut bms, &clock), GoRunning);

    spy.set_broken(true);
    let err = cycle_battery(&mut bms, &clock).unwrap_err();
    assert_eq!(err.state(), "GO_RUNNING");
    assert!(bms.run_failed());
    assert!(bms.snapshot().run_failed);
    assert_eq!(bms.state(), GoRunning);

    spy.set_broken(false);
    assert_eq!(step(&mut bms, &clock), GoRunning);
    assert!(!bms.run_failed());
    assert_eq!(spy.commands(), 1);
}

#[test]
fn auto_mode_follows_runtime_requests() {
    let clock = ManualClock::new();
    let (mut bms, _spy) = rack(StartStopConfig::Auto, Duration::ZERO);

    assert_eq!(step(&mut bms, &clock), Undefined);
    assert_eq!(step(&mut bms, &clock), Undefined);

    bms.set_start_stop(StartStop::Start);
    assert_eq!(step(&mut bms, &clock), GoRunning);
    assert_eq!(step(&mut bms, &clock), GoRunning);
    // Zero precharge: ON_GRID on the refresh that applies the command.
    assert_eq!(step(&mut bms, &clock), Running);
    assert_eq!(step(&mut bms, &clock), Running);
    assert_eq!(bms.start_stop(), StartStop::Start);

    bms.set_start_stop(StartStop::Stop);
    assert_eq!(step(&mut bms, &clock), Undefined);
    assert_eq!(step(&mut bms, &clock), GoStopped);
}
