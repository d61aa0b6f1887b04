//! Handlers shared by every device family.
//!
//! UNDEFINED, RUNNING and STOPPED behave identically for batteries, inverters
//! and composite devices. GO_RUNNING, GO_STOPPED and ERROR issue family
//! specific commands and live next to each family.

use crate::context::Context;
use crate::device::ManagedDevice;
use crate::error::DeviceError;
use crate::state::{LifecycleState, StateHandler};
use ems_common::startstop::StartStop;
use tracing::debug;

/// UNDEFINED: single arbitration point between target and faults.
///
/// | Target | Faults | Next |
/// |---|---|---|
/// | UNDEFINED | any | UNDEFINED |
/// | START | yes | ERROR |
/// | START | no | GO_RUNNING |
/// | STOP | any | GO_STOPPED |
#[derive(Debug, Default, Clone, Copy)]
pub struct UndefinedHandler;

impl<S: LifecycleState, D: ManagedDevice + ?Sized> StateHandler<S, D> for UndefinedHandler {
    fn run(&mut self, ctx: &mut Context<'_, D>) -> Result<S, DeviceError> {
        Ok(match ctx.device.start_stop_target() {
            StartStop::Undefined => S::UNDEFINED,
            StartStop::Start if ctx.device.has_faults() => S::ERROR,
            StartStop::Start => S::GO_RUNNING,
            StartStop::Stop => S::GO_STOPPED,
        })
    }
}

/// RUNNING: stays while healthy, falls back to UNDEFINED otherwise.
#[derive(Debug, Default, Clone, Copy)]
pub struct RunningHandler;

impl<S: LifecycleState, D: ManagedDevice + ?Sized> StateHandler<S, D> for RunningHandler {
    fn run(&mut self, ctx: &mut Context<'_, D>) -> Result<S, DeviceError> {
        if ctx.device.has_faults() {
            return Ok(S::UNDEFINED);
        }
        if ctx.device.start_stop_target() == StartStop::Stop {
            return Ok(S::UNDEFINED);
        }
        let deps = ctx.dependencies();
        if !deps.all_started() || deps.any_faulted() {
            debug!(device = ctx.device.id(), "sub-device not started");
            return Ok(S::UNDEFINED);
        }
        ctx.device.mark_started();
        Ok(S::RUNNING)
    }
}

/// STOPPED: idle until the target moves away from STOP. Issues no commands.
#[derive(Debug, Default, Clone, Copy)]
pub struct StoppedHandler;

impl<S: LifecycleState, D: ManagedDevice + ?Sized> StateHandler<S, D> for StoppedHandler {
    fn run(&mut self, ctx: &mut Context<'_, D>) -> Result<S, DeviceError> {
        if ctx.device.start_stop_target() != StartStop::Stop {
            return Ok(S::UNDEFINED);
        }
        ctx.device.mark_stopped();
        Ok(S::STOPPED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Dependencies, Dependency, Role};
    use crate::device::DeviceCore;
    use ems_common::clock::ManualClock;
    use ems_common::startstop::StartStopConfig;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum S {
        Undefined,
        GoRunning,
        Running,
        GoStopped,
        Stopped,
        Error,
    }

    impl LifecycleState for S {
        const UNDEFINED: Self = S::Undefined;
        const GO_RUNNING: Self = S::GoRunning;
        const RUNNING: Self = S::Running;
        const GO_STOPPED: Self = S::GoStopped;
        const STOPPED: Self = S::Stopped;
        const ERROR: Self = S::Error;

        fn name(self) -> &'static str {
            "TEST"
        }
    }

    struct Dev {
        core: DeviceCore,
        faulted: bool,
    }

    impl ManagedDevice for Dev {
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

    fn dev(target: StartStop, faulted: bool) -> Dev {
        let mut core = DeviceCore::new("dev", StartStopConfig::Auto);
        core.target_mut().request(target);
        Dev { core, faulted }
    }

    fn run<H: StateHandler<S, Dev>>(handler: &mut H, dev: &mut Dev, deps: Dependencies) -> S {
        let clock = ManualClock::new();
        let mut ctx = Context::new(dev, &clock, deps);
        handler.run(&mut ctx).unwrap()
    }

    #[test]
    fn undefined_arbitration_table() {
        let cases = [
            (StartStop::Undefined, false, S::Undefined),
            (StartStop::Undefined, true, S::Undefined),
            (StartStop::Start, false, S::GoRunning),
            (StartStop::Start, true, S::Error),
            (StartStop::Stop, false, S::GoStopped),
            (StartStop::Stop, true, S::GoStopped),
        ];
        for (target, faulted, expected) in cases {
            let mut d = dev(target, faulted);
            assert_eq!(
                run(&mut UndefinedHandler, &mut d, Dependencies::none()),
                expected,
                "target={target} faulted={faulted}"
            );
        }
    }

    #[test]
    fn running_confirms_started() {
        let mut d = dev(StartStop::Start, false);
        assert_eq!(run(&mut RunningHandler, &mut d, Dependencies::none()), S::Running);
        assert!(d.is_started());
    }

    #[test]
    fn running_fault_falls_back_immediately() {
        let mut d = dev(StartStop::Start, true);
        assert_eq!(run(&mut RunningHandler, &mut d, Dependencies::none()), S::Undefined);
        assert!(!d.is_started());
    }

    #[test]
    fn running_stop_target_falls_back() {
        let mut d = dev(StartStop::Stop, false);
        assert_eq!(run(&mut RunningHandler, &mut d, Dependencies::none()), S::Undefined);
    }

    #[test]
    fn running_requires_started_sub_devices() {
        let mut d = dev(StartStop::Start, false);
        let deps = Dependencies::none()
            .with(Dependency::new(Role::Battery, StartStop::Undefined, false))
            .unwrap();
        assert_eq!(run(&mut RunningHandler, &mut d, deps), S::Undefined);

        let deps = Dependencies::none()
            .with(Dependency::new(Role::Battery, StartStop::Start, false))
            .unwrap();
        assert_eq!(run(&mut RunningHandler, &mut d, deps), S::Running);
    }

    #[test]
    fn stopped_is_idempotent() {
        let mut d = dev(StartStop::Stop, false);
        for _ in 0..3 {
            assert_eq!(run(&mut StoppedHandler, &mut d, Dependencies::none()), S::Stopped);
        }
        assert!(d.is_stopped());
    }

    #[test]
    fn stopped_leaves_on_target_change() {
        for target in [StartStop::Start, StartStop::Undefined] {
            let mut d = dev(target, false);
            assert_eq!(run(&mut StoppedHandler, &mut d, Dependencies::none()), S::Undefined);
        }
    }
}
