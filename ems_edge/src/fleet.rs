//! The site's device controllers and the per-cycle schedule.
//!
//! One cycle:
//! 1. refresh live data of every battery and inverter,
//! 2. tick batteries,
//! 3. tick inverters, each with its battery's published run state,
//! 4. tick ESS units with their battery and inverter,
//! 5. forward ESS start/stop requests to the sub-device controllers.
//!
//! Sub-devices always tick before their parent, so an ESS sees the run
//! state published in the same cycle. Requests forwarded in step 5 take
//! effect on the next cycle.

use crate::config::EdgeConfig;
use crate::registry::{DriverRegistry, RegistryError};
use ems_common::clock::Clock;
use ems_devices::ess::ComposedEss;
use ems_devices::{
    BatteryController, BatteryDevice, BatteryInverterDevice, EssController, EssDevice,
    EssRequests, InverterController, battery, ess, inverter,
};
use ems_statemachine::prelude::*;
use tracing::{debug, warn};

struct InverterSlot {
    controller: InverterController,
    battery: Option<usize>,
}

struct EssSlot {
    controller: EssController,
    battery: usize,
    inverter: usize,
}

/// Outcome of one cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleOutcome {
    /// Controllers whose tick returned an error.
    pub failed: usize,
    /// Sub-device requests forwarded by ESS units.
    pub forwarded: usize,
}

pub struct Fleet {
    batteries: Vec<BatteryController>,
    inverters: Vec<InverterSlot>,
    ess: Vec<EssSlot>,
}

impl Fleet {
    /// Instantiate every configured device. `config` must be validated.
    ///
    /// # Errors
    /// - `RegistryError::DriverNotFound` for an unknown driver name
    /// - `RegistryError::UnresolvedDevice` for a reference to a missing device
    pub fn build(config: &EdgeConfig, registry: &DriverRegistry) -> Result<Self, RegistryError> {
        let mut batteries = Vec::with_capacity(config.batteries.len());
        for cfg in &config.batteries {
            let device = registry.create_battery(cfg)?;
            batteries.push(battery::controller(device, &cfg.timing));
        }

        let mut inverters = Vec::with_capacity(config.inverters.len());
        for cfg in &config.inverters {
            let battery = cfg
                .battery
                .as_deref()
                .map(|id| resolve(&batteries, &cfg.id, "battery", id, BatteryController::id))
                .transpose()?;
            let device = registry.create_inverter(cfg)?;
            inverters.push(InverterSlot {
                controller: inverter::controller(device, &cfg.timing),
                battery,
            });
        }

        let mut units = Vec::with_capacity(config.ess.len());
        for cfg in &config.ess {
            let battery = resolve(&batteries, &cfg.id, "battery", &cfg.battery, BatteryController::id)?;
            let inverter = resolve(&inverters, &cfg.id, "inverter", &cfg.inverter, |s| {
                s.controller.id()
            })?;
            let device = ComposedEss::new(
                cfg.id.clone(),
                cfg.start_stop,
                cfg.battery.clone(),
                cfg.inverter.clone(),
            );
            units.push(EssSlot {
                controller: ess::controller(Box::new(device), &cfg.timing),
                battery,
                inverter,
            });
        }

        Ok(Self {
            batteries,
            inverters,
            ess: units,
        })
    }

    /// Run one scheduler cycle. Tick errors are counted, never propagated:
    /// a failing device must not stall the others.
    pub fn run_cycle(&mut self, clock: &dyn Clock) -> CycleOutcome {
        let mut outcome = CycleOutcome::default();
        let now = clock.now();

        for controller in &mut self.batteries {
            controller.device_mut().refresh(now);
        }
        for slot in &mut self.inverters {
            slot.controller.device_mut().refresh(now);
        }

        for controller in &mut self.batteries {
            if controller.run_cycle(clock, Dependencies::none()).is_err() {
                outcome.failed += 1;
            }
        }

        for slot in &mut self.inverters {
            let deps = match slot.battery {
                Some(b) => dependencies(&[battery_dependency(&self.batteries[b])]),
                None => Dependencies::none(),
            };
            if slot.controller.run_cycle(clock, deps).is_err() {
                outcome.failed += 1;
            }
        }

        for slot in &mut self.ess {
            let deps = dependencies(&[
                battery_dependency(&self.batteries[slot.battery]),
                inverter_dependency(&self.inverters[slot.inverter].controller),
            ]);
            if slot.controller.run_cycle(clock, deps).is_err() {
                outcome.failed += 1;
            }

            let requests = slot.controller.device_mut().take_requests();
            outcome.forwarded += forward(
                &requests,
                &mut self.batteries[slot.battery],
                &mut self.inverters[slot.inverter].controller,
            );
        }

        outcome
    }

    pub fn snapshots(&self) -> Vec<DeviceSnapshot> {
        self.batteries
            .iter()
            .map(BatteryController::snapshot)
            .chain(self.inverters.iter().map(|s| s.controller.snapshot()))
            .chain(self.ess.iter().map(|s| s.controller.snapshot()))
            .collect()
    }

    pub fn battery(&self, id: &str) -> Option<&BatteryController> {
        self.batteries.iter().find(|c| c.id() == id)
    }

    pub fn battery_mut(&mut self, id: &str) -> Option<&mut BatteryController> {
        self.batteries.iter_mut().find(|c| c.id() == id)
    }

    pub fn inverter(&self, id: &str) -> Option<&InverterController> {
        self.inverters
            .iter()
            .map(|s| &s.controller)
            .find(|c| c.id() == id)
    }

    pub fn inverter_mut(&mut self, id: &str) -> Option<&mut InverterController> {
        self.inverters
            .iter_mut()
            .map(|s| &mut s.controller)
            .find(|c| c.id() == id)
    }

    pub fn ess(&self, id: &str) -> Option<&EssController> {
        self.ess.iter().map(|s| &s.controller).find(|c| c.id() == id)
    }

    pub fn ess_mut(&mut self, id: &str) -> Option<&mut EssController> {
        self.ess
            .iter_mut()
            .map(|s| &mut s.controller)
            .find(|c| c.id() == id)
    }

    pub fn len(&self) -> usize {
        self.batteries.len() + self.inverters.len() + self.ess.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn resolve<T>(
    items: &[T],
    device: &str,
    kind: &'static str,
    target: &str,
    id_of: impl Fn(&T) -> &str,
) -> Result<usize, RegistryError> {
    items
        .iter()
        .position(|item| id_of(item) == target)
        .ok_or_else(|| RegistryError::UnresolvedDevice {
            device: device.to_string(),
            kind,
            target: target.to_string(),
        })
}

fn battery_dependency(controller: &BatteryController) -> Dependency {
    Dependency::new(
        Role::Battery,
        controller.start_stop(),
        controller.device().has_faults(),
    )
}

fn inverter_dependency(controller: &InverterController) -> Dependency {
    Dependency::new(
        Role::BatteryInverter,
        controller.start_stop(),
        controller.device().has_faults(),
    )
}

fn dependencies(entries: &[Dependency]) -> Dependencies {
    let mut deps = Dependencies::none();
    for &entry in entries {
        if let Err(dropped) = deps.push(entry) {
            warn!(role = ?dropped.role, "dependency list full, entry dropped");
        }
    }
    deps
}

/// Apply ESS requests; returns how many were forwarded.
fn forward(
    requests: &EssRequests,
    battery: &mut BatteryController,
    inverter: &mut InverterController,
) -> usize {
    let mut forwarded = 0;
    if let Some(value) = requests.battery {
        debug!(battery = battery.id(), request = %value, "forwarding ESS request");
        battery.set_start_stop(value);
        forwarded += 1;
    }
    if let Some(value) = requests.inverter {
        debug!(inverter = inverter.id(), request = %value, "forwarding ESS request");
        inverter.set_start_stop(value);
        forwarded += 1;
    }
    forwarded
}
