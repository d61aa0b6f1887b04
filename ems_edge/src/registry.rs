//! Device driver registry.
//!
//! Maps the `driver` name of a `[[battery]]` or `[[inverter]]` table to a
//! factory that builds the device. Constructed at startup and passed to
//! [`Fleet::build`](crate::fleet::Fleet::build); no global state.

use crate::config::{BatteryConfig, DEFAULT_DRIVER, InverterConfig};
use ems_devices::sim::{SimulatedBattery, SimulatedInverter};
use ems_devices::{BatteryDevice, BatteryInverterDevice};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

pub type BatteryFactory = fn(&BatteryConfig) -> Box<dyn BatteryDevice>;
pub type InverterFactory = fn(&InverterConfig) -> Box<dyn BatteryInverterDevice>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("{device}: no {kind} driver named '{driver}'")]
    DriverNotFound {
        device: String,
        kind: &'static str,
        driver: String,
    },

    #[error("{device}: {kind} '{target}' is not part of the fleet")]
    UnresolvedDevice {
        device: String,
        kind: &'static str,
        target: String,
    },
}

pub struct DriverRegistry {
    batteries: HashMap<&'static str, BatteryFactory>,
    inverters: HashMap<&'static str, InverterFactory>,
}

impl DriverRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            batteries: HashMap::new(),
            inverters: HashMap::new(),
        }
    }

    /// Registry with the simulation drivers.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register_battery(DEFAULT_DRIVER, simulated_battery);
        registry.register_inverter(DEFAULT_DRIVER, simulated_inverter);
        registry
    }

    /// # Panics
    /// Panics if a battery driver with the same name is already registered.
    pub fn register_battery(&mut self, name: &'static str, factory: BatteryFactory) {
        if self.batteries.contains_key(name) {
            panic!("Battery driver '{name}' is already registered");
        }
        self.batteries.insert(name, factory);
    }

    /// # Panics
    /// Panics if an inverter driver with the same name is already registered.
    pub fn register_inverter(&mut self, name: &'static str, factory: InverterFactory) {
        if self.inverters.contains_key(name) {
            panic!("Inverter driver '{name}' is already registered");
        }
        self.inverters.insert(name, factory);
    }

    /// # Errors
    /// `RegistryError::DriverNotFound` if `config.driver` is not registered.
    pub fn create_battery(
        &self,
        config: &BatteryConfig,
    ) -> Result<Box<dyn BatteryDevice>, RegistryError> {
        let factory = self.batteries.get(config.driver.as_str()).ok_or_else(|| {
            RegistryError::DriverNotFound {
                device: config.id.clone(),
                kind: "battery",
                driver: config.driver.clone(),
            }
        })?;
        Ok(factory(config))
    }

    /// # Errors
    /// `RegistryError::DriverNotFound` if `config.driver` is not registered.
    pub fn create_inverter(
        &self,
        config: &InverterConfig,
    ) -> Result<Box<dyn BatteryInverterDevice>, RegistryError> {
        let factory = self.inverters.get(config.driver.as_str()).ok_or_else(|| {
            RegistryError::DriverNotFound {
                device: config.id.clone(),
                kind: "inverter",
                driver: config.driver.clone(),
            }
        })?;
        Ok(factory(config))
    }

    pub fn list_battery_drivers(&self) -> Vec<&'static str> {
        self.batteries.keys().copied().collect()
    }

    pub fn list_inverter_drivers(&self) -> Vec<&'static str> {
        self.inverters.keys().copied().collect()
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn simulated_battery(config: &BatteryConfig) -> Box<dyn BatteryDevice> {
    Box::new(SimulatedBattery::new(
        config.id.clone(),
        config.start_stop,
        Duration::from_secs(config.simulation.precharge_s),
    ))
}

fn simulated_inverter(config: &InverterConfig) -> Box<dyn BatteryInverterDevice> {
    Box::new(SimulatedInverter::new(
        config.id.clone(),
        config.start_stop,
        Duration::from_secs(config.simulation.startup_s),
    ))
}
