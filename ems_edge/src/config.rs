//! Site configuration (`edge.toml`).
//!
//! # TOML Example
//!
//! ```toml
//! [shared]
//! service_name = "ems-edge-01"
//! log_level = "info"
//!
//! [cycle]
//! cycle_time_ms = 1000
//! stats_log_interval = 60
//!
//! [[battery]]
//! id = "bms0"
//! simulation = { precharge_s = 5 }
//!
//! [[inverter]]
//! id = "inv0"
//! battery = "bms0"
//!
//! [[ess]]
//! id = "ess0"
//! start_stop = "start"
//! battery = "bms0"
//! inverter = "inv0"
//! ```

use ems_common::config::{ConfigError, ConfigLoader, SharedConfig};
use ems_common::consts::{DEFAULT_CYCLE_TIME_MS, MAX_DEVICE_ID_LEN};
use ems_common::startstop::StartStopConfig;
use ems_devices::Timing;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use thiserror::Error;

/// Driver used when a device table names none.
pub const DEFAULT_DRIVER: &str = "simulation";

fn default_driver() -> String {
    DEFAULT_DRIVER.to_string()
}

// ─── Errors ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EdgeConfigError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{kind} with empty id")]
    EmptyId { kind: &'static str },

    #[error("device id '{id}' is longer than {max} characters", max = MAX_DEVICE_ID_LEN)]
    IdTooLong { id: String },

    #[error("device id '{0}' is used more than once")]
    DuplicateId(String),

    #[error("{device}: unknown {kind} '{target}'")]
    UnknownReference {
        device: String,
        kind: &'static str,
        target: String,
    },

    #[error("{kind} '{id}' is claimed by more than one ESS")]
    SharedSubDevice { kind: &'static str, id: String },

    #[error("{ess}: inverter '{inverter}' is attached to battery '{attached}', not '{battery}'")]
    PairMismatch {
        ess: String,
        inverter: String,
        attached: String,
        battery: String,
    },

    #[error("cycle_time_ms must be positive")]
    InvalidCycleTime,
}

// ─── Sections ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CycleConfig {
    /// Scheduler period [ms].
    pub cycle_time_ms: u64,
    /// Log a device snapshot every N cycles (0 = never).
    pub stats_log_interval: u64,
    /// Stop the service after this many overruns in a row (0 = never).
    pub max_consecutive_overruns: u32,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            cycle_time_ms: DEFAULT_CYCLE_TIME_MS,
            stats_log_interval: 60,
            max_consecutive_overruns: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatterySimConfig {
    /// Time from CONNECTION_INITIATING to ON_GRID [s].
    pub precharge_s: u64,
}

impl Default for BatterySimConfig {
    fn default() -> Self {
        Self { precharge_s: 5 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InverterSimConfig {
    /// Time from STARTING to GRID_CONNECTED [s].
    pub startup_s: u64,
}

impl Default for InverterSimConfig {
    fn default() -> Self {
        Self { startup_s: 2 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatteryConfig {
    pub id: String,
    #[serde(default = "default_driver")]
    pub driver: String,
    #[serde(default)]
    pub start_stop: StartStopConfig,
    #[serde(default)]
    pub timing: Timing,
    #[serde(default)]
    pub simulation: BatterySimConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InverterConfig {
    pub id: String,
    #[serde(default = "default_driver")]
    pub driver: String,
    #[serde(default)]
    pub start_stop: StartStopConfig,
    #[serde(default)]
    pub timing: Timing,
    /// Battery this inverter runs on. RUNNING requires it to be started.
    #[serde(default)]
    pub battery: Option<String>,
    #[serde(default)]
    pub simulation: InverterSimConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EssConfig {
    pub id: String,
    #[serde(default)]
    pub start_stop: StartStopConfig,
    #[serde(default)]
    pub timing: Timing,
    pub battery: String,
    pub inverter: String,
}

// ─── Root ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeConfig {
    pub shared: SharedConfig,
    #[serde(default)]
    pub cycle: CycleConfig,
    #[serde(default, rename = "battery")]
    pub batteries: Vec<BatteryConfig>,
    #[serde(default, rename = "inverter")]
    pub inverters: Vec<InverterConfig>,
    #[serde(default)]
    pub ess: Vec<EssConfig>,
}

impl EdgeConfig {
    /// Load and validate `edge.toml`.
    pub fn load_validated(path: &Path) -> Result<Self, EdgeConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_validated(content: &str) -> Result<Self, EdgeConfigError> {
        let config = Self::from_toml_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn device_count(&self) -> usize {
        self.batteries.len() + self.inverters.len() + self.ess.len()
    }

    /// # Errors
    ///
    /// First violation found, in this order: shared section, cycle time,
    /// ids, timings, references, ESS ownership.
    pub fn validate(&self) -> Result<(), EdgeConfigError> {
        self.shared.validate()?;
        if self.cycle.cycle_time_ms == 0 {
            return Err(EdgeConfigError::InvalidCycleTime);
        }

        let mut ids = HashSet::new();
        let all_ids = self
            .batteries
            .iter()
            .map(|b| ("battery", b.id.as_str()))
            .chain(self.inverters.iter().map(|i| ("inverter", i.id.as_str())))
            .chain(self.ess.iter().map(|e| ("ess", e.id.as_str())));
        for (kind, id) in all_ids {
            if id.trim().is_empty() {
                return Err(EdgeConfigError::EmptyId { kind });
            }
            if id.len() > MAX_DEVICE_ID_LEN {
                return Err(EdgeConfigError::IdTooLong { id: id.to_string() });
            }
            if !ids.insert(id) {
                return Err(EdgeConfigError::DuplicateId(id.to_string()));
            }
        }

        for battery in &self.batteries {
            battery.timing.validate(&battery.id)?;
        }
        for inverter in &self.inverters {
            inverter.timing.validate(&inverter.id)?;
        }
        for ess in &self.ess {
            ess.timing.validate(&ess.id)?;
        }

        let battery_ids: HashSet<&str> = self.batteries.iter().map(|b| b.id.as_str()).collect();
        let inverter_battery: HashMap<&str, Option<&str>> = self
            .inverters
            .iter()
            .map(|i| (i.id.as_str(), i.battery.as_deref()))
            .collect();

        for inverter in &self.inverters {
            if let Some(battery) = &inverter.battery
                && !battery_ids.contains(battery.as_str())
            {
                return Err(EdgeConfigError::UnknownReference {
                    device: inverter.id.clone(),
                    kind: "battery",
                    target: battery.clone(),
                });
            }
        }

        let mut claimed_batteries = HashSet::new();
        let mut claimed_inverters = HashSet::new();
        for ess in &self.ess {
            if !battery_ids.contains(ess.battery.as_str()) {
                return Err(EdgeConfigError::UnknownReference {
                    device: ess.id.clone(),
                    kind: "battery",
                    target: ess.battery.clone(),
                });
            }
            let Some(attached) = inverter_battery.get(ess.inverter.as_str()) else {
                return Err(EdgeConfigError::UnknownReference {
                    device: ess.id.clone(),
                    kind: "inverter",
                    target: ess.inverter.clone(),
                });
            };
            if let Some(attached) = attached
                && *attached != ess.battery
            {
                return Err(EdgeConfigError::PairMismatch {
                    ess: ess.id.clone(),
                    inverter: ess.inverter.clone(),
                    attached: attached.to_string(),
                    battery: ess.battery.clone(),
                });
            }
            if !claimed_batteries.insert(ess.battery.as_str()) {
                return Err(EdgeConfigError::SharedSubDevice {
                    kind: "battery",
                    id: ess.battery.clone(),
                });
            }
            if !claimed_inverters.insert(ess.inverter.as_str()) {
                return Err(EdgeConfigError::SharedSubDevice {
                    kind: "inverter",
                    id: ess.inverter.clone(),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SITE: &str = r#"
        [shared]
        service_name = "site"

        [[battery]]
        id = "bms0"

        [[inverter]]
        id = "inv0"
        battery = "bms0"

        [[ess]]
        id = "ess0"
        battery = "bms0"
        inverter = "inv0"
    "#;

    fn site() -> EdgeConfig {
        EdgeConfig::from_toml_str(SITE).unwrap()
    }

    #[test]
    fn defaults_are_applied() {
        let config = EdgeConfig::from_toml_validated(SITE).unwrap();
        assert_eq!(config.cycle, CycleConfig::default());
        assert_eq!(config.batteries[0].driver, DEFAULT_DRIVER);
        assert_eq!(config.batteries[0].start_stop, StartStopConfig::Auto);
        assert_eq!(config.batteries[0].timing, Timing::default());
        assert_eq!(config.inverters[0].simulation.startup_s, 2);
        assert_eq!(config.device_count(), 3);
    }

    #[test]
    fn duplicate_id_across_families() {
        let mut config = site();
        config.ess[0].id = "bms0".to_string();
        assert_eq!(
            config.validate(),
            Err(EdgeConfigError::DuplicateId("bms0".to_string()))
        );
    }

    #[test]
    fn empty_and_long_ids() {
        let mut config = site();
        config.inverters[0].id = " ".to_string();
        assert_eq!(
            config.validate(),
            Err(EdgeConfigError::EmptyId { kind: "inverter" })
        );

        let mut config = site();
        config.batteries[0].id = "b".repeat(MAX_DEVICE_ID_LEN + 1);
        assert!(matches!(
            config.validate(),
            Err(EdgeConfigError::IdTooLong { .. })
        ));
    }

    #[test]
    fn unknown_references() {
        let mut config = site();
        config.inverters[0].battery = Some("bms9".to_string());
        assert!(matches!(
            config.validate(),
            Err(EdgeConfigError::UnknownReference { kind: "battery", .. })
        ));

        let mut config = site();
        config.ess[0].inverter = "inv9".to_string();
        assert!(matches!(
            config.validate(),
            Err(EdgeConfigError::UnknownReference { kind: "inverter", .. })
        ));
    }

    #[test]
    fn ess_pair_must_match_inverter_battery() {
        let mut config = site();
        config.batteries.push(BatteryConfig {
            id: "bms1".to_string(),
            ..config.batteries[0].clone()
        });
        config.ess[0].battery = "bms1".to_string();
        assert!(matches!(
            config.validate(),
            Err(EdgeConfigError::PairMismatch { .. })
        ));
    }

    #[test]
    fn sub_device_owned_by_one_ess() {
        let mut config = site();
        config.inverters.push(InverterConfig {
            id: "inv1".to_string(),
            battery: None,
            ..config.inverters[0].clone()
        });
        config.ess.push(EssConfig {
            id: "ess1".to_string(),
            inverter: "inv1".to_string(),
            ..config.ess[0].clone()
        });
        assert_eq!(
            config.validate(),
            Err(EdgeConfigError::SharedSubDevice {
                kind: "battery",
                id: "bms0".to_string(),
            })
        );
    }

    #[test]
    fn zero_timings_rejected() {
        let mut config = site();
        config.cycle.cycle_time_ms = 0;
        assert_eq!(config.validate(), Err(EdgeConfigError::InvalidCycleTime));

        let mut config = site();
        config.ess[0].timing.max_start_attempts = 0;
        assert!(matches!(
            config.validate(),
            Err(EdgeConfigError::Config(ConfigError::ValidationError(_)))
        ));
    }
}
