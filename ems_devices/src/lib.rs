//! # EMS device families
//!
//! Lifecycle handler sets for the three device families of an energy storage
//! installation, each built on [`ems_statemachine`]:
//!
//! | Family | Device trait | States |
//! |---|---|---|
//! | [`battery`] | [`BatteryDevice`] | skeleton + `PRECHARGE` |
//! | [`inverter`] | [`BatteryInverterDevice`] | skeleton |
//! | [`ess`] | [`EssDevice`] | skeleton + `START_BATTERY_INVERTER`, `STOP_BATTERY` |
//!
//! [`sim`] provides simulated battery and inverter devices used by the edge
//! binary in simulation mode and by the tests.

pub mod battery;
pub mod ess;
pub mod inverter;
pub mod sim;
pub mod timing;

pub use battery::{BatteryController, BatteryDevice, BatteryHandlers, BatteryState};
pub use ess::{ComposedEss, EssController, EssDevice, EssHandlers, EssRequests, EssState};
pub use inverter::{BatteryInverterDevice, InverterController, InverterHandlers, InverterState};
pub use timing::Timing;
