//! Simulated devices.
//!
//! Software stand-ins for a battery rack and a battery inverter, for running
//! the edge service without hardware and for integration tests. Commands are
//! latched when written and only take effect on the next `refresh`, the way a
//! field device reacts between two polls.

mod battery;
mod inverter;

pub use battery::SimulatedBattery;
pub use inverter::SimulatedInverter;
