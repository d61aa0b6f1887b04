//! # EMS Edge Library
//!
//! Cyclic scheduler that drives every device of a site through its
//! lifecycle state machine.
//!
//! # Module Structure
//!
//! - [`config`] - `edge.toml` loading and validation
//! - [`registry`] - Driver factory registration
//! - [`fleet`] - Device controllers and the per-cycle schedule
//! - [`cycle`] - Pacing loop and cycle statistics
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                        ems_edge                            │
//! │  ┌────────────┐   ┌──────────────┐   ┌──────────────────┐  │
//! │  │ edge.toml  │──►│ DriverRegistry│──►│      Fleet       │  │
//! │  └────────────┘   └──────────────┘   │ battery → inverter│  │
//! │                                      │   → ESS → forward │  │
//! │                   ┌──────────────┐   └────────▲─────────┘  │
//! │                   │ CycleRunner  │────────────┘            │
//! │                   └──────────────┘                         │
//! └────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod cycle;
pub mod fleet;
pub mod registry;

pub use config::{EdgeConfig, EdgeConfigError};
pub use cycle::{CycleError, CycleRunner, CycleStats};
pub use fleet::{CycleOutcome, Fleet};
pub use registry::{DriverRegistry, RegistryError};
