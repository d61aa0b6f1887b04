//! # EMS Common Library
//!
//! Shared definitions used by every crate of the EMS edge workspace:
//!
//! - [`startstop`]: operator intent and published run state of a device.
//! - [`clock`]: substitutable monotonic time source.
//! - [`config`]: TOML configuration loading.
//! - [`consts`]: default cycle and lifecycle timings.

pub mod clock;
pub mod config;
pub mod consts;
pub mod prelude;
pub mod startstop;
