//! Lifecycle integration tests.
//!
//! Drive battery and inverter controllers cycle by cycle against the
//! simulated devices, with live data refreshed before each tick the way the
//! edge scheduler does it.

mod lifecycle;
