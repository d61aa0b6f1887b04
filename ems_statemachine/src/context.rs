//! Per-cycle execution context.
//!
//! Built fresh for one device and one tick, then dropped. It carries:
//!
//! - a mutable borrow of the device (never stored by a handler),
//! - the time source, with `now` read once so every handler of the tick sees
//!   the same instant,
//! - a read-only [`Dependencies`] snapshot of the sub-devices this device
//!   relies on, collected by the scheduler before the tick.

use ems_common::clock::Clock;
use ems_common::consts::MAX_DEPENDENCIES;
use ems_common::startstop::StartStop;
use heapless::Vec;
use static_assertions::assert_impl_all;
use std::time::{Duration, Instant};

// ─── Dependencies ───────────────────────────────────────────────────

/// Role a sub-device plays for its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Role {
    Battery = 0,
    BatteryInverter = 1,
}

/// Published status of one sub-device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dependency {
    pub role: Role,
    pub start_stop: StartStop,
    pub faulted: bool,
}

impl Dependency {
    pub const fn new(role: Role, start_stop: StartStop, faulted: bool) -> Self {
        Self {
            role,
            start_stop,
            faulted,
        }
    }
}

/// Snapshot of the sub-devices a device depends on.
#[derive(Debug, Clone, Default)]
pub struct Dependencies {
    entries: Vec<Dependency, MAX_DEPENDENCIES>,
}

impl Dependencies {
    /// Empty snapshot, for devices without sub-devices.
    pub const fn none() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Add a sub-device. Gives the entry back if the snapshot is full.
    pub fn push(&mut self, dependency: Dependency) -> Result<(), Dependency> {
        self.entries.push(dependency)
    }

    pub fn with(mut self, dependency: Dependency) -> Result<Self, Dependency> {
        self.push(dependency)?;
        Ok(self)
    }

    pub fn get(&self, role: Role) -> Option<&Dependency> {
        self.entries.iter().find(|d| d.role == role)
    }

    /// True if every sub-device reports started. Vacuously true when empty.
    pub fn all_started(&self) -> bool {
        self.entries.iter().all(|d| d.start_stop == StartStop::Start)
    }

    /// True if the sub-device with `role` exists and reports started.
    pub fn is_started(&self, role: Role) -> bool {
        self.get(role)
            .is_some_and(|d| d.start_stop == StartStop::Start)
    }

    /// True if the sub-device with `role` exists and reports stopped.
    pub fn is_stopped(&self, role: Role) -> bool {
        self.get(role).is_some_and(|d| d.start_stop == StartStop::Stop)
    }

    /// True if the sub-device with `role` exists and reports a fault.
    pub fn is_faulted(&self, role: Role) -> bool {
        self.get(role).is_some_and(|d| d.faulted)
    }

    pub fn any_faulted(&self) -> bool {
        self.entries.iter().any(|d| d.faulted)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

assert_impl_all!(Dependencies: Send, Sync, Clone);

// ─── Context ────────────────────────────────────────────────────────

/// Everything a state handler may look at during one tick.
pub struct Context<'a, D: ?Sized> {
    pub device: &'a mut D,
    clock: &'a dyn Clock,
    now: Instant,
    dependencies: Dependencies,
}

impl<'a, D: ?Sized> Context<'a, D> {
    pub fn new(device: &'a mut D, clock: &'a dyn Clock, dependencies: Dependencies) -> Self {
        let now = clock.now();
        Self {
            device,
            clock,
            now,
            dependencies,
        }
    }

    /// Timestamp of this tick.
    #[inline]
    pub const fn now(&self) -> Instant {
        self.now
    }

    /// Time elapsed between `since` and this tick. Zero if `since` lies ahead.
    #[inline]
    pub fn elapsed_since(&self, since: Instant) -> Duration {
        self.now.saturating_duration_since(since)
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock
    }

    #[inline]
    pub const fn dependencies(&self) -> &Dependencies {
        &self.dependencies
    }
}
