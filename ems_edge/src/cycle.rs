//! Cyclic scheduler.
//!
//! Runs [`Fleet::run_cycle`] once per configured period, paced with
//! `std::thread::sleep`. Overruns are counted and logged; with
//! `max_consecutive_overruns` set, a run of overruns stops the service.

use crate::config::CycleConfig;
use crate::fleet::Fleet;
use ems_common::clock::Clock;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

// ─── Statistics ─────────────────────────────────────────────────────

/// Cycle timing statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleStats {
    /// Total cycles executed.
    pub cycle_count: u64,
    /// Last cycle duration [ns].
    pub last_cycle_ns: u64,
    /// Minimum cycle duration [ns].
    pub min_cycle_ns: u64,
    /// Maximum cycle duration [ns].
    pub max_cycle_ns: u64,
    /// Running sum for average computation.
    pub sum_cycle_ns: u64,
    /// Number of overruns detected.
    pub overruns: u64,
    /// Cycles in which at least one controller failed.
    pub failed_cycles: u64,
}

impl CycleStats {
    pub const fn new() -> Self {
        Self {
            cycle_count: 0,
            last_cycle_ns: 0,
            min_cycle_ns: u64::MAX,
            max_cycle_ns: 0,
            sum_cycle_ns: 0,
            overruns: 0,
            failed_cycles: 0,
        }
    }

    /// Record a cycle duration.
    #[inline]
    pub fn record(&mut self, duration_ns: u64) {
        self.cycle_count += 1;
        self.last_cycle_ns = duration_ns;
        self.min_cycle_ns = self.min_cycle_ns.min(duration_ns);
        self.max_cycle_ns = self.max_cycle_ns.max(duration_ns);
        self.sum_cycle_ns = self.sum_cycle_ns.saturating_add(duration_ns);
    }

    /// Average cycle time [ns] (0 if no cycles).
    #[inline]
    pub fn avg_cycle_ns(&self) -> u64 {
        if self.cycle_count == 0 {
            0
        } else {
            self.sum_cycle_ns / self.cycle_count
        }
    }
}

impl Default for CycleStats {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Errors ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CycleError {
    #[error("cycle time must be positive")]
    InvalidCycleTime,

    #[error("{consecutive} consecutive overruns of the {budget_ms} ms cycle")]
    Overrun { consecutive: u32, budget_ms: u64 },
}

// ─── Runner ─────────────────────────────────────────────────────────

pub struct CycleRunner {
    cycle_time: Duration,
    stats_log_interval: u64,
    max_consecutive_overruns: u32,
    consecutive_overruns: u32,
    running: Arc<AtomicBool>,
    stats: CycleStats,
}

impl CycleRunner {
    /// # Errors
    /// `CycleError::InvalidCycleTime` if `cycle_time_ms` is zero.
    pub fn new(config: &CycleConfig) -> Result<Self, CycleError> {
        if config.cycle_time_ms == 0 {
            return Err(CycleError::InvalidCycleTime);
        }
        Ok(Self {
            cycle_time: Duration::from_millis(config.cycle_time_ms),
            stats_log_interval: config.stats_log_interval,
            max_consecutive_overruns: config.max_consecutive_overruns,
            consecutive_overruns: 0,
            running: Arc::new(AtomicBool::new(true)),
            stats: CycleStats::new(),
        })
    }

    /// Shared flag; storing `false` ends [`run`](Self::run) after the
    /// current cycle.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn stats(&self) -> &CycleStats {
        &self.stats
    }

    pub fn cycle_time(&self) -> Duration {
        self.cycle_time
    }

    /// Execute one cycle without pacing and return its duration.
    ///
    /// # Errors
    /// `CycleError::Overrun` once the configured overrun limit is reached.
    pub fn step(&mut self, fleet: &mut Fleet, clock: &dyn Clock) -> Result<Duration, CycleError> {
        let cycle_start = Instant::now();
        let outcome = fleet.run_cycle(clock);
        let elapsed = cycle_start.elapsed();

        self.stats
            .record(u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX));
        if outcome.failed > 0 {
            self.stats.failed_cycles += 1;
        }

        if elapsed > self.cycle_time {
            self.stats.overruns += 1;
            self.consecutive_overruns += 1;
            warn!(
                cycle = self.stats.cycle_count,
                elapsed_us = elapsed.as_micros() as u64,
                budget_ms = self.cycle_time.as_millis() as u64,
                "cycle overrun"
            );
            if self.max_consecutive_overruns > 0
                && self.consecutive_overruns >= self.max_consecutive_overruns
            {
                return Err(CycleError::Overrun {
                    consecutive: self.consecutive_overruns,
                    budget_ms: self.cycle_time.as_millis() as u64,
                });
            }
        } else {
            self.consecutive_overruns = 0;
        }

        if self.stats_log_interval > 0 && self.stats.cycle_count % self.stats_log_interval == 0 {
            self.log_status(fleet);
        }

        Ok(elapsed)
    }

    /// Run until the running flag is cleared or `max_cycles` is reached.
    ///
    /// # Errors
    /// See [`step`](Self::step).
    pub fn run(
        &mut self,
        fleet: &mut Fleet,
        clock: &dyn Clock,
        max_cycles: Option<u64>,
    ) -> Result<(), CycleError> {
        info!(
            cycle_ms = self.cycle_time.as_millis() as u64,
            devices = fleet.len(),
            "cycle loop started"
        );

        let mut executed = 0u64;
        while self.running.load(Ordering::SeqCst) {
            if max_cycles.is_some_and(|max| executed >= max) {
                debug!(executed, "cycle limit reached");
                break;
            }

            let elapsed = self.step(fleet, clock)?;
            executed += 1;

            if let Some(remaining) = self.cycle_time.checked_sub(elapsed) {
                std::thread::sleep(remaining);
            }
        }

        info!(
            cycles = self.stats.cycle_count,
            avg_us = self.stats.avg_cycle_ns() / 1_000,
            max_us = self.stats.max_cycle_ns / 1_000,
            overruns = self.stats.overruns,
            failed_cycles = self.stats.failed_cycles,
            "cycle loop stopped"
        );
        Ok(())
    }

    fn log_status(&self, fleet: &Fleet) {
        info!(
            cycle = self.stats.cycle_count,
            avg_us = self.stats.avg_cycle_ns() / 1_000,
            overruns = self.stats.overruns,
            "cycle stats"
        );
        for snapshot in fleet.snapshots() {
            info!(
                device = %snapshot.id,
                state = snapshot.state,
                start_stop = %snapshot.start_stop,
                faulted = snapshot.faulted,
                run_failed = snapshot.run_failed,
                max_start_attempts = snapshot.max_start_attempts,
                "device status"
            );
        }
    }
}
