//! Timing helpers owned by individual state handlers.
//!
//! - [`RetryTimer`] bounds repeated hardware commands: at most one per
//!   interval, at most `max_attempts` per sojourn.
//! - [`WaitWindow`] measures a fixed dwell time from a stamped instant.
//!
//! Both are reset by the owning handler's entry action.

use std::time::{Duration, Instant};

/// Outcome of [`RetryTimer::poll`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Interval since the last attempt has not elapsed.
    Wait,
    /// A new attempt may be issued now.
    Attempt,
    /// Interval elapsed but all attempts are used up.
    Exhausted,
}

/// Bounded retry with fixed backoff.
#[derive(Debug, Clone)]
pub struct RetryTimer {
    interval: Duration,
    max_attempts: u8,
    last_attempt: Option<Instant>,
    attempts: u8,
}

impl RetryTimer {
    pub const fn new(interval: Duration, max_attempts: u8) -> Self {
        Self {
            interval,
            max_attempts,
            last_attempt: None,
            attempts: 0,
        }
    }

    /// Forget all previous attempts.
    pub fn reset(&mut self) {
        self.last_attempt = None;
        self.attempts = 0;
    }

    /// Decide what to do at `now`. Does not modify the timer.
    ///
    /// The first poll after a reset always allows an attempt. Exhaustion is
    /// only reported once the interval after the last attempt has elapsed.
    pub fn poll(&self, now: Instant) -> RetryDecision {
        if let Some(last) = self.last_attempt
            && now.saturating_duration_since(last) <= self.interval
        {
            return RetryDecision::Wait;
        }
        if self.attempts >= self.max_attempts {
            RetryDecision::Exhausted
        } else {
            RetryDecision::Attempt
        }
    }

    /// Record a successfully issued attempt.
    pub fn record_attempt(&mut self, now: Instant) {
        self.last_attempt = Some(now);
        self.attempts = self.attempts.saturating_add(1);
    }

    #[inline]
    pub const fn attempts(&self) -> u8 {
        self.attempts
    }

    #[inline]
    pub const fn max_attempts(&self) -> u8 {
        self.max_attempts
    }

    #[inline]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    #[inline]
    pub const fn last_attempt(&self) -> Option<Instant> {
        self.last_attempt
    }
}

/// Fixed dwell time measured from a stamped instant.
#[derive(Debug, Clone)]
pub struct WaitWindow {
    duration: Duration,
    started: Option<Instant>,
}

impl WaitWindow {
    pub const fn new(duration: Duration) -> Self {
        Self {
            duration,
            started: None,
        }
    }

    pub fn start(&mut self, now: Instant) {
        self.started = Some(now);
    }

    pub fn clear(&mut self) {
        self.started = None;
    }

    /// True once strictly more than the window has passed. An unstarted
    /// window never elapses.
    pub fn has_elapsed(&self, now: Instant) -> bool {
        self.started
            .is_some_and(|t| now.saturating_duration_since(t) > self.duration)
    }

    pub fn remaining(&self, now: Instant) -> Duration {
        match self.started {
            Some(t) => self
                .duration
                .saturating_sub(now.saturating_duration_since(t)),
            None => self.duration,
        }
    }

    #[inline]
    pub const fn started(&self) -> Option<Instant> {
        self.started
    }

    #[inline]
    pub const fn duration(&self) -> Duration {
        self.duration
    }
}
