//! State machine engine.
//!
//! Holds the current state, fires entry actions exactly once per sojourn and
//! runs the active handler once per tick.
//!
//! ## Tick sequence
//! 1. A pending forced state (operator target change) is adopted without
//!    running any handler. Forcing is ignored while in ERROR, which always
//!    completes its remediation window.
//! 2. If the current state differs from the state whose handler ran last,
//!    its entry action runs. Failure aborts the tick; entry is retried on the
//!    next tick.
//! 3. The transition function runs and returns the next state.
//! 4. The next state is stored and returned.
//!
//! `tick` takes `&mut self`, so ticks of one device are serialized by the
//! borrow checker.

use crate::context::Context;
use crate::device::ManagedDevice;
use crate::error::StateMachineError;
use crate::state::{HandlerSet, LifecycleState};
use tracing::{debug, info};

/// Lifecycle engine for one device.
pub struct StateMachine<H: HandlerSet> {
    handlers: H,
    state: H::State,
    /// State whose handler ran on the previous tick.
    previous: Option<H::State>,
    forced: Option<H::State>,
}

impl<H: HandlerSet> StateMachine<H> {
    /// Create an engine in UNDEFINED.
    pub fn new(handlers: H) -> Self {
        Self {
            handlers,
            state: H::State::UNDEFINED,
            previous: None,
            forced: None,
        }
    }

    /// State for the next tick.
    #[inline]
    pub fn state(&self) -> H::State {
        self.state
    }

    /// State whose handler ran on the last successful entry, if any.
    #[inline]
    pub fn previous_state(&self) -> Option<H::State> {
        self.previous
    }

    /// Pending forced state, if any.
    #[inline]
    pub fn forced_state(&self) -> Option<H::State> {
        self.forced
    }

    pub fn handlers(&self) -> &H {
        &self.handlers
    }

    /// Jump to `state` at the start of the next tick.
    pub fn force_next_state(&mut self, state: H::State) {
        self.forced = Some(state);
    }

    /// Advance the machine by one cycle.
    ///
    /// # Errors
    /// - `StateMachineError::Entry` if the entry action failed
    /// - `StateMachineError::Handler` if the transition function failed
    ///
    /// The state is unchanged in both cases.
    pub fn tick(
        &mut self,
        ctx: &mut Context<'_, H::Device>,
    ) -> Result<H::State, StateMachineError> {
        let state = self.state;

        if let Some(forced) = self.forced.take() {
            if state == H::State::ERROR {
                debug!(
                    device = ctx.device.id(),
                    forced = forced.name(),
                    "forced state ignored in ERROR"
                );
            } else if forced != state {
                info!(
                    device = ctx.device.id(),
                    from = state.name(),
                    to = forced.name(),
                    "forced state change"
                );
                self.state = forced;
                self.previous = None;
                return Ok(forced);
            }
        }

        if self.previous != Some(state) {
            debug!(device = ctx.device.id(), state = state.name(), "entering state");
            self.handlers
                .handler(state)
                .on_entry(ctx)
                .map_err(|source| StateMachineError::Entry {
                    state: state.name(),
                    source,
                })?;
            self.previous = Some(state);
        }

        let next = self
            .handlers
            .handler(state)
            .run(ctx)
            .map_err(|source| StateMachineError::Handler {
                state: state.name(),
                source,
            })?;

        if next != state {
            info!(
                device = ctx.device.id(),
                from = state.name(),
                to = next.name(),
                "state transition"
            );
        }
        self.state = next;
        Ok(next)
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
