//! Barrier state machine.
//!
//! This module owns [`GateState`] and the [`OpenWindow`] that exists only
//! while the barrier is held open. It validates every transition, records
//! a bounded history and decides when an open barrier is due to close.
//!
//! # States
//!
//! ```text
//!            scan granted / OPEN
//!   Closed ─────────────────────► Opening
//!     ▲                              │ sweep done
//!     │ sweep done                   ▼
//!   Closing ◄──────────────────── OpenHold
//!        grace && clear / ceiling / CLOSE
//! ```
//!
//! No other edge exists. A motion in progress cannot be aborted.
//!
//! # Examples
//!
//! ```
//! use parkgate_controller::{Clearance, CloseReason, GateStateMachine};
//! use parkgate_core::GateState;
//! use std::time::Duration;
//! use tokio::time::Instant;
//!
//! let mut machine = GateStateMachine::new(Duration::from_secs(3), Duration::from_secs(10));
//! let t0 = Instant::now();
//!
//! machine.transition_to(GateState::Opening, t0).unwrap();
//! machine.transition_to(GateState::OpenHold, t0).unwrap();
//! assert!(machine.open_window().is_some());
//!
//! let later = t0 + Duration::from_secs(3);
//! assert_eq!(machine.close_due(later, Clearance::Clear), Some(CloseReason::Cleared));
//! assert_eq!(machine.close_due(later, Clearance::Blocked), None);
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use parkgate_core::{Error, GateState, Result};
use tokio::time::Instant;

/// Maximum number of state transitions to keep in history.
///
/// One open/close cycle records four transitions, so this keeps the last
/// 25 vehicles.
pub const MAX_HISTORY_SIZE: usize = 100;

/// Hold window of an open barrier.
///
/// Created on entry to `OpenHold` and dropped on the way out, so it can
/// never outlive the state it times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenWindow {
    started_at: Instant,
}

impl OpenWindow {
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Time spent open as of `now`. Zero if `now` precedes the window.
    pub fn elapsed_at(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started_at)
    }
}

/// What the clearance sensor under the barrier reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clearance {
    /// No vehicle under the barrier.
    Clear,

    /// Vehicle under the barrier, or the sensor could not be read.
    Blocked,
}

/// Why an open barrier is being closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Grace period over and the lane is clear.
    Cleared,

    /// Absolute hold ceiling reached.
    CeilingReached,

    /// Operator CLOSE command.
    Operator,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            CloseReason::Cleared => "lane cleared",
            CloseReason::CeilingReached => "hold ceiling reached",
            CloseReason::Operator => "operator command",
        };
        write!(f, "{}", reason)
    }
}

/// A single state transition with its time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateTransition {
    pub from: GateState,
    pub to: GateState,
    pub at: Instant,
}

/// State machine for one barrier.
///
/// Not thread-safe by design: the gate controller is its single owner.
#[derive(Debug)]
pub struct GateStateMachine {
    state: GateState,
    open_window: Option<OpenWindow>,
    history: VecDeque<StateTransition>,
    grace: Duration,
    ceiling: Duration,
}

impl GateStateMachine {
    /// Create a machine in `Closed`.
    pub fn new(grace: Duration, ceiling: Duration) -> Self {
        Self {
            state: GateState::Closed,
            open_window: None,
            history: VecDeque::with_capacity(MAX_HISTORY_SIZE),
            grace,
            ceiling,
        }
    }

    /// Create a builder, mostly for starting tests in a given state.
    ///
    /// # Examples
    ///
    /// ```
    /// use parkgate_controller::GateStateMachine;
    /// use parkgate_core::GateState;
    /// use tokio::time::Instant;
    ///
    /// let machine = GateStateMachine::builder()
    ///     .with_initial_state(GateState::OpenHold)
    ///     .build_at(Instant::now());
    /// assert_eq!(machine.state(), GateState::OpenHold);
    /// assert!(machine.open_window().is_some());
    /// ```
    pub fn builder() -> GateStateMachineBuilder {
        GateStateMachineBuilder::default()
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn open_window(&self) -> Option<&OpenWindow> {
        self.open_window.as_ref()
    }

    pub fn grace(&self) -> Duration {
        self.grace
    }

    pub fn ceiling(&self) -> Duration {
        self.ceiling
    }

    /// Recent transitions, oldest first.
    pub fn history(&self) -> &VecDeque<StateTransition> {
        &self.history
    }

    /// Get the last N state transitions, oldest first.
    pub fn last_transitions(&self, count: usize) -> Vec<StateTransition> {
        let skip = self.history.len().saturating_sub(count);
        self.history.iter().skip(skip).copied().collect()
    }

    /// Whether the open window exists exactly when the state is `OpenHold`.
    pub fn is_consistent(&self) -> bool {
        self.open_window.is_some() == (self.state == GateState::OpenHold)
    }

    /// Transition to `target` at `now`.
    ///
    /// Entering `OpenHold` arms the hold window; leaving it drops the window.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidStateTransition` if `target` is not reachable
    /// from the current state. The machine is left untouched.
    pub fn transition_to(&mut self, target: GateState, now: Instant) -> Result<StateTransition> {
        if !self.state.can_transition_to(&target) {
            return Err(Error::InvalidStateTransition {
                from: self.state.to_string(),
                to: target.to_string(),
            });
        }

        let transition = StateTransition {
            from: self.state,
            to: target,
            at: now,
        };

        self.state = target;
        self.open_window = (target == GateState::OpenHold).then_some(OpenWindow { started_at: now });

        self.history.push_back(transition);
        if self.history.len() > MAX_HISTORY_SIZE {
            self.history.pop_front();
        }

        Ok(transition)
    }

    /// Decide whether an open barrier should close at `now`.
    ///
    /// The ceiling wins over everything; the grace period needs a clear
    /// lane. Returns `None` outside `OpenHold`.
    pub fn close_due(&self, now: Instant, clearance: Clearance) -> Option<CloseReason> {
        let window = self.open_window.as_ref()?;
        let elapsed = window.elapsed_at(now);

        if elapsed >= self.ceiling {
            Some(CloseReason::CeilingReached)
        } else if elapsed >= self.grace && clearance == Clearance::Clear {
            Some(CloseReason::Cleared)
        } else {
            None
        }
    }
}

/// Builder for [`GateStateMachine`].
#[derive(Debug)]
pub struct GateStateMachineBuilder {
    initial_state: GateState,
    grace: Duration,
    ceiling: Duration,
}

impl GateStateMachineBuilder {
    pub fn with_initial_state(mut self, state: GateState) -> Self {
        self.initial_state = state;
        self
    }

    pub fn with_hold(mut self, grace: Duration, ceiling: Duration) -> Self {
        self.grace = grace;
        self.ceiling = ceiling;
        self
    }

    /// Build the machine. A machine starting in `OpenHold` gets a window
    /// opened at `now`.
    pub fn build_at(self, now: Instant) -> GateStateMachine {
        GateStateMachine {
            state: self.initial_state,
            open_window: (self.initial_state == GateState::OpenHold)
                .then_some(OpenWindow { started_at: now }),
            history: VecDeque::with_capacity(MAX_HISTORY_SIZE),
            grace: self.grace,
            ceiling: self.ceiling,
        }
    }
}

impl Default for GateStateMachineBuilder {
    fn default() -> Self {
        Self {
            initial_state: GateState::Closed,
            grace: Duration::from_millis(parkgate_core::constants::DEFAULT_HOLD_GRACE_MS),
            ceiling: Duration::from_millis(parkgate_core::constants::DEFAULT_HOLD_CEILING_MS),
        }
    }
}
