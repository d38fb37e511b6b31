//! Component lifecycle contract and controller state machine.
//!
//! This module defines the [`Lifecycle`] capability every managed subsystem
//! implements, and the valid state transitions of the controller itself.
//!
//! # State Machine
//!
//! ```text
//!     ┌───────────────┐
//!     │ Uninitialized │
//!     └───────┬───────┘
//!             │ (first update)
//!             ▼
//!     ┌───────────────┐  (update, any mode)  ┌───────────────┐
//!     │ Applying(m)   │◄─────────────────────│  Stable(m')   │
//!     └───────┬───────┘                      └───────▲───────┘
//!             │ (plan complete, ack sent)            │
//!             └──────────────────────────────────────┘
//!
//!     any state except Terminated ──(cancellation)──▶ Terminated
//! ```

use async_trait::async_trait;
use modeswitch_core::Mode;

use crate::error::{ControlError, Result};

/// A subsystem the controller can tell to start or stop serving.
///
/// Implementations own their internal state and their own failure handling.
/// The controller never calls `start` on a component it already started, nor
/// `stop` on one it already stopped, and never issues two calls to the same
/// component concurrently.
#[async_trait]
pub trait Lifecycle: Send + Sync {
    /// Name used in logs and topology configuration.
    fn name(&self) -> &str;

    /// Begin serving. Returns once the component is ready for consumers.
    async fn start(&self);

    /// Stop serving. Returns once the component is fully drained.
    async fn stop(&self);
}

/// State of a mode controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// No mode has been applied yet.
    Uninitialized,
    /// A transition towards the given mode is in flight.
    Applying(Mode),
    /// The given mode is fully applied and acknowledged.
    Stable(Mode),
    /// Shutdown is complete; no further updates are accepted.
    Terminated,
}

impl ControllerState {
    /// The mode this state refers to, if any.
    #[must_use]
    pub const fn mode(&self) -> Option<Mode> {
        match self {
            Self::Applying(mode) | Self::Stable(mode) => Some(*mode),
            Self::Uninitialized | Self::Terminated => None,
        }
    }

    /// The mode that is fully in effect, if any.
    #[must_use]
    pub const fn stable_mode(&self) -> Option<Mode> {
        match self {
            Self::Stable(mode) => Some(*mode),
            _ => None,
        }
    }

    /// Validate and perform a transition to `to`.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::InvalidTransition` if the transition is not allowed.
    pub fn transition(self, to: Self) -> Result<Self> {
        validate_transition(self, to)
    }
}

/// Validates a state transition and returns the target state if valid.
///
/// # Errors
///
/// Returns `ControlError::InvalidTransition` if the transition is not allowed.
pub fn validate_transition(from: ControllerState, to: ControllerState) -> Result<ControllerState> {
    if is_valid_transition(from, to) {
        Ok(to)
    } else {
        Err(ControlError::InvalidTransition { from, to })
    }
}

/// Check if a state transition is valid according to the state machine.
#[must_use]
pub fn is_valid_transition(from: ControllerState, to: ControllerState) -> bool {
    use ControllerState::{Applying, Stable, Terminated, Uninitialized};

    match (from, to) {
        // First update, or any update once stable (equal mode is the no-op path)
        (Uninitialized | Stable(_), Applying(_)) => true,
        // A transition only ever settles on the mode it was applying
        (Applying(applying), Stable(stable)) => applying == stable,
        // Cancellation is honoured from every live state
        (Uninitialized | Applying(_) | Stable(_), Terminated) => true,
        _ => false,
    }
}

/// Returns true if the controller has shut down.
#[must_use]
pub const fn is_terminal(state: ControllerState) -> bool {
    matches!(state, ControllerState::Terminated)
}

/// Returns true if a transition is in flight.
#[must_use]
pub const fn is_applying(state: ControllerState) -> bool {
    matches!(state, ControllerState::Applying(_))
}
