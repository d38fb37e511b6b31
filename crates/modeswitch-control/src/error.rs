//! Error types for the mode controller.
//!
//! The run loop itself never surfaces an error to its caller. These errors
//! come from construction, configuration, and the mode-source handles used by
//! hosts to drive the controller.

use std::path::PathBuf;

use modeswitch_core::CoreError;
use thiserror::Error;

use crate::lifecycle::ControllerState;

/// A result type using `ControlError`.
pub type Result<T> = std::result::Result<T, ControlError>;

/// Errors that can occur while building or driving a mode controller.
#[derive(Debug, Error)]
pub enum ControlError {
    /// The requested controller state transition is not valid.
    #[error("invalid controller transition: cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        /// The current state.
        from: ControllerState,
        /// The requested target state.
        to: ControllerState,
    },

    /// A controller was built without any tiers.
    #[error("topology has no tiers")]
    EmptyTopology,

    /// Two tiers share a name.
    #[error("duplicate tier name: {0}")]
    DuplicateTier(String),

    /// A tier was configured without members.
    #[error("tier {0} has no components")]
    EmptyTier(String),

    /// A component is listed more than once across the topology.
    #[error("component {0} is assigned to more than one tier")]
    DuplicateComponent(String),

    /// The topology references a component that was never registered.
    #[error("unknown component {component} in tier {tier}")]
    UnknownComponent {
        /// The tier referencing the component.
        tier: String,
        /// The unregistered component name.
        component: String,
    },

    /// The controller consuming this source has stopped.
    #[error("mode source is closed")]
    SourceClosed,

    /// A mode update was dropped without being acknowledged.
    #[error("mode update for {0} was dropped before acknowledgment")]
    AckDropped(modeswitch_core::Mode),

    /// Reading a topology file failed.
    #[error("failed to read topology {path}: {source}")]
    Io {
        /// The file being read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A topology document could not be parsed.
    #[error("invalid topology document: {0}")]
    Parse(#[from] serde_json::Error),

    /// Core type error.
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl ControlError {
    /// Returns true if this error comes from static configuration rather
    /// than from driving a running controller.
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::EmptyTopology
                | Self::DuplicateTier(_)
                | Self::EmptyTier(_)
                | Self::DuplicateComponent(_)
                | Self::UnknownComponent { .. }
                | Self::Io { .. }
                | Self::Parse(_)
                | Self::Core(_)
        )
    }
}
