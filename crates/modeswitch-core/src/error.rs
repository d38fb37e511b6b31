//! Common error types for modeswitch.
//!
//! This module provides shared error types that are used across multiple crates.

use thiserror::Error;

/// A result type using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core errors that can occur throughout the modeswitch system.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// A mode string did not name a known mode.
    #[error("invalid server mode: {0:?}")]
    InvalidMode(String),
}
