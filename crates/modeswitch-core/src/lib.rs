//! Core types and utilities for modeswitch.
//!
//! This crate provides the foundational types shared by the controller and
//! the command line tooling:
//!
//! - **Mode**: the cluster-wide operating mode that decides which tiers of
//!   components are live
//! - **Error types**: Common error definitions shared across crates
//!
//! # Example
//!
//! ```
//! use modeswitch_core::Mode;
//!
//! let mode: Mode = "degraded".parse().unwrap();
//! assert_eq!(mode, Mode::Degraded);
//! assert_eq!(mode.to_string(), "DEGRADED");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod mode;

pub use error::{CoreError, Result};
pub use mode::Mode;
