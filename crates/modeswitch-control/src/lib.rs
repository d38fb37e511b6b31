//! Mode controller for tiered component lifecycles.
//!
//! This crate drives the coordinated startup and shutdown of a server's
//! subsystems in response to cluster mode changes. Persistent stores must be
//! live before any processing stage touches them, and processing stages must
//! be fully stopped before their stores are torn down.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Mode source (control plane)                │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ ModeUpdate { target, ack }
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       ModeController                        │
//! │  ┌─────────────┐ ┌─────────────┐ ┌─────────────────────┐    │
//! │  │  State      │ │ Transition  │ │    Shutdown         │    │
//! │  │  Machine    │ │ Plan        │ │    Path             │    │
//! │  └─────────────┘ └─────────────┘ └─────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ (barrier between tiers)
//!               ┌──────────────┴──────────────┐
//!               ▼                             ▼
//!        ┌──────────────┐              ┌──────────────┐
//!        │ Tier 1       │              │ Tier 2       │
//!        │ (job stores) │              │ (processor,  │
//!        │              │              │  router)     │
//!        └──────────────┘              └──────────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use modeswitch_control::{shutdown, source, Lifecycle, Mode, ModeController, Tier};
//!
//! # async fn example(
//! #     stores: Vec<Arc<dyn Lifecycle>>,
//! #     stages: Vec<Arc<dyn Lifecycle>>,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let controller = ModeController::new(vec![
//!     Tier::new("stores", [Mode::Normal], stores),
//!     Tier::new("processing", [Mode::Normal], stages),
//! ])?;
//!
//! let (sender, updates) = source::channel(8);
//! let (trigger, signal) = shutdown::channel();
//! let running = tokio::spawn(controller.run(updates, signal));
//!
//! // Resolves once stores and then processing stages have started.
//! sender.send_and_wait(Mode::Normal).await?;
//!
//! // Stops processing stages, then stores, then returns.
//! trigger.trigger();
//! running.await?;
//! # Ok(())
//! # }
//! ```
//!
//! # State Machine
//!
//! - `Uninitialized` → `Applying(m)` (first update)
//! - `Stable(m1)` → `Applying(m2)` (any update; `m1 == m2` skips component actions)
//! - `Applying(m)` → `Stable(m)` (plan complete, acknowledgment fired)
//! - any live state → `Terminated` (cancellation)
//!
//! See the [`lifecycle`] module for transition validation helpers.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod controller;
pub mod error;
pub mod lifecycle;
pub mod plan;
pub mod shutdown;
pub mod source;
pub mod tier;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use controller::ModeController;
pub use error::{ControlError, Result};
pub use lifecycle::{ControllerState, Lifecycle};
pub use plan::{Action, TierAction, TransitionPlan};
pub use shutdown::{ShutdownSignal, ShutdownTrigger};
pub use source::{
    Ack, AckReceiver, ChannelModeSource, ModeSender, ModeSource, ModeUpdate, StaticModeSource,
};
pub use tier::Tier;
pub use types::{ComponentRegistry, ControllerConfig, TierConfig, TopologyConfig};

// Re-export commonly used types from dependencies for convenience
pub use modeswitch_core::Mode;
