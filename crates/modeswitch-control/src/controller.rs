//! The mode controller.
//!
//! [`ModeController::run`] is a single consumer loop: it takes one update at
//! a time from a [`ModeSource`], applies the tier plan it implies, and fires
//! the update's acknowledgment. No two transitions ever interleave. The loop
//! is the only writer of the controller state; observers get a read-only
//! [`watch::Receiver`] from [`ModeController::subscribe`].

use std::collections::HashSet;
use std::time::Instant;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::error::{ControlError, Result};
use crate::lifecycle::ControllerState;
use crate::plan::TransitionPlan;
use crate::shutdown::ShutdownSignal;
use crate::source::{ModeSource, ModeUpdate};
use crate::tier::Tier;
use crate::types::{ComponentRegistry, TopologyConfig};

/// How handling a single update ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Applied,
    Interrupted,
}

/// Sequences tier lifecycles in response to mode updates.
pub struct ModeController {
    tiers: Vec<Tier>,
    /// Per-tier liveness as last applied by this controller.
    live: Vec<bool>,
    state: ControllerState,
    state_tx: watch::Sender<ControllerState>,
}

impl ModeController {
    /// Create a controller over `tiers`, ordered from most upstream to most
    /// downstream.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::EmptyTopology` if `tiers` is empty, or
    /// `ControlError::DuplicateTier` if two tiers share a name.
    pub fn new(tiers: Vec<Tier>) -> Result<Self> {
        if tiers.is_empty() {
            return Err(ControlError::EmptyTopology);
        }

        let mut names = HashSet::new();
        for tier in &tiers {
            if !names.insert(tier.name()) {
                return Err(ControlError::DuplicateTier(tier.name().to_string()));
            }
        }

        let (state_tx, _) = watch::channel(ControllerState::Uninitialized);
        Ok(Self {
            live: vec![false; tiers.len()],
            tiers,
            state: ControllerState::Uninitialized,
            state_tx,
        })
    }

    /// Build a controller from a topology and the components it names.
    ///
    /// # Errors
    ///
    /// Returns an error if the topology is invalid or references unknown
    /// components.
    pub fn from_topology(topology: &TopologyConfig, registry: &ComponentRegistry) -> Result<Self> {
        Self::new(topology.bind(registry)?)
    }

    /// The configured tiers.
    #[must_use]
    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }

    /// The current state.
    #[must_use]
    pub const fn state(&self) -> ControllerState {
        self.state
    }

    /// Observe state changes made by the run loop.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ControllerState> {
        self.state_tx.subscribe()
    }

    /// Consume updates from `source` until `shutdown` fires, then stop every
    /// live tier and return.
    ///
    /// Cancellation takes priority over a ready update. If the source is
    /// exhausted the loop keeps the current mode and waits for cancellation.
    pub async fn run<S: ModeSource>(mut self, mut source: S, mut shutdown: ShutdownSignal) {
        info!(tiers = self.tiers.len(), "Mode controller started");

        loop {
            let update = tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                update = source.next_update() => update,
            };

            let Some(update) = update else {
                debug!(state = ?self.state, "Mode source exhausted, waiting for shutdown");
                shutdown.cancelled().await;
                break;
            };

            if self.handle_update(update, &shutdown).await == Outcome::Interrupted {
                break;
            }
        }

        self.shutdown().await;
    }

    async fn handle_update(&mut self, update: ModeUpdate, shutdown: &ShutdownSignal) -> Outcome {
        let (target, ack) = update.into_parts();
        let previous = self.state;

        if !self.set_state(ControllerState::Applying(target)) {
            warn!(
                to = %target,
                state = ?previous,
                "Update rejected, dropping it unacknowledged"
            );
            return Outcome::Interrupted;
        }

        if previous.stable_mode() == Some(target) {
            debug!(mode = %target, "Mode already in effect, skipping component actions");
        } else {
            let plan = TransitionPlan::compute(&self.tiers, &self.live, target);
            let started = Instant::now();
            info!(
                from = ?previous.stable_mode(),
                to = %target,
                steps = plan.len(),
                "Applying mode transition"
            );

            if !self.execute(plan, Some(shutdown)).await {
                warn!(
                    to = %target,
                    "Shutdown requested mid-transition, abandoning update"
                );
                return Outcome::Interrupted;
            }

            info!(
                mode = %target,
                elapsed_ms = started.elapsed().as_millis(),
                "Mode transition complete"
            );
        }

        ack.ack();
        self.set_state(ControllerState::Stable(target));
        Outcome::Applied
    }

    /// Run each step behind a tier barrier. Returns false if `shutdown` fired
    /// before a step began.
    async fn execute(&mut self, plan: TransitionPlan, shutdown: Option<&ShutdownSignal>) -> bool {
        for step in plan {
            if shutdown.is_some_and(ShutdownSignal::is_cancelled) {
                return false;
            }

            let target_live = step.action.target_live();
            let tier = &self.tiers[step.tier];
            debug!(tier = %tier.name(), action = %step.action, "Tier step");
            tier.apply_liveness(target_live).await;
            self.live[step.tier] = target_live;
        }
        true
    }

    async fn shutdown(&mut self) {
        let plan = TransitionPlan::shutdown(&self.live);
        info!(
            state = ?self.state,
            live_tiers = plan.len(),
            "Shutting down mode controller"
        );

        self.execute(plan, None).await;
        self.set_state(ControllerState::Terminated);
        info!("Mode controller terminated");
    }

    fn set_state(&mut self, next: ControllerState) -> bool {
        match self.state.transition(next) {
            Ok(state) => {
                self.state = state;
                self.state_tx.send_replace(state);
                true
            }
            Err(e) => {
                error!(error = %e, "Rejected controller state change");
                false
            }
        }
    }
}

impl std::fmt::Debug for ModeController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModeController")
            .field("tiers", &self.tiers)
            .field("live", &self.live)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
