//! Transition planning.
//!
//! A [`TransitionPlan`] is the ordered list of tier actions needed to move
//! the controller's live set to a target mode. It is computed, executed, and
//! discarded within a single transition.
//!
//! Stops always come first and run from the most downstream tier upwards, so
//! consumers are drained before the stores they read from. Starts follow,
//! from the most upstream tier downwards, so stores are ready before their
//! consumers.

use std::fmt;

use modeswitch_core::Mode;
use serde::Serialize;

use crate::tier::Tier;
use crate::types::TopologyConfig;

/// A lifecycle operation applied to a whole tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Start every member.
    Start,
    /// Stop every member.
    Stop,
}

impl Action {
    /// The liveness a tier has after this action.
    #[must_use]
    pub const fn target_live(self) -> bool {
        matches!(self, Self::Start)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => f.pad("start"),
            Self::Stop => f.pad("stop"),
        }
    }
}

/// One step of a transition: an action on the tier at index `tier`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TierAction {
    /// Index into the controller's tier list.
    pub tier: usize,
    /// The operation to apply.
    pub action: Action,
}

/// Ordered tier actions for one transition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransitionPlan {
    steps: Vec<TierAction>,
}

impl TransitionPlan {
    /// Compute the plan that moves the `live` set to what `target` requires.
    ///
    /// `live[i]` is the controller's bookkeeping for `tiers[i]`. Tiers missing
    /// from `live` are treated as stopped.
    #[must_use]
    pub fn compute(tiers: &[Tier], live: &[bool], target: Mode) -> Self {
        Self::from_liveness(tiers.len(), live, |i| tiers[i].is_live_in(target))
    }

    /// Compute the plan between two modes from configuration alone.
    ///
    /// `from = None` means nothing is live yet.
    #[must_use]
    pub fn between(tiers: &[Tier], from: Option<Mode>, to: Mode) -> Self {
        let live: Vec<bool> = tiers
            .iter()
            .map(|t| from.is_some_and(|mode| t.is_live_in(mode)))
            .collect();
        Self::compute(tiers, &live, to)
    }

    /// Like [`TransitionPlan::between`], for a topology that has not been
    /// bound to components.
    #[must_use]
    pub fn for_topology(topology: &TopologyConfig, from: Option<Mode>, to: Mode) -> Self {
        let live_in = |i: usize, mode: Mode| topology.tiers[i].live_modes.contains(&mode);
        let live: Vec<bool> = (0..topology.tiers.len())
            .map(|i| from.is_some_and(|mode| live_in(i, mode)))
            .collect();
        Self::from_liveness(topology.tiers.len(), &live, |i| live_in(i, to))
    }

    fn from_liveness(count: usize, live: &[bool], wanted: impl Fn(usize) -> bool) -> Self {
        let is_live = |index: usize| live.get(index).copied().unwrap_or(false);

        let stops = (0..count)
            .rev()
            .filter(|&i| is_live(i) && !wanted(i))
            .map(|tier| TierAction {
                tier,
                action: Action::Stop,
            });
        let starts = (0..count)
            .filter(|&i| !is_live(i) && wanted(i))
            .map(|tier| TierAction {
                tier,
                action: Action::Start,
            });

        Self {
            steps: stops.chain(starts).collect(),
        }
    }

    /// Stop every live tier, most downstream first.
    #[must_use]
    pub fn shutdown(live: &[bool]) -> Self {
        let steps = (0..live.len())
            .rev()
            .filter(|&i| live[i])
            .map(|tier| TierAction {
                tier,
                action: Action::Stop,
            })
            .collect();
        Self { steps }
    }

    /// The ordered steps.
    #[must_use]
    pub fn steps(&self) -> &[TierAction] {
        &self.steps
    }

    /// Whether the plan has nothing to do.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }
}

impl IntoIterator for TransitionPlan {
    type Item = TierAction;
    type IntoIter = std::vec::IntoIter<TierAction>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.into_iter()
    }
}
