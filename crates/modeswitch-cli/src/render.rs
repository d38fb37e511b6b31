//! Human and JSON rendering of plans and timelines.

use modeswitch_control::{Action, TierConfig, TopologyConfig, TransitionPlan};
use serde::Serialize;

use crate::sim::TimelineEvent;

/// A plan step resolved to tier and component names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanStep<'a> {
    /// Tier name.
    pub tier: &'a str,
    /// Operation applied to the tier.
    pub action: Action,
    /// Members of the tier.
    pub components: &'a [String],
}

/// Resolve plan indices against the topology.
#[must_use]
pub fn resolve<'a>(topology: &'a TopologyConfig, plan: &TransitionPlan) -> Vec<PlanStep<'a>> {
    plan.steps()
        .iter()
        .filter_map(|step| {
            topology
                .tiers
                .get(step.tier)
                .map(|tier: &TierConfig| PlanStep {
                    tier: &tier.name,
                    action: step.action,
                    components: &tier.components,
                })
        })
        .collect()
}

/// Render resolved steps as numbered lines.
#[must_use]
pub fn plan_lines(steps: &[PlanStep<'_>]) -> Vec<String> {
    if steps.is_empty() {
        return vec!["no component actions required".to_string()];
    }

    steps
        .iter()
        .enumerate()
        .map(|(i, step)| {
            format!(
                "{}. {:<5} {} ({})",
                i + 1,
                step.action,
                step.tier,
                step.components.join(", ")
            )
        })
        .collect()
}

/// Render a simulated timeline as lines.
#[must_use]
pub fn timeline_lines(events: &[TimelineEvent]) -> Vec<String> {
    events
        .iter()
        .map(|event| match event {
            TimelineEvent::Component { component, action } => format!("{action:<5} {component}"),
            TimelineEvent::Ack { mode } => format!("ack   {mode}"),
        })
        .collect()
}
