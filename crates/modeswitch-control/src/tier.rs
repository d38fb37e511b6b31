//! Tier groups.
//!
//! A tier is a named set of components that transition together. Applying
//! liveness to a tier fans the action out to every member and returns only
//! once all of them have finished, which is the barrier between tiers.

use std::fmt;
use std::sync::Arc;

use futures::future::join_all;
use modeswitch_core::Mode;
use tracing::debug;

use crate::lifecycle::Lifecycle;

/// A named, ordered group of lifecycle components.
#[derive(Clone)]
pub struct Tier {
    name: String,
    components: Vec<Arc<dyn Lifecycle>>,
    live_modes: Vec<Mode>,
}

impl Tier {
    /// Create a tier that is live in every mode listed in `live_modes`.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        live_modes: impl IntoIterator<Item = Mode>,
        components: Vec<Arc<dyn Lifecycle>>,
    ) -> Self {
        let mut modes: Vec<Mode> = Vec::new();
        for mode in live_modes {
            if !modes.contains(&mode) {
                modes.push(mode);
            }
        }
        Self {
            name: name.into(),
            components,
            live_modes: modes,
        }
    }

    /// The tier name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The member components.
    #[must_use]
    pub fn components(&self) -> &[Arc<dyn Lifecycle>] {
        &self.components
    }

    /// The modes in which this tier serves.
    #[must_use]
    pub fn live_modes(&self) -> &[Mode] {
        &self.live_modes
    }

    /// Whether this tier should be live under `mode`.
    #[must_use]
    pub fn is_live_in(&self, mode: Mode) -> bool {
        self.live_modes.contains(&mode)
    }

    /// Start (`true`) or stop (`false`) every member concurrently and wait
    /// for all of them to finish.
    pub async fn apply_liveness(&self, target_live: bool) {
        debug!(
            tier = %self.name,
            members = self.components.len(),
            action = if target_live { "start" } else { "stop" },
            "Applying tier liveness"
        );

        join_all(self.components.iter().map(|component| async move {
            if target_live {
                component.start().await;
            } else {
                component.stop().await;
            }
        }))
        .await;
    }
}

impl fmt::Debug for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tier")
            .field("name", &self.name)
            .field(
                "components",
                &self.components.iter().map(|c| c.name()).collect::<Vec<_>>(),
            )
            .field("live_modes", &self.live_modes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{CallLog, RecordingComponent};

    fn tier(log: &CallLog, live: &[Mode], names: &[&str]) -> Tier {
        Tier::new(
            "stores",
            live.iter().copied(),
            names
                .iter()
                .map(|n| RecordingComponent::shared(*n, log))
                .collect(),
        )
    }

    #[test]
    fn liveness_follows_configured_modes() {
        let log = CallLog::new();
        let t = tier(&log, &[Mode::Normal], &["gateway_db"]);
        assert!(t.is_live_in(Mode::Normal));
        assert!(!t.is_live_in(Mode::Degraded));
    }

    #[test]
    fn duplicate_live_modes_are_collapsed() {
        let log = CallLog::new();
        let t = tier(&log, &[Mode::Normal, Mode::Normal, Mode::Degraded], &["a"]);
        assert_eq!(t.live_modes(), &[Mode::Normal, Mode::Degraded]);
    }

    #[tokio::test]
    async fn apply_liveness_reaches_every_member() {
        let log = CallLog::new();
        let t = tier(&log, &[Mode::Normal], &["gateway_db", "router_db", "error_db"]);

        t.apply_liveness(true).await;
        assert_eq!(log.starts().len(), 3);
        assert!(log.is_started("gateway_db"));
        assert!(log.is_started("router_db"));
        assert!(log.is_started("error_db"));

        t.apply_liveness(false).await;
        assert_eq!(log.stops().len(), 3);
        assert!(!log.is_started("router_db"));
    }

    #[tokio::test]
    async fn apply_liveness_waits_for_slow_members() {
        let log = CallLog::new();
        let slow: Arc<dyn Lifecycle> = Arc::new(
            RecordingComponent::new("slow_db", &log)
                .with_delay(std::time::Duration::from_millis(20)),
        );
        let t = Tier::new(
            "stores",
            [Mode::Normal],
            vec![slow, RecordingComponent::shared("fast_db", &log)],
        );

        t.apply_liveness(true).await;

        // Both calls must have finished by the time the barrier releases
        let calls = log.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|c| c.finished_at.is_some()));
    }

    #[test]
    fn debug_lists_component_names() {
        let log = CallLog::new();
        let t = tier(&log, &[Mode::Normal], &["processor", "router"]);
        let rendered = format!("{t:?}");
        assert!(rendered.contains("processor"));
        assert!(rendered.contains("router"));
    }
}
