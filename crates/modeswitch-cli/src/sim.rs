//! Dry-run simulation of a topology.
//!
//! Every component in the topology is replaced by a [`LoggingComponent`] that
//! logs its calls and appends them to a shared timeline. A real
//! [`ModeController`] then runs the requested mode sequence.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use modeswitch_control::{
    shutdown, source, Action, ComponentRegistry, ControllerState, Lifecycle, ModeController,
    ShutdownSignal, StaticModeSource, TopologyConfig,
};
use modeswitch_core::Mode;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::info;

/// One entry in the simulated timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TimelineEvent {
    /// A component finished a lifecycle call.
    Component {
        /// Component name.
        component: String,
        /// Operation that completed.
        action: Action,
    },
    /// The controller acknowledged a mode.
    Ack {
        /// Mode that is now in effect.
        mode: Mode,
    },
}

/// Shared, ordered record of simulated events.
#[derive(Debug, Clone, Default)]
pub struct Timeline(Arc<Mutex<Vec<TimelineEvent>>>);

impl Timeline {
    fn push(&self, event: TimelineEvent) {
        self.0.lock().push(event);
    }

    /// A snapshot of every event so far.
    #[must_use]
    pub fn events(&self) -> Vec<TimelineEvent> {
        self.0.lock().clone()
    }
}

/// Stand-in component that only logs.
pub struct LoggingComponent {
    name: String,
    delay: Duration,
    timeline: Timeline,
}

impl LoggingComponent {
    fn new(name: &str, delay: Duration, timeline: &Timeline) -> Self {
        Self {
            name: name.to_string(),
            delay,
            timeline: timeline.clone(),
        }
    }

    async fn act(&self, action: Action) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        info!(component = %self.name, action = %action, "Simulated component call");
        self.timeline.push(TimelineEvent::Component {
            component: self.name.clone(),
            action,
        });
    }
}

#[async_trait]
impl Lifecycle for LoggingComponent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self) {
        self.act(Action::Start).await;
    }

    async fn stop(&self) {
        self.act(Action::Stop).await;
    }
}

/// How the simulated controller receives its modes and when it stops.
#[derive(Debug, Clone)]
pub struct Simulation {
    /// Modes to apply in order. Empty means use `static_mode`.
    pub modes: Vec<Mode>,
    /// Fallback single mode.
    pub static_mode: Option<Mode>,
    /// Artificial latency of each component call.
    pub delay: Duration,
    /// Channel capacity for mode updates.
    pub update_buffer: usize,
    /// Keep running until Ctrl-C instead of shutting down after the last mode.
    pub hold: bool,
}

/// Run the simulation and return the resulting timeline.
///
/// # Errors
///
/// Returns an error if the topology is invalid, no modes were given, or the
/// controller stopped before acknowledging a mode.
pub async fn run(topology: &TopologyConfig, sim: &Simulation) -> anyhow::Result<Timeline> {
    let timeline = Timeline::default();
    let mut registry = ComponentRegistry::new();
    for name in topology.component_names() {
        registry.register(Arc::new(LoggingComponent::new(name, sim.delay, &timeline)));
    }

    let controller = ModeController::from_topology(topology, &registry)?;
    let mut states = controller.subscribe();

    let (trigger, signal) = if sim.hold {
        (None, ShutdownSignal::ctrl_c())
    } else {
        let (trigger, signal) = shutdown::channel();
        (Some(trigger), signal)
    };

    let handle = if sim.modes.is_empty() {
        let mode = sim
            .static_mode
            .ok_or_else(|| anyhow::anyhow!("no modes given and no static mode configured"))?;
        let handle = tokio::spawn(controller.run(StaticModeSource::new(mode), signal));
        let reached = *states
            .wait_for(|s| *s == ControllerState::Stable(mode) || *s == ControllerState::Terminated)
            .await?;
        if reached == ControllerState::Stable(mode) {
            timeline.push(TimelineEvent::Ack { mode });
        }
        handle
    } else {
        let (sender, updates) = source::channel(sim.update_buffer);
        let handle = tokio::spawn(controller.run(updates, signal));
        for &mode in &sim.modes {
            sender.send_and_wait(mode).await?;
            timeline.push(TimelineEvent::Ack { mode });
        }
        handle
    };

    if let Some(trigger) = trigger {
        trigger.trigger();
    } else {
        info!("Holding current mode, press Ctrl-C to shut down");
    }
    handle.await?;

    Ok(timeline)
}
