//! Recording test doubles for lifecycle components and acknowledgments.
//!
//! Every component and acknowledgment created from the same [`CallLog`]
//! shares one sequence counter, so tests can assert happens-before ordering
//! across tiers. The doubles panic when the controller breaks a lifecycle
//! invariant (redundant start/stop, overlapping calls on one component).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use modeswitch_core::Mode;
use parking_lot::Mutex;

use crate::lifecycle::Lifecycle;
use crate::plan::Action;
use crate::source::Ack;

/// One recorded `start` or `stop` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    /// The component that received the call.
    pub component: String,
    /// Which lifecycle operation was invoked.
    pub action: Action,
    /// Sequence number taken when the call began.
    pub began_at: u64,
    /// Sequence number taken when the call returned.
    pub finished_at: Option<u64>,
}

/// One recorded acknowledgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckRecord {
    /// The mode that was acknowledged.
    pub mode: Mode,
    /// Sequence number taken when the acknowledgment fired.
    pub at: u64,
}

#[derive(Default)]
struct LogInner {
    seq: u64,
    calls: Vec<Call>,
    acks: Vec<AckRecord>,
    started: HashMap<String, bool>,
    in_flight: HashMap<String, bool>,
}

impl LogInner {
    fn next(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }
}

/// Shared, ordered record of component calls and acknowledgments.
#[derive(Clone, Default)]
pub struct CallLog {
    inner: Arc<Mutex<LogInner>>,
}

impl CallLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded calls in the order they began.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.inner.lock().calls.clone()
    }

    /// Recorded `start` calls.
    #[must_use]
    pub fn starts(&self) -> Vec<Call> {
        self.calls_for(Action::Start)
    }

    /// Recorded `stop` calls.
    #[must_use]
    pub fn stops(&self) -> Vec<Call> {
        self.calls_for(Action::Stop)
    }

    /// Recorded acknowledgments in firing order.
    #[must_use]
    pub fn acks(&self) -> Vec<AckRecord> {
        self.inner.lock().acks.clone()
    }

    /// Whether the named component was last told to start.
    #[must_use]
    pub fn is_started(&self, component: &str) -> bool {
        self.inner
            .lock()
            .started
            .get(component)
            .copied()
            .unwrap_or(false)
    }

    /// Latest sequence number at which any `action` call on `components` returned.
    #[must_use]
    pub fn last_finish(&self, components: &[&str], action: Action) -> Option<u64> {
        self.calls_for(action)
            .iter()
            .filter(|c| components.contains(&c.component.as_str()))
            .filter_map(|c| c.finished_at)
            .max()
    }

    /// Earliest sequence number at which any `action` call on `components` began.
    #[must_use]
    pub fn first_begin(&self, components: &[&str], action: Action) -> Option<u64> {
        self.calls_for(action)
            .iter()
            .filter(|c| components.contains(&c.component.as_str()))
            .map(|c| c.began_at)
            .min()
    }

    /// Build an acknowledgment handle that records into this log when fired.
    #[must_use]
    pub fn ack(&self, mode: Mode) -> Ack {
        let inner = Arc::clone(&self.inner);
        Ack::from_fn(move || {
            let mut inner = inner.lock();
            let at = inner.next();
            inner.acks.push(AckRecord { mode, at });
        })
    }

    fn calls_for(&self, action: Action) -> Vec<Call> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter(|c| c.action == action)
            .cloned()
            .collect()
    }

    fn begin(&self, component: &str, action: Action) -> usize {
        let mut inner = self.inner.lock();
        let in_flight = inner.in_flight.entry(component.to_string()).or_default();
        assert!(!*in_flight, "overlapping lifecycle calls on {component}");
        *in_flight = true;

        let started = inner.started.get(component).copied().unwrap_or(false);
        match action {
            Action::Start => assert!(!started, "{component} started while already started"),
            Action::Stop => assert!(started, "{component} stopped while already stopped"),
        }

        let began_at = inner.next();
        inner.calls.push(Call {
            component: component.to_string(),
            action,
            began_at,
            finished_at: None,
        });
        inner.calls.len() - 1
    }

    fn finish(&self, index: usize, component: &str, action: Action) {
        let mut inner = self.inner.lock();
        let at = inner.next();
        if let Some(call) = inner.calls.get_mut(index) {
            call.finished_at = Some(at);
        }
        inner
            .started
            .insert(component.to_string(), action == Action::Start);
        inner.in_flight.insert(component.to_string(), false);
    }
}

/// A lifecycle component that records every call into a [`CallLog`].
pub struct RecordingComponent {
    name: String,
    log: CallLog,
    delay: Option<Duration>,
}

impl RecordingComponent {
    /// Create a component recording into `log`.
    #[must_use]
    pub fn new(name: impl Into<String>, log: &CallLog) -> Self {
        Self {
            name: name.into(),
            log: log.clone(),
            delay: None,
        }
    }

    /// Create a component already wrapped for use in a tier.
    #[must_use]
    pub fn shared(name: impl Into<String>, log: &CallLog) -> Arc<dyn Lifecycle> {
        Arc::new(Self::new(name, log))
    }

    /// Make every call take `delay` before returning.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    async fn record(&self, action: Action) {
        let index = self.log.begin(&self.name, action);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        } else {
            tokio::task::yield_now().await;
        }
        self.log.finish(index, &self.name, action);
    }
}

#[async_trait]
impl Lifecycle for RecordingComponent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self) {
        self.record(Action::Start).await;
    }

    async fn stop(&self) {
        self.record(Action::Stop).await;
    }
}
