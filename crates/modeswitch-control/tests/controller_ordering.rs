//! End-to-end ordering tests for the mode controller.
//!
//! Each test runs a real controller loop over recording components that
//! share one sequence counter, then asserts happens-before relations between
//! tier calls and acknowledgments.

use std::sync::Arc;
use std::time::Duration;

use modeswitch_control::mock::{CallLog, RecordingComponent};
use modeswitch_control::{
    shutdown, source, Action, ComponentRegistry, ControlError, ControllerState, Lifecycle, Mode,
    ModeController, ModeSender, ModeUpdate, ShutdownTrigger, StaticModeSource, Tier,
    TopologyConfig,
};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

const STORES: [&str; 4] = ["gateway_db", "router_db", "batch_router_db", "error_db"];
const STAGES: [&str; 2] = ["processor", "router"];

fn all_components() -> Vec<&'static str> {
    STORES.iter().chain(STAGES.iter()).copied().collect()
}

fn members(names: &[&str], log: &CallLog) -> Vec<Arc<dyn Lifecycle>> {
    names
        .iter()
        .map(|name| RecordingComponent::shared(*name, log))
        .collect()
}

/// Server topology: both tiers live only in Normal.
fn server_tiers(log: &CallLog) -> Vec<Tier> {
    vec![
        Tier::new("stores", [Mode::Normal], members(&STORES, log)),
        Tier::new("processing", [Mode::Normal], members(&STAGES, log)),
    ]
}

/// Stores stay up in Degraded; only processing scales with the mode.
fn scaled_tiers(log: &CallLog) -> Vec<Tier> {
    vec![
        Tier::new("stores", Mode::ALL, members(&STORES, log)),
        Tier::new("processing", [Mode::Normal], members(&STAGES, log)),
    ]
}

struct Harness {
    log: CallLog,
    sender: ModeSender,
    trigger: ShutdownTrigger,
    states: watch::Receiver<ControllerState>,
    handle: JoinHandle<()>,
}

impl Harness {
    fn spawn(log: CallLog, tiers: Vec<Tier>) -> Self {
        let controller = ModeController::new(tiers).unwrap();
        let states = controller.subscribe();
        let (sender, updates) = source::channel(4);
        let (trigger, signal) = shutdown::channel();
        let handle = tokio::spawn(controller.run(updates, signal));
        Self {
            log,
            sender,
            trigger,
            states,
            handle,
        }
    }

    /// Send `mode` and wait for its acknowledgment, which is also recorded in
    /// the call log.
    async fn apply(&self, mode: Mode) {
        let (tx, rx) = oneshot::channel();
        let record = self.log.ack(mode);
        let update = ModeUpdate::with_ack(mode, move || {
            record.ack();
            let _ = tx.send(());
        });
        self.sender.send_update(update).await.unwrap();
        timeout(WAIT, rx)
            .await
            .expect("acknowledgment timed out")
            .expect("update dropped without acknowledgment");
    }

    async fn wait_for_state(&mut self, state: ControllerState) {
        timeout(WAIT, self.states.wait_for(|s| *s == state))
            .await
            .expect("state change timed out")
            .unwrap();
    }

    async fn shutdown(self) -> CallLog {
        self.trigger.trigger();
        timeout(WAIT, self.handle)
            .await
            .expect("controller did not shut down")
            .expect("controller task panicked");
        assert_eq!(*self.states.borrow(), ControllerState::Terminated);
        self.log
    }
}

fn assert_tier_before(log: &CallLog, first: &[&str], then: &[&str], action: Action) {
    let first_done = log.last_finish(first, action).expect("first tier never acted");
    let then_began = log.first_begin(then, action).expect("second tier never acted");
    assert!(
        first_done < then_began,
        "{first:?} {action} finished at {first_done}, {then:?} {action} began at {then_began}"
    );
}

fn assert_no_call_spans_an_ack(log: &CallLog) {
    for ack in log.acks() {
        for call in log.calls() {
            let finished = call.finished_at.expect("call never finished");
            assert!(
                finished < ack.at || call.began_at > ack.at,
                "{} {} overlapped acknowledgment of {}",
                call.component,
                call.action,
                ack.mode
            );
        }
    }
}

#[tokio::test]
async fn normal_starts_stores_then_processing() {
    let log = CallLog::new();
    let mut harness = Harness::spawn(log.clone(), server_tiers(&log));

    harness.apply(Mode::Normal).await;
    harness
        .wait_for_state(ControllerState::Stable(Mode::Normal))
        .await;

    for name in all_components() {
        assert!(log.is_started(name), "{name} should be started");
    }
    assert_tier_before(&log, &STORES, &STAGES, Action::Start);

    let acks = log.acks();
    assert_eq!(acks.len(), 1);
    assert!(acks[0].at > log.last_finish(&all_components(), Action::Start).unwrap());

    harness.shutdown().await;
}

#[tokio::test]
async fn degraded_stops_processing_then_stores() {
    let log = CallLog::new();
    let mut harness = Harness::spawn(log.clone(), server_tiers(&log));

    harness.apply(Mode::Normal).await;
    harness.apply(Mode::Degraded).await;
    harness
        .wait_for_state(ControllerState::Stable(Mode::Degraded))
        .await;

    for name in all_components() {
        assert!(!log.is_started(name), "{name} should be stopped");
    }
    assert_tier_before(&log, &STAGES, &STORES, Action::Stop);

    let acks = log.acks();
    assert_eq!(acks.len(), 2);
    assert_eq!(acks[1].mode, Mode::Degraded);
    assert!(acks[1].at > log.last_finish(&all_components(), Action::Stop).unwrap());

    // Nothing is live in Degraded, so shutdown has nothing to stop
    let log = harness.shutdown().await;
    assert_eq!(log.stops().len(), 6);
}

#[tokio::test]
async fn shutdown_from_normal_stops_processing_first() {
    let log = CallLog::new();
    let harness = Harness::spawn(log.clone(), server_tiers(&log));

    harness.apply(Mode::Normal).await;
    let log = harness.shutdown().await;

    for name in all_components() {
        assert!(!log.is_started(name), "{name} should be stopped");
    }
    assert_tier_before(&log, &STAGES, &STORES, Action::Stop);
    // Only the Normal update was ever acknowledged
    assert_eq!(log.acks().len(), 1);
}

#[tokio::test]
async fn scale_up_starts_only_the_gaining_tier() {
    let log = CallLog::new();
    let harness = Harness::spawn(log.clone(), scaled_tiers(&log));

    harness.apply(Mode::Degraded).await;
    assert!(STORES.iter().all(|name| log.is_started(name)));
    assert!(STAGES.iter().all(|name| !log.is_started(name)));

    harness.apply(Mode::Normal).await;
    assert!(STAGES.iter().all(|name| log.is_started(name)));
    assert_tier_before(&log, &STORES, &STAGES, Action::Start);
    // Stores were not restarted
    assert_eq!(log.starts().len(), 6);

    harness.shutdown().await;
}

#[tokio::test]
async fn scale_down_stops_only_the_losing_tier() {
    let log = CallLog::new();
    let harness = Harness::spawn(log.clone(), scaled_tiers(&log));

    harness.apply(Mode::Normal).await;
    harness.apply(Mode::Degraded).await;

    assert!(STAGES.iter().all(|name| !log.is_started(name)));
    assert!(STORES.iter().all(|name| log.is_started(name)));
    assert_eq!(log.stops().len(), 2);

    // Shutdown stops the stores that stayed up in Degraded
    let log = harness.shutdown().await;
    assert!(STORES.iter().all(|name| !log.is_started(name)));
    assert_eq!(log.stops().len(), 6);
}

#[tokio::test]
async fn repeated_mode_is_acknowledged_without_component_calls() {
    let log = CallLog::new();
    let harness = Harness::spawn(log.clone(), server_tiers(&log));

    harness.apply(Mode::Normal).await;
    let calls_after_first = log.calls().len();
    harness.apply(Mode::Normal).await;

    assert_eq!(log.calls().len(), calls_after_first);
    assert_eq!(log.acks().len(), 2);

    harness.shutdown().await;
}

#[tokio::test]
async fn every_update_is_acknowledged_once_after_its_actions() {
    let log = CallLog::new();
    let harness = Harness::spawn(log.clone(), scaled_tiers(&log));

    let sequence = [
        Mode::Normal,
        Mode::Degraded,
        Mode::Normal,
        Mode::Degraded,
        Mode::Degraded,
    ];
    for mode in sequence {
        harness.apply(mode).await;
    }

    let acks = log.acks();
    assert_eq!(acks.len(), sequence.len());
    assert_eq!(
        acks.iter().map(|a| a.mode).collect::<Vec<_>>(),
        sequence.to_vec()
    );
    assert_no_call_spans_an_ack(&log);

    harness.shutdown().await;
}

#[tokio::test]
async fn shutdown_stops_every_tier_in_reverse() {
    let log = CallLog::new();
    let tiers = vec![
        Tier::new("stores", Mode::ALL, members(&STORES, &log)),
        Tier::new("processing", [Mode::Normal], members(&["processor"], &log)),
        Tier::new("routing", [Mode::Normal], members(&["router"], &log)),
    ];
    let harness = Harness::spawn(log.clone(), tiers);

    harness.apply(Mode::Normal).await;
    let log = harness.shutdown().await;

    for name in all_components() {
        assert!(!log.is_started(name), "{name} should be stopped");
    }
    assert_tier_before(&log, &["router"], &["processor"], Action::Stop);
    assert_tier_before(&log, &["processor"], &STORES, Action::Stop);
}

#[tokio::test]
async fn cancellation_wins_over_a_ready_update() {
    let log = CallLog::new();
    let controller = ModeController::new(server_tiers(&log)).unwrap();
    let states = controller.subscribe();
    let (sender, updates) = source::channel(1);
    let (trigger, signal) = shutdown::channel();

    let pending = sender.send(Mode::Normal).await.unwrap();
    trigger.trigger();

    timeout(WAIT, controller.run(updates, signal))
        .await
        .expect("controller did not shut down");

    assert!(log.calls().is_empty());
    assert_eq!(*states.borrow(), ControllerState::Terminated);
    assert!(matches!(
        pending.wait().await,
        Err(ControlError::AckDropped(Mode::Normal))
    ));
}

#[tokio::test]
async fn cancellation_mid_transition_abandons_remaining_tiers() {
    let log = CallLog::new();
    let slow_stores = STORES
        .iter()
        .map(|name| {
            Arc::new(RecordingComponent::new(*name, &log).with_delay(Duration::from_millis(50)))
                as Arc<dyn Lifecycle>
        })
        .collect();
    let tiers = vec![
        Tier::new("stores", [Mode::Normal], slow_stores),
        Tier::new("processing", [Mode::Normal], members(&STAGES, &log)),
    ];
    let mut harness = Harness::spawn(log.clone(), tiers);

    let pending = harness.sender.send(Mode::Normal).await.unwrap();
    harness
        .wait_for_state(ControllerState::Applying(Mode::Normal))
        .await;

    let log = harness.shutdown().await;

    // The store barrier completed, processing never started, stores were torn down
    assert!(log.first_begin(&STAGES, Action::Start).is_none());
    assert_eq!(log.starts().len(), 4);
    assert!(STORES.iter().all(|name| !log.is_started(name)));
    assert!(log.acks().is_empty());
    assert!(matches!(
        pending.wait().await,
        Err(ControlError::AckDropped(Mode::Normal))
    ));
}

#[tokio::test]
async fn static_source_applies_once_and_waits_for_shutdown() {
    let log = CallLog::new();
    let controller = ModeController::new(scaled_tiers(&log)).unwrap();
    let mut states = controller.subscribe();
    let (trigger, signal) = shutdown::channel();
    let handle = tokio::spawn(controller.run(StaticModeSource::new(Mode::Degraded), signal));

    timeout(
        WAIT,
        states.wait_for(|s| *s == ControllerState::Stable(Mode::Degraded)),
    )
    .await
    .unwrap()
    .unwrap();
    assert!(STORES.iter().all(|name| log.is_started(name)));
    assert!(!handle.is_finished());

    trigger.trigger();
    timeout(WAIT, handle).await.unwrap().unwrap();
    assert!(STORES.iter().all(|name| !log.is_started(name)));
}

#[tokio::test]
async fn server_topology_binds_and_runs() {
    let log = CallLog::new();
    let topology = TopologyConfig::server_default();
    let mut registry = ComponentRegistry::new();
    for name in topology.component_names() {
        registry.register(RecordingComponent::shared(name, &log));
    }

    let controller = ModeController::from_topology(&topology, &registry).unwrap();
    let (sender, updates) = source::channel(1);
    let (trigger, signal) = shutdown::channel();
    let handle = tokio::spawn(controller.run(updates, signal));

    timeout(WAIT, sender.send_and_wait(Mode::Normal))
        .await
        .unwrap()
        .unwrap();
    assert_tier_before(&log, &STORES, &STAGES, Action::Start);

    trigger.trigger();
    timeout(WAIT, handle).await.unwrap().unwrap();
    assert_tier_before(&log, &STAGES, &STORES, Action::Stop);

    // The controller dropped its source on exit
    assert!(matches!(
        sender.send(Mode::Degraded).await,
        Err(ControlError::SourceClosed)
    ));
}
