//! Integration tests for the sync session loop.
//!
//! A scripted dialer stands in for the socket: it records every dial and
//! sent frame, and lets the test push transport events for a connection.
//! Time is paused, so reconnect delays are exact.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use alarmdeck_client::config::ClientConfig;
use alarmdeck_client::events::ClientEvent;
use alarmdeck_client::session::{SessionHandle, SyncSession};
use alarmdeck_client::transport::{
    ConnectionState, Dialer, Link, LinkEvent, TransportEvent, TransportEventSender,
};
use alarmdeck_core::alarm::Severity;
use alarmdeck_core::metric::MetricId;
use alarmdeck_core::threshold::ThresholdInput;
use alarmdeck_core::types::ConnectionId;
use assert_matches::assert_matches;
use tokio::task::JoinHandle;

// ---------------------------------------------------------------------------
// Scripted dialer
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Script {
    links: Vec<(ConnectionId, TransportEventSender)>,
    sent: Vec<(ConnectionId, serde_json::Value)>,
    closed: Vec<ConnectionId>,
}

#[derive(Clone, Default)]
struct ScriptedDialer {
    script: Arc<Mutex<Script>>,
}

struct ScriptedLink {
    connection: ConnectionId,
    script: Arc<Mutex<Script>>,
}

impl Dialer for ScriptedDialer {
    type Link = ScriptedLink;

    fn dial(&mut self, connection: ConnectionId, events: TransportEventSender) -> ScriptedLink {
        self.script.lock().unwrap().links.push((connection, events));
        ScriptedLink {
            connection,
            script: Arc::clone(&self.script),
        }
    }
}

impl Link for ScriptedLink {
    fn send(&self, frame: String) -> bool {
        let value = serde_json::from_str(&frame).expect("client sends JSON");
        self.script
            .lock()
            .unwrap()
            .sent
            .push((self.connection, value));
        true
    }

    fn close(self) {
        self.script.lock().unwrap().closed.push(self.connection);
    }
}

impl ScriptedDialer {
    fn dials(&self) -> Vec<ConnectionId> {
        self.script
            .lock()
            .unwrap()
            .links
            .iter()
            .map(|(id, _)| *id)
            .collect()
    }

    fn latest(&self) -> ConnectionId {
        *self.dials().last().expect("at least one dial")
    }

    fn emit(&self, kind: LinkEvent) {
        let script = self.script.lock().unwrap();
        let (connection, events) = script.links.last().expect("at least one dial");
        events
            .send(TransportEvent {
                connection: *connection,
                kind,
            })
            .unwrap();
    }

    fn frame(&self, json: &str) {
        self.emit(LinkEvent::Frame(json.to_string()));
    }

    fn sent(&self) -> Vec<serde_json::Value> {
        self.script
            .lock()
            .unwrap()
            .sent
            .iter()
            .map(|(_, v)| v.clone())
            .collect()
    }

    fn sent_types(&self) -> Vec<String> {
        self.sent()
            .iter()
            .map(|v| v["type"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    fn closed(&self) -> Vec<ConnectionId> {
        self.script.lock().unwrap().closed.clone()
    }
}

fn spawn_session(config: ClientConfig) -> (ScriptedDialer, SessionHandle, JoinHandle<()>) {
    let dialer = ScriptedDialer::default();
    let (session, handle) = SyncSession::new(&config, dialer.clone());
    let task = tokio::spawn(session.run());
    (dialer, handle, task)
}

/// Let the session loop drain everything queued so far.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

async fn connected_session(
    config: ClientConfig,
) -> (ScriptedDialer, SessionHandle, JoinHandle<()>) {
    let (dialer, handle, task) = spawn_session(config);
    settle().await;
    dialer.emit(LinkEvent::Opened);
    settle().await;
    (dialer, handle, task)
}

// ---------------------------------------------------------------------------
// Reconnection
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn unexpected_close_reconnects_after_fixed_delay() {
    let (dialer, _handle, _task) = connected_session(ClientConfig::default()).await;
    assert_eq!(dialer.dials(), vec![1]);

    dialer.emit(LinkEvent::Closed);
    settle().await;

    tokio::time::sleep(Duration::from_secs(4)).await;
    assert_eq!(dialer.dials(), vec![1], "no attempt before the delay");

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(dialer.dials(), vec![1, 2], "exactly one attempt after it");
}

#[tokio::test(start_paused = true)]
async fn duplicate_close_does_not_double_schedule() {
    let (dialer, _handle, _task) = connected_session(ClientConfig::default()).await;

    dialer.emit(LinkEvent::Errored("connection reset".into()));
    dialer.emit(LinkEvent::Closed);
    settle().await;
    tokio::time::sleep(Duration::from_secs(2)).await;
    dialer.emit(LinkEvent::Closed);
    settle().await;

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(dialer.dials(), vec![1, 2]);
}

#[tokio::test(start_paused = true)]
async fn failed_attempts_retry_indefinitely() {
    let (dialer, _handle, _task) = spawn_session(ClientConfig::default());
    settle().await;

    for attempt in 1..=5u64 {
        assert_eq!(dialer.latest(), attempt);
        dialer.emit(LinkEvent::Errored("refused".into()));
        dialer.emit(LinkEvent::Closed);
        settle().await;
        tokio::time::sleep(Duration::from_secs(5)).await;
    }
    assert_eq!(dialer.dials().len(), 6);
}

#[tokio::test(start_paused = true)]
async fn reconnect_cancels_pending_timer_on_open() {
    let config = ClientConfig {
        reconnect_delay: Duration::from_secs(3),
        ..ClientConfig::default()
    };
    let (dialer, _handle, _task) = connected_session(config).await;

    dialer.emit(LinkEvent::Closed);
    settle().await;
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(dialer.dials(), vec![1, 2]);

    dialer.emit(LinkEvent::Opened);
    settle().await;
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(dialer.dials(), vec![1, 2]);
}

#[tokio::test(start_paused = true)]
async fn shutdown_cancels_pending_retry_and_closes() {
    let (dialer, handle, task) = connected_session(ClientConfig::default()).await;

    dialer.emit(LinkEvent::Closed);
    settle().await;
    handle.shutdown();
    task.await.unwrap();

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(dialer.dials(), vec![1]);
}

#[tokio::test(start_paused = true)]
async fn shutdown_closes_live_link_without_reconnect() {
    let (dialer, handle, task) = connected_session(ClientConfig::default()).await;

    handle.shutdown();
    task.await.unwrap();

    assert_eq!(dialer.closed(), vec![1]);
    assert_eq!(dialer.dials(), vec![1]);
}

#[tokio::test(start_paused = true)]
async fn connection_changes_are_published() {
    let dialer = ScriptedDialer::default();
    let (session, handle) = SyncSession::new(&ClientConfig::default(), dialer.clone());
    let mut events = handle.subscribe();
    let _task = tokio::spawn(session.run());
    settle().await;

    dialer.emit(LinkEvent::Opened);
    dialer.emit(LinkEvent::Closed);
    settle().await;

    let states: Vec<ConnectionState> = std::iter::from_fn(|| events.try_recv().ok())
        .filter_map(|e| match e {
            ClientEvent::ConnectionChanged { state } => Some(state),
            _ => None,
        })
        .collect();
    assert_eq!(
        states,
        vec![
            ConnectionState::Connecting,
            ConnectionState::Connected,
            ConnectionState::Disconnected,
        ]
    );
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn open_requests_config() {
    let (dialer, _handle, _task) = connected_session(ClientConfig::default()).await;
    assert_eq!(dialer.sent(), vec![serde_json::json!({"type": "get_config"})]);
}

#[tokio::test(start_paused = true)]
async fn commands_while_disconnected_are_dropped_not_replayed() {
    let (dialer, handle, _task) = spawn_session(ClientConfig::default());
    settle().await;

    handle.start_simulation();
    handle.clear_alarms();
    settle().await;
    assert!(dialer.sent().is_empty());

    dialer.emit(LinkEvent::Opened);
    settle().await;
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(dialer.sent_types(), vec!["get_config"]);
}

#[tokio::test(start_paused = true)]
async fn threshold_batch_skips_malformed_rows() {
    let (dialer, handle, _task) = connected_session(ClientConfig::default()).await;

    handle.update_thresholds(vec![
        ThresholdInput::new(MetricId::Cpu, "70", "abc"),
        ThresholdInput::new(MetricId::Memory, "60", "85"),
    ]);
    settle().await;

    let sent = dialer.sent();
    let updates: Vec<_> = sent
        .iter()
        .filter(|v| v["type"] == "threshold_update")
        .collect();
    assert_eq!(
        updates,
        vec![&serde_json::json!({
            "type": "threshold_update",
            "metric": "memory",
            "warning": 60.0,
            "critical": 85.0
        })]
    );
}

#[tokio::test(start_paused = true)]
async fn intents_map_one_to_one_onto_frames() {
    let config = ClientConfig {
        spike_magnitude: 0.8,
        ..ClientConfig::default()
    };
    let (dialer, handle, _task) = connected_session(config).await;

    handle.start_simulation();
    handle.trigger_spike(MetricId::Bandwidth);
    handle.trigger_spike_at(MetricId::Cpu, 3.0);
    handle.stop_simulation();
    handle.clear_alarms();
    handle.request_config();
    settle().await;

    let sent = dialer.sent();
    assert_eq!(
        sent[1..],
        [
            serde_json::json!({"type": "simulation_control", "action": "start"}),
            serde_json::json!({"type": "simulate_spike", "metric": "bandwidth", "percentage": 0.8}),
            serde_json::json!({"type": "simulation_control", "action": "stop"}),
            serde_json::json!({"type": "clear_alarms"}),
            serde_json::json!({"type": "get_config"}),
        ]
    );
}

// ---------------------------------------------------------------------------
// Inbound frames
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn inbound_frames_build_snapshot_in_order() {
    let (dialer, handle, _task) = connected_session(ClientConfig::default()).await;

    dialer.frame(r#"{"type":"config","data":{"thresholds":{"cpu":{"warning":70,"critical":90}}}}"#);
    dialer.frame(r#"{"type":"metrics_update","data":{"cpu":{"value":40.0,"unit":"%"}}}"#);
    dialer.frame(r#"{"type":"metrics_update","data":{"cpu":{"value":95.5,"unit":"%"}}}"#);
    dialer.frame("garbage");
    dialer.frame(r#"{"type":"alarm_update","data":{"alarms":{"cpu":"critical"},"history":[{"timestamp":"t","status":"critical","message":"CPU critical"}]}}"#);
    settle().await;

    let snapshot = handle.snapshot();
    assert!(snapshot.is_populated());
    assert_eq!(snapshot.metrics[&MetricId::Cpu].value, 95.5);
    assert_eq!(snapshot.banner.severity, Severity::Critical);
    assert_eq!(snapshot.history.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn error_event_surfaces_diagnostic_only() {
    let (dialer, handle, _task) = connected_session(ClientConfig::default()).await;
    let mut events = handle.subscribe();
    let before = handle.snapshot();

    dialer.frame(r#"{"type":"error","data":{"message":"Unknown command"}}"#);
    settle().await;

    assert_matches!(
        events.try_recv(),
        Ok(ClientEvent::Diagnostic { message, .. }) if message == "Unknown command"
    );
    assert_eq!(*handle.snapshot(), *before);
}

#[tokio::test(start_paused = true)]
async fn alert_sound_repeats_while_critical() {
    let config = ClientConfig {
        sound_enabled: true,
        ..ClientConfig::default()
    };
    let (dialer, handle, _task) = connected_session(config).await;
    let mut events = handle.subscribe();
    let critical = r#"{"type":"alarm_update","data":{"alarms":{"cpu":"critical","memory":"warning"},"history":[]}}"#;

    dialer.frame(critical);
    dialer.frame(critical);
    dialer.frame(r#"{"type":"alarm_update","data":{"alarms":{"cpu":"normal"},"history":[]}}"#);
    settle().await;

    let alerts = std::iter::from_fn(|| events.try_recv().ok())
        .filter(|e| matches!(e, ClientEvent::AlertSound { .. }))
        .count();
    assert_eq!(alerts, 2, "repeats-while-critical");

    handle.set_sound_enabled(false);
    settle().await;
    dialer.frame(critical);
    settle().await;
    assert!(events.try_recv().is_err());
}
