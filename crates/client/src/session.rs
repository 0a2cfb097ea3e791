//! The dashboard sync session.
//!
//! [`SyncSession`] owns the transport, the reconnect policy and the
//! reconciler, and reacts to one thing at a time: a transport event, a
//! user request, or the reconnect timer. [`SyncSession::run`] drives those
//! reactions from a single `select!` loop, so no two of them ever
//! interleave and the snapshot needs no lock.
//!
//! The presentation layer talks to the session only through the
//! [`SessionHandle`] returned by [`SyncSession::new`].

use std::sync::Arc;

use alarmdeck_core::messages::{decode, encode, InboundEvent, OutboundCommand};
use alarmdeck_core::metric::MetricId;
use alarmdeck_core::reconcile::Reconciler;
use alarmdeck_core::snapshot::ViewModelSnapshot;
use alarmdeck_core::threshold::ThresholdInput;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::ClientConfig;
use crate::dispatcher::{dispatch, Intent};
use crate::events::ClientEvent;
use crate::reconnect::ReconnectPolicy;
use crate::transport::{
    event_channel, ConnectionState, Dialer, LinkEvent, TransportEvent, TransportEventReceiver,
    TransportSession,
};

/// Broadcast channel capacity for client events.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Requests queued by a [`SessionHandle`].
#[derive(Debug)]
enum Request {
    Intent(Intent),
    SoundEnabled(bool),
}

/// One sync session against the dashboard server.
pub struct SyncSession<D: Dialer> {
    transport: TransportSession<D>,
    transport_events: TransportEventReceiver,
    requests: mpsc::UnboundedReceiver<Request>,
    policy: ReconnectPolicy,
    engine: Reconciler,
    sound_enabled: bool,
    /// Last state published as [`ClientEvent::ConnectionChanged`].
    published_state: ConnectionState,
    snapshot_tx: watch::Sender<Arc<ViewModelSnapshot>>,
    event_tx: broadcast::Sender<ClientEvent>,
    cancel: CancellationToken,
}

impl<D: Dialer> SyncSession<D> {
    /// Build a session and the handle used to drive it.
    ///
    /// Nothing connects until [`start`](Self::start) or [`run`](Self::run).
    pub fn new(config: &ClientConfig, dialer: D) -> (Self, SessionHandle) {
        let (transport_tx, transport_events) = event_channel();
        let (request_tx, requests) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(Arc::new(ViewModelSnapshot::new()));
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();

        let handle = SessionHandle {
            requests: request_tx,
            snapshot_rx,
            event_tx: event_tx.clone(),
            cancel: cancel.clone(),
            spike_magnitude: config.spike_magnitude,
        };

        let session = Self {
            transport: TransportSession::new(dialer, transport_tx),
            transport_events,
            requests,
            policy: ReconnectPolicy::new(config.reconnect_delay),
            engine: Reconciler::new(),
            sound_enabled: config.sound_enabled,
            published_state: ConnectionState::Disconnected,
            snapshot_tx,
            event_tx,
            cancel,
        };

        (session, handle)
    }

    /// The last committed snapshot.
    pub fn snapshot(&self) -> &ViewModelSnapshot {
        self.engine.snapshot()
    }

    /// Current transport state.
    pub fn connection_state(&self) -> ConnectionState {
        self.transport.state()
    }

    /// The reconnect policy and its pending deadline.
    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// The underlying transport session.
    pub fn transport(&self) -> &TransportSession<D> {
        &self.transport
    }

    /// Open the first connection.
    pub fn start(&mut self) {
        tracing::info!("Starting dashboard session");
        self.transport.connect();
        self.publish_state();
    }

    /// Cancel any pending retry and close the connection.
    pub fn stop(&mut self) {
        tracing::info!("Stopping dashboard session");
        self.policy.cancel();
        self.transport.close();
        self.publish_state();
    }

    /// React to one event from the transport channel.
    pub fn handle_transport_event(&mut self, event: TransportEvent, now: Instant) {
        let Some(kind) = self.transport.observe(event) else {
            return;
        };

        match kind {
            LinkEvent::Opened => {
                tracing::info!(connection = self.transport.connection(), "Connected to server");
                self.policy.reset();
                self.publish_state();
                self.send_command(&OutboundCommand::GetConfig);
            }
            LinkEvent::Closed => {
                self.publish_state();
                let deadline = self.policy.schedule(now);
                tracing::warn!(
                    connection = self.transport.connection(),
                    retry_in_ms = deadline.saturating_duration_since(now).as_millis() as u64,
                    "Disconnected from server, reconnect scheduled",
                );
            }
            LinkEvent::Errored(error) => {
                // The link follows up with `Closed`, which schedules the retry.
                tracing::error!(
                    connection = self.transport.connection(),
                    %error,
                    "Transport error",
                );
            }
            LinkEvent::Frame(text) => self.handle_frame(&text),
        }
    }

    /// Fire the reconnect timer if it is due. Returns `true` if a new
    /// connection attempt was started.
    pub fn poll_retry(&mut self, now: Instant) -> bool {
        if !self.policy.fire(now) {
            return false;
        }
        tracing::info!(retry = self.policy.retries(), "Attempting to reconnect");
        self.transport.connect();
        self.publish_state();
        true
    }

    /// Send the commands for one user intent.
    ///
    /// While disconnected the commands are dropped and not replayed later.
    pub fn handle_intent(&mut self, intent: &Intent) {
        for command in dispatch(intent) {
            self.send_command(&command);
        }
    }

    /// Turn audible alerts on or off.
    pub fn set_sound_enabled(&mut self, enabled: bool) {
        tracing::debug!(enabled, "Audible alerts toggled");
        self.sound_enabled = enabled;
    }

    /// Run the session until [`SessionHandle::shutdown`] is called.
    pub async fn run(mut self) {
        self.start();

        loop {
            let deadline = self.policy.deadline();
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                Some(event) = self.transport_events.recv() => {
                    self.handle_transport_event(event, Instant::now());
                }
                Some(request) = self.requests.recv() => self.handle_request(request),
                _ = wait_until(deadline) => {
                    self.poll_retry(Instant::now());
                }
            }
        }

        self.stop();
    }

    fn handle_request(&mut self, request: Request) {
        match request {
            Request::Intent(intent) => self.handle_intent(&intent),
            Request::SoundEnabled(enabled) => self.set_sound_enabled(enabled),
        }
    }

    fn handle_frame(&mut self, text: &str) {
        match decode(text) {
            Ok(event) => self.reconcile(event),
            Err(e) => {
                tracing::warn!(error = %e, raw = %text, "Dropping malformed frame");
            }
        }
    }

    fn reconcile(&mut self, event: InboundEvent) {
        match &event {
            InboundEvent::Error { message } => {
                tracing::warn!(%message, "Server reported an error");
                let _ = self.event_tx.send(ClientEvent::Diagnostic {
                    message: message.clone(),
                    received_at: chrono::Utc::now(),
                });
            }
            InboundEvent::Unrecognized { kind } => {
                tracing::warn!(%kind, "Ignoring unrecognized frame");
            }
            InboundEvent::Acknowledged { command, success } => {
                if *success {
                    tracing::debug!(%command, "Command acknowledged");
                } else {
                    tracing::warn!(%command, "Server rejected command");
                }
            }
            InboundEvent::Status(status) => {
                tracing::debug!(%status, "Received status");
            }
            InboundEvent::MetricsUpdate(_)
            | InboundEvent::AlarmUpdate { .. }
            | InboundEvent::Thresholds(_)
            | InboundEvent::Simulation(_) => {}
        }

        let outcome = self.engine.apply(&event, self.sound_enabled);

        if outcome.changed {
            self.snapshot_tx
                .send_replace(Arc::new(self.engine.snapshot().clone()));
        }

        if outcome.sound_alert {
            let _ = self.event_tx.send(ClientEvent::AlertSound {
                banner: self.engine.snapshot().banner.clone(),
            });
        }
    }

    fn send_command(&mut self, command: &OutboundCommand) {
        let frame = match encode(command) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(command = command.name(), error = %e, "Failed to encode command");
                return;
            }
        };

        match self.transport.send(frame) {
            Ok(()) => tracing::debug!(command = command.name(), "Sent command"),
            Err(e) => tracing::warn!(command = command.name(), error = %e, "Command dropped"),
        }
    }

    fn publish_state(&mut self) {
        let state = self.transport.state();
        if state != self.published_state {
            self.published_state = state;
            let _ = self.event_tx.send(ClientEvent::ConnectionChanged { state });
        }
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Cloneable front for the presentation layer.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    requests: mpsc::UnboundedSender<Request>,
    snapshot_rx: watch::Receiver<Arc<ViewModelSnapshot>>,
    event_tx: broadcast::Sender<ClientEvent>,
    cancel: CancellationToken,
    spike_magnitude: f64,
}

impl SessionHandle {
    /// Receiver that wakes on every committed snapshot.
    pub fn snapshots(&self) -> watch::Receiver<Arc<ViewModelSnapshot>> {
        self.snapshot_rx.clone()
    }

    /// The latest committed snapshot.
    pub fn snapshot(&self) -> Arc<ViewModelSnapshot> {
        Arc::clone(&self.snapshot_rx.borrow())
    }

    /// Subscribe to connection, alert and diagnostic events.
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.event_tx.subscribe()
    }

    /// Ask the server to start the simulator.
    pub fn start_simulation(&self) {
        self.intent(Intent::StartSimulation);
    }

    /// Ask the server to stop the simulator.
    pub fn stop_simulation(&self) {
        self.intent(Intent::StopSimulation);
    }

    /// Spike `metric` using the configured default magnitude.
    pub fn trigger_spike(&self, metric: MetricId) {
        self.trigger_spike_at(metric, self.spike_magnitude);
    }

    /// Spike `metric` to `magnitude`, a fraction of its full scale.
    pub fn trigger_spike_at(&self, metric: MetricId, magnitude: f64) {
        self.intent(Intent::TriggerSpike { metric, magnitude });
    }

    /// Ask the server to clear all alarms.
    pub fn clear_alarms(&self) {
        self.intent(Intent::ClearAlarms);
    }

    /// Submit every threshold row; rows that do not parse are skipped.
    pub fn update_thresholds(&self, rows: Vec<ThresholdInput>) {
        self.intent(Intent::EditThresholds(rows));
    }

    /// Reload the threshold set from the server.
    pub fn request_config(&self) {
        self.intent(Intent::RequestConfig);
    }

    /// Turn audible alerts on or off.
    pub fn set_sound_enabled(&self, enabled: bool) {
        self.request(Request::SoundEnabled(enabled));
    }

    /// Stop the session: cancels any pending retry and closes the socket.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    fn intent(&self, intent: Intent) {
        self.request(Request::Intent(intent));
    }

    fn request(&self, request: Request) {
        if self.requests.send(request).is_err() {
            tracing::debug!("Session has stopped, request dropped");
        }
    }
}
