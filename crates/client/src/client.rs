//! WebSocket link to the dashboard server.
//!
//! [`WsDialer`] spawns one task per connection attempt. The task connects,
//! forwards inbound text frames as [`LinkEvent::Frame`], writes whatever
//! the [`WsLink`] queues, and reports `Closed` when the socket ends. A
//! cancelled link exits quietly.

use alarmdeck_core::types::ConnectionId;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::transport::{Dialer, Link, LinkEvent, TransportEvent, TransportEventSender};

/// Dials `ws://` or `wss://` URLs with tokio-tungstenite.
#[derive(Debug, Clone)]
pub struct WsDialer {
    url: String,
}

impl WsDialer {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Dialer for WsDialer {
    type Link = WsLink;

    fn dial(&mut self, connection: ConnectionId, events: TransportEventSender) -> WsLink {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let url = self.url.clone();

        tokio::spawn(async move {
            run_link(&url, connection, &events, outbound_rx, &task_cancel).await;
        });

        WsLink {
            outbound: outbound_tx,
            cancel,
        }
    }
}

/// Handle to one spawned connection task.
#[derive(Debug)]
pub struct WsLink {
    outbound: mpsc::UnboundedSender<String>,
    cancel: CancellationToken,
}

impl Link for WsLink {
    fn send(&self, frame: String) -> bool {
        self.outbound.send(frame).is_ok()
    }

    fn close(self) {
        self.cancel.cancel();
    }
}

fn emit(events: &TransportEventSender, connection: ConnectionId, kind: LinkEvent) {
    let _ = events.send(TransportEvent { connection, kind });
}

/// Connect, then pump frames in both directions until the socket ends or
/// the link is cancelled.
async fn run_link(
    url: &str,
    connection: ConnectionId,
    events: &TransportEventSender,
    mut outbound: mpsc::UnboundedReceiver<String>,
    cancel: &CancellationToken,
) {
    let connected = tokio::select! {
        _ = cancel.cancelled() => return,
        result = connect_async(url) => result,
    };

    let ws_stream = match connected {
        Ok((ws_stream, _response)) => ws_stream,
        Err(e) => {
            tracing::warn!(connection, url, error = %e, "WebSocket connection failed");
            emit(events, connection, LinkEvent::Errored(e.to_string()));
            emit(events, connection, LinkEvent::Closed);
            return;
        }
    };

    tracing::info!(connection, url, "WebSocket connected");
    emit(events, connection, LinkEvent::Opened);

    let (mut sink, mut stream) = ws_stream.split();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                tracing::debug!(connection, "WebSocket link cancelled");
                return;
            }
            Some(frame) = outbound.recv() => {
                if let Err(e) = sink.send(Message::Text(frame)).await {
                    tracing::error!(connection, error = %e, "WebSocket send error");
                    emit(events, connection, LinkEvent::Errored(e.to_string()));
                    break;
                }
            }
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        emit(events, connection, LinkEvent::Frame(text));
                    }
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                        // Handled automatically by tungstenite.
                    }
                    Some(Ok(Message::Close(frame))) => {
                        tracing::info!(connection, ?frame, "Server closed WebSocket");
                        break;
                    }
                    Some(Ok(_)) => {
                        // Binary / Frame -- ignore.
                    }
                    Some(Err(e)) => {
                        tracing::error!(connection, error = %e, "WebSocket receive error");
                        emit(events, connection, LinkEvent::Errored(e.to_string()));
                        break;
                    }
                    None => {
                        tracing::info!(connection, "WebSocket stream exhausted");
                        break;
                    }
                }
            }
        }
    }

    emit(events, connection, LinkEvent::Closed);
}
