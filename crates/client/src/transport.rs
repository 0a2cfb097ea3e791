//! One live bidirectional connection and its lifecycle.
//!
//! [`TransportSession`] owns at most one [`Link`] at a time. Links report
//! back through a shared channel of [`TransportEvent`]s tagged with the
//! connection they belong to; events from a link that has since been
//! replaced or closed are discarded by [`TransportSession::observe`], so an
//! explicit [`close`](TransportSession::close) never looks like an
//! unexpected drop.

use alarmdeck_core::types::ConnectionId;
use tokio::sync::mpsc;

/// Connection state as seen by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Lifecycle notification from a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    Opened,
    Closed,
    Errored(String),
    Frame(String),
}

/// A [`LinkEvent`] tagged with the connection that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportEvent {
    pub connection: ConnectionId,
    pub kind: LinkEvent,
}

pub type TransportEventSender = mpsc::UnboundedSender<TransportEvent>;
pub type TransportEventReceiver = mpsc::UnboundedReceiver<TransportEvent>;

/// Creates the channel links report through.
pub fn event_channel() -> (TransportEventSender, TransportEventReceiver) {
    mpsc::unbounded_channel()
}

/// Opens links. The WebSocket implementation lives in [`crate::client`].
pub trait Dialer {
    type Link: Link;

    /// Start connecting. The returned link must eventually report either
    /// `Opened` or `Closed` on `events`, tagged with `connection`.
    fn dial(&mut self, connection: ConnectionId, events: TransportEventSender) -> Self::Link;
}

/// Write half and teardown handle of one connection.
pub trait Link {
    /// Queue a text frame. Returns `false` if the link can no longer send.
    fn send(&self, frame: String) -> bool;

    /// Tear the connection down. Must not report `Closed` afterwards
    /// (anything it does report is ignored anyway).
    fn close(self);
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Sending was attempted while not connected.
    #[error("Transport is {0:?}, frame dropped")]
    NotConnected(ConnectionState),

    /// The link refused the frame (its writer has gone away).
    #[error("Link {0} refused frame")]
    LinkGone(ConnectionId),
}

/// Owns the current link and tracks its connection state.
pub struct TransportSession<D: Dialer> {
    dialer: D,
    events: TransportEventSender,
    link: Option<D::Link>,
    connection: ConnectionId,
    state: ConnectionState,
}

impl<D: Dialer> TransportSession<D> {
    /// Create a disconnected session that dials through `dialer`.
    pub fn new(dialer: D, events: TransportEventSender) -> Self {
        Self {
            dialer,
            events,
            link: None,
            connection: 0,
            state: ConnectionState::Disconnected,
        }
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Id of the most recent connection attempt.
    pub fn connection(&self) -> ConnectionId {
        self.connection
    }

    /// The dialer used for new connections.
    pub fn dialer(&self) -> &D {
        &self.dialer
    }

    /// Open a new connection, closing the current one first.
    pub fn connect(&mut self) -> ConnectionId {
        self.teardown();
        self.connection += 1;
        tracing::info!(connection = self.connection, "Opening transport connection");
        self.link = Some(self.dialer.dial(self.connection, self.events.clone()));
        self.state = ConnectionState::Connecting;
        self.connection
    }

    /// Send one frame. Frames sent while not connected are dropped, never
    /// queued for later.
    pub fn send(&mut self, frame: String) -> Result<(), TransportError> {
        if self.state != ConnectionState::Connected {
            return Err(TransportError::NotConnected(self.state));
        }
        match &self.link {
            Some(link) if link.send(frame) => Ok(()),
            _ => Err(TransportError::LinkGone(self.connection)),
        }
    }

    /// Close the current connection. Does not report `Closed`.
    pub fn close(&mut self) {
        if self.link.is_some() {
            tracing::info!(connection = self.connection, "Closing transport connection");
        }
        self.teardown();
    }

    /// Filter and account for an event from the channel.
    ///
    /// Returns `None` for events from stale connections; otherwise updates
    /// the connection state and hands the event back.
    pub fn observe(&mut self, event: TransportEvent) -> Option<LinkEvent> {
        if event.connection != self.connection || self.link.is_none() {
            tracing::trace!(
                connection = event.connection,
                current = self.connection,
                kind = ?event.kind,
                "Ignoring event from stale connection",
            );
            return None;
        }

        match &event.kind {
            LinkEvent::Opened => self.state = ConnectionState::Connected,
            LinkEvent::Closed => {
                self.link = None;
                self.state = ConnectionState::Disconnected;
            }
            LinkEvent::Errored(_) | LinkEvent::Frame(_) => {}
        }

        Some(event.kind)
    }

    fn teardown(&mut self) {
        if let Some(link) = self.link.take() {
            link.close();
        }
        self.state = ConnectionState::Disconnected;
    }
}


#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::testing::FakeDialer;
    use super::*;

    fn session() -> (TransportSession<FakeDialer>, FakeDialer) {
        let dialer = FakeDialer::default();
        let (tx, _rx) = event_channel();
        (TransportSession::new(dialer.clone(), tx), dialer)
    }

    fn event(connection: ConnectionId, kind: LinkEvent) -> TransportEvent {
        TransportEvent { connection, kind }
    }

    #[test]
    fn connect_closes_prior_link_first() {
        let (mut transport, dialer) = session();
        let first = transport.connect();
        let second = transport.connect();

        let recorded = dialer.recorded.lock().unwrap();
        assert_eq!(recorded.dials, vec![first, second]);
        assert_eq!(recorded.closed, vec![first]);
        assert_eq!(transport.state(), ConnectionState::Connecting);
    }

    #[test]
    fn opened_marks_connected() {
        let (mut transport, _) = session();
        let id = transport.connect();
        assert_eq!(
            transport.observe(event(id, LinkEvent::Opened)),
            Some(LinkEvent::Opened)
        );
        assert_eq!(transport.state(), ConnectionState::Connected);
    }

    #[test]
    fn send_while_disconnected_is_dropped() {
        let (mut transport, dialer) = session();
        assert_matches!(
            transport.send("{}".into()),
            Err(TransportError::NotConnected(ConnectionState::Disconnected))
        );

        transport.connect();
        assert_matches!(
            transport.send("{}".into()),
            Err(TransportError::NotConnected(ConnectionState::Connecting))
        );
        assert!(dialer.recorded.lock().unwrap().sent.is_empty());
    }

    #[test]
    fn send_while_connected_reaches_link() {
        let (mut transport, dialer) = session();
        let id = transport.connect();
        transport.observe(event(id, LinkEvent::Opened));
        transport.send("hello".into()).unwrap();
        assert_eq!(
            dialer.recorded.lock().unwrap().sent,
            vec![(id, "hello".to_string())]
        );
    }

    #[test]
    fn events_after_explicit_close_are_ignored() {
        let (mut transport, _) = session();
        let id = transport.connect();
        transport.observe(event(id, LinkEvent::Opened));
        transport.close();

        assert_eq!(transport.observe(event(id, LinkEvent::Closed)), None);
        assert_eq!(transport.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn events_from_replaced_connection_are_ignored() {
        let (mut transport, _) = session();
        let old = transport.connect();
        let new = transport.connect();

        assert_eq!(transport.observe(event(old, LinkEvent::Frame("x".into()))), None);
        assert_eq!(
            transport.observe(event(new, LinkEvent::Closed)),
            Some(LinkEvent::Closed)
        );
        assert_eq!(transport.state(), ConnectionState::Disconnected);
        // The link is gone, so a duplicate close is stale too.
        assert_eq!(transport.observe(event(new, LinkEvent::Closed)), None);
    }
}
