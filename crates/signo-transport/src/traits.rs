use std::fmt;
use std::sync::Arc;

use crate::endpoint::Endpoint;
use crate::error::Result;

/// Close code for an intentional shutdown.
pub const NORMAL_CLOSURE: u16 = 1000;
/// Close code sent when an endpoint is going away (page unload, server restart).
pub const GOING_AWAY: u16 = 1001;
/// Close code reported when a close frame carried no status.
pub const NO_STATUS: u16 = 1005;
/// Close code reported when the connection dropped without a close frame.
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Returns true if the close code signals an intentional shutdown.
pub fn is_normal_closure(code: u16) -> bool {
    code == NORMAL_CLOSURE
}

/// Identifies one underlying connection within a channel session.
pub type ConnectionId = u64;

/// Lifecycle notifications a transport reports about its connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The connection is established and ready for frames.
    Opened,
    /// A complete text frame arrived.
    Message(String),
    /// The connection failed; a `Closed` event usually follows.
    Error(String),
    /// The connection is gone.
    Closed { code: u16, reason: String },
}

type Deliver = dyn Fn(ConnectionId, TransportEvent) + Send + Sync;

/// Where a transport reports its lifecycle events.
///
/// A sink is bound to a single [`ConnectionId`], so the receiving side can tell
/// events from the current connection apart from stale ones.
#[derive(Clone)]
pub struct EventSink {
    connection: ConnectionId,
    deliver: Arc<Deliver>,
}

impl EventSink {
    /// Create a sink for `connection` that hands events to `deliver`.
    pub fn new<F>(connection: ConnectionId, deliver: F) -> Self
    where
        F: Fn(ConnectionId, TransportEvent) + Send + Sync + 'static,
    {
        Self {
            connection,
            deliver: Arc::new(deliver),
        }
    }

    /// Connection this sink reports for.
    pub fn connection(&self) -> ConnectionId {
        self.connection
    }

    pub fn emit(&self, event: TransportEvent) {
        (self.deliver)(self.connection, event);
    }

    pub fn opened(&self) {
        self.emit(TransportEvent::Opened);
    }

    pub fn message(&self, text: impl Into<String>) {
        self.emit(TransportEvent::Message(text.into()));
    }

    pub fn error(&self, description: impl Into<String>) {
        self.emit(TransportEvent::Error(description.into()));
    }

    pub fn closed(&self, code: u16, reason: impl Into<String>) {
        self.emit(TransportEvent::Closed {
            code,
            reason: reason.into(),
        });
    }
}

impl fmt::Debug for EventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSink")
            .field("connection", &self.connection)
            .finish_non_exhaustive()
    }
}

/// One live connection. Writing never blocks; delivery outcomes surface later
/// through the connection's [`EventSink`].
pub trait Transport: Send {
    /// Queue a text frame for delivery.
    fn send_text(&mut self, text: String) -> Result<()>;

    /// Request a graceful shutdown with the given close code.
    fn close(&mut self, code: u16, reason: &str) -> Result<()>;
}

/// Creates transports for an endpoint.
pub trait Connector: Send {
    type Transport: Transport;

    /// Start opening a connection.
    ///
    /// `Ok` means the transport exists and will report `Opened` or `Error`
    /// through `events`; `Err` means it could not even be constructed.
    fn open(&mut self, endpoint: &Endpoint, events: EventSink) -> Result<Self::Transport>;
}
