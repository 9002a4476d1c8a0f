//! In-process transport.
//!
//! [`MemoryConnector`] plays both ends: the channel side opens
//! [`MemoryTransport`]s through the [`Connector`] trait, while the holder of a
//! cloned connector plays the server, driving lifecycle events and inspecting
//! everything the channel wrote. No I/O and no timers are involved, which makes
//! channel behavior fully deterministic under test.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::endpoint::Endpoint;
use crate::error::{Result, TransportError};
use crate::traits::{ConnectionId, Connector, EventSink, Transport};

#[derive(Debug)]
struct MemoryConnection {
    sink: EventSink,
    endpoint: String,
    sent: Vec<String>,
    close_request: Option<(u16, String)>,
    finished: bool,
}

#[derive(Debug, Default)]
struct MemoryState {
    connections: Vec<MemoryConnection>,
    refuse_next: usize,
    construction_failures: usize,
}

/// Shared handle over a set of in-memory connections.
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    state: Arc<Mutex<MemoryState>>,
}

/// Channel side of an in-memory connection.
#[derive(Debug)]
pub struct MemoryTransport {
    index: usize,
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make the next `count` calls to `open` fail at construction time.
    pub fn refuse_next(&self, count: usize) {
        self.lock().refuse_next = count;
    }

    /// Number of transports successfully constructed so far.
    pub fn opened_count(&self) -> usize {
        self.lock().connections.len()
    }

    /// Number of `open` calls rejected at construction time.
    pub fn construction_failures(&self) -> usize {
        self.lock().construction_failures
    }

    /// Endpoint the most recent transport was opened for.
    pub fn last_endpoint(&self) -> Option<String> {
        self.lock().connections.last().map(|c| c.endpoint.clone())
    }

    /// Every frame written on any connection, in write order per connection.
    pub fn sent_frames(&self) -> Vec<String> {
        self.lock()
            .connections
            .iter()
            .flat_map(|c| c.sent.iter().cloned())
            .collect()
    }

    /// Close code and reason requested on the latest connection, if any.
    pub fn close_request(&self) -> Option<(u16, String)> {
        self.lock()
            .connections
            .last()
            .and_then(|c| c.close_request.clone())
    }

    /// Complete the handshake on the latest connection.
    pub fn accept(&self) {
        self.with_latest(|sink| sink.opened());
    }

    /// Deliver a text frame on the latest connection.
    pub fn deliver(&self, text: impl Into<String>) {
        let text = text.into();
        self.with_latest(move |sink| sink.message(text));
    }

    /// Raise a runtime error on the latest connection.
    pub fn fail(&self, description: impl Into<String>) {
        let description = description.into();
        self.with_latest(move |sink| sink.error(description));
    }

    /// Close the latest connection from the server side.
    pub fn drop_connection(&self, code: u16, reason: impl Into<String>) {
        let reason = reason.into();
        let sink = {
            let mut state = self.lock();
            state.connections.last_mut().and_then(|c| {
                if c.finished {
                    None
                } else {
                    c.finished = true;
                    Some(c.sink.clone())
                }
            })
        };
        if let Some(sink) = sink {
            sink.closed(code, reason);
        }
    }

    /// Acknowledge a pending close request on the latest connection.
    ///
    /// Reports the requested code back, like a peer echoing a close frame.
    /// Does nothing when no close was requested.
    pub fn finish_close(&self) {
        let pending = {
            let mut state = self.lock();
            state.connections.last_mut().and_then(|c| {
                if c.finished {
                    return None;
                }
                let (code, reason) = c.close_request.clone()?;
                c.finished = true;
                Some((c.sink.clone(), code, reason))
            })
        };
        if let Some((sink, code, reason)) = pending {
            sink.closed(code, reason);
        }
    }

    /// Connection id of the latest transport.
    pub fn latest_connection(&self) -> Option<ConnectionId> {
        self.lock().connections.last().map(|c| c.sink.connection())
    }

    /// Sink of an earlier connection, for replaying late events.
    pub fn sink_for(&self, connection: ConnectionId) -> Option<EventSink> {
        self.lock()
            .connections
            .iter()
            .find(|c| c.sink.connection() == connection)
            .map(|c| c.sink.clone())
    }

    // Events are emitted outside the lock so the sink may call back in.
    fn with_latest(&self, f: impl FnOnce(&EventSink)) {
        let sink = self.lock().connections.last().map(|c| c.sink.clone());
        if let Some(sink) = sink {
            f(&sink);
        }
    }
}

impl Connector for MemoryConnector {
    type Transport = MemoryTransport;

    fn open(&mut self, endpoint: &Endpoint, events: EventSink) -> Result<MemoryTransport> {
        let mut state = self.lock();
        if state.refuse_next > 0 {
            state.refuse_next -= 1;
            state.construction_failures += 1;
            return Err(TransportError::Open {
                endpoint: endpoint.to_string(),
                reason: "connection refused".to_string(),
            });
        }

        state.connections.push(MemoryConnection {
            sink: events,
            endpoint: endpoint.to_string(),
            sent: Vec::new(),
            close_request: None,
            finished: false,
        });
        tracing::trace!(endpoint = %endpoint, "memory transport opened");

        Ok(MemoryTransport {
            index: state.connections.len() - 1,
            state: self.state.clone(),
        })
    }
}

impl MemoryTransport {
    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Transport for MemoryTransport {
    fn send_text(&mut self, text: String) -> Result<()> {
        let mut state = self.lock();
        let conn = state
            .connections
            .get_mut(self.index)
            .ok_or(TransportError::Closed)?;
        if conn.finished || conn.close_request.is_some() {
            return Err(TransportError::Closed);
        }
        conn.sent.push(text);
        Ok(())
    }

    fn close(&mut self, code: u16, reason: &str) -> Result<()> {
        let mut state = self.lock();
        let conn = state
            .connections
            .get_mut(self.index)
            .ok_or(TransportError::Closed)?;
        if conn.close_request.is_none() {
            conn.close_request = Some((code, reason.to_string()));
        }
        Ok(())
    }
}
