//! Realtime transport abstraction.
//!
//! Provides a unified interface over the socket a channel runs on:
//! - WebSocket via tokio-tungstenite (`async` feature)
//! - An in-process memory transport for tests and demos
//!
//! This is the lowest layer of signo. A transport reports its lifecycle only
//! through the [`EventSink`] it was opened with; everything above builds on the
//! [`Connector`] and [`Transport`] traits provided here.

pub mod endpoint;
pub mod error;
pub mod memory;
pub mod traits;

#[cfg(feature = "async")]
pub mod ws;

pub use endpoint::{Endpoint, DEFAULT_CHANNEL_PATH};
pub use error::{Result, TransportError};
pub use memory::{MemoryConnector, MemoryTransport};
pub use traits::{
    is_normal_closure, ConnectionId, Connector, EventSink, Transport, TransportEvent,
    ABNORMAL_CLOSURE, GOING_AWAY, NORMAL_CLOSURE, NO_STATUS,
};

#[cfg(feature = "async")]
pub use ws::{WsConfig, WsConnector, WsTransport};
