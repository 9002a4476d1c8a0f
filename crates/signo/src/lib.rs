//! Reconnecting realtime channels for SIGNO Connect.
//!
//! A channel is one logical, long-lived WebSocket conversation with the
//! SIGNO server. It reconnects with bounded exponential backoff after
//! connectivity loss, fans decoded JSON messages out to subscribers and never
//! fails across its public API.
//!
//! # Crate Structure
//!
//! - [`transport`]: endpoint resolution and the socket abstraction (WebSocket behind `async`)
//! - [`frame`]: the JSON text-frame codec and well-known message kinds
//! - [`channel`]: the reconnecting channel manager and its async driver

/// Re-export transport types.
pub mod transport {
    pub use signo_transport::*;
}

/// Re-export codec types.
pub mod frame {
    pub use signo_frame::*;
}

/// Re-export channel manager types.
pub mod channel {
    pub use signo_channel::*;
}

pub use signo_channel::{ChannelConfig, ChannelManager, ConnectionState};
pub use signo_frame::ChannelMessage;
pub use signo_transport::Endpoint;
