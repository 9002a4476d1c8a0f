//! Recognized message kinds.
//!
//! The kind tag is open-ended at the transport boundary: these are the kinds the
//! server is known to send, and anything else passes through unchanged.

/// Server greeting after the connection opens.
pub const WELCOME: &str = "welcome";

/// Liveness probe sent by the client.
pub const PING: &str = "ping";

/// Liveness reply from the server.
pub const PONG: &str = "pong";

/// Chat message between drivers and fleet owners.
pub const CHAT: &str = "chat";

/// Server-wide notification.
pub const BROADCAST: &str = "broadcast";

/// Error notification, either from the server or synthesized locally.
pub const ERROR: &str = "error";

/// Payload flag set on `error` messages synthesized from undecodable frames.
pub const PARSE_ERROR_FIELD: &str = "parseError";

/// Returns true if `kind` is one of the kinds the server is known to send.
pub fn is_recognized_kind(kind: &str) -> bool {
    matches!(kind, WELCOME | PING | PONG | CHAT | BROADCAST | ERROR)
}
