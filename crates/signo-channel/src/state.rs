use std::fmt;

/// Lifecycle state of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// Created, never connected.
    Idle,
    /// A transport is being opened.
    Connecting,
    /// The transport is open; sends are accepted.
    Open,
    /// A graceful shutdown was requested and is in flight.
    Closing,
    /// Terminal until a caller invokes `connect` again.
    Closed,
    /// Connectivity was lost; the reconnect policy decides what happens next.
    Faulted,
}

impl ConnectionState {
    /// Status badge vocabulary: `connecting | open | closing | closed | error`.
    pub fn badge(self) -> &'static str {
        match self {
            ConnectionState::Idle | ConnectionState::Closed => "closed",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closing => "closing",
            ConnectionState::Faulted => "error",
        }
    }

    /// True while a transport is being opened or is open.
    pub fn is_active(self) -> bool {
        matches!(self, ConnectionState::Connecting | ConnectionState::Open)
    }

    /// True once no further transitions happen without a manual `connect`.
    pub fn is_terminal(self) -> bool {
        self == ConnectionState::Closed
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closing => "closing",
            ConnectionState::Closed => "closed",
            ConnectionState::Faulted => "faulted",
        };
        f.write_str(name)
    }
}
