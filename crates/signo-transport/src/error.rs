/// Errors that can occur in transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The endpoint could not be parsed or uses an unsupported scheme.
    #[error("invalid endpoint {endpoint}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    /// The transport could not be created for the endpoint.
    #[error("failed to open transport to {endpoint}: {reason}")]
    Open { endpoint: String, reason: String },

    /// No async runtime is available to drive the transport.
    #[error("no async runtime available to drive the transport")]
    NoRuntime,

    /// The transport has already been closed or its driver has exited.
    #[error("transport closed")]
    Closed,

    /// A frame could not be handed to the transport.
    #[error("transport send failed: {0}")]
    Send(String),
}

pub type Result<T> = std::result::Result<T, TransportError>;
