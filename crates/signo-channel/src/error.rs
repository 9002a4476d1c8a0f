use signo_frame::CodecError;
use signo_transport::TransportError;

use crate::state::ConnectionState;

/// Failure kinds observed by a channel manager.
///
/// These are recorded and logged, never raised across the public API; see
/// [`ChannelManager::last_error`](crate::ChannelManager::last_error).
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// The transport could not be created (bad endpoint, refused, no runtime).
    #[error("transport construction failed: {0}")]
    TransportConstruction(#[source] TransportError),

    /// A connecting or open transport reported an error.
    #[error("transport error: {0}")]
    TransportRuntime(String),

    /// The transport closed without a normal-closure code.
    #[error("abnormal closure (code {code}): {reason}")]
    AbnormalClosure { code: u16, reason: String },

    /// The transport closed intentionally.
    #[error("normal closure: {reason}")]
    NormalClosure { reason: String },

    /// An inbound frame could not be decoded.
    #[error("decode failed: {0}")]
    Decode(#[from] CodecError),

    /// A send was attempted outside the `Open` state; the message was dropped.
    #[error("not connected (state: {0})")]
    NotConnected(ConnectionState),

    /// The reconnect attempt budget ran out.
    #[error("reconnect budget exhausted after {0} attempts")]
    RetryBudgetExhausted(u32),

    /// The transport refused an outbound frame.
    #[error("send failed: {0}")]
    Send(#[source] TransportError),

    /// An outbound message could not be encoded.
    #[error("encode failed: {0}")]
    Encode(#[source] CodecError),

    /// Configuration values are out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The manager has been torn down.
    #[error("channel manager shut down")]
    Shutdown,
}

impl ChannelError {
    /// True for failures that put the channel into `Faulted`.
    pub fn is_connectivity_loss(&self) -> bool {
        matches!(
            self,
            ChannelError::TransportConstruction(_)
                | ChannelError::TransportRuntime(_)
                | ChannelError::AbnormalClosure { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ChannelError>;
