use serde_json::Value;

use crate::error::{CodecError, Result};
use crate::message::ChannelMessage;

/// Default maximum inbound frame length: 1 MiB.
pub const DEFAULT_MAX_FRAME_LEN: usize = 1024 * 1024;

/// Encode a message into a single text frame.
pub fn encode_message(message: &ChannelMessage) -> Result<String> {
    serde_json::to_string(message).map_err(CodecError::Encode)
}

/// Decode a text frame.
///
/// The frame must be a JSON object no longer than `max_len` bytes with a string
/// `kind` field; every other field becomes payload.
pub fn decode_message(text: &str, max_len: usize) -> Result<ChannelMessage> {
    if text.len() > max_len {
        return Err(CodecError::FrameTooLarge {
            size: text.len(),
            max: max_len,
        });
    }

    match serde_json::from_str::<Value>(text).map_err(CodecError::InvalidJson)? {
        Value::Object(object) => ChannelMessage::from_object(object),
        _ => Err(CodecError::NotAnObject),
    }
}

/// Decode a text frame on the receive path.
///
/// Never fails: an undecodable frame becomes an `error` message with
/// `parseError: true`, returned together with the failure so callers can
/// record it.
pub fn decode_or_error(text: &str, max_len: usize) -> (ChannelMessage, Option<CodecError>) {
    match decode_message(text, max_len) {
        Ok(message) => (message, None),
        Err(err) => {
            tracing::warn!(error = %err, size = text.len(), "inbound frame failed to decode");
            (undecodable_message(text, &err), Some(err))
        }
    }
}

// Oversized frames carry a size description instead of their content.
fn undecodable_message(text: &str, err: &CodecError) -> ChannelMessage {
    match err {
        CodecError::FrameTooLarge { .. } => ChannelMessage::parse_error(err.to_string()),
        _ => ChannelMessage::parse_error(text),
    }
}
