//! JSON text-frame codec for channel messages.
//!
//! Every message travels as one self-contained text frame:
//! a JSON object whose `kind` field tags the message and whose remaining
//! fields form a free-form payload.
//!
//! Decoding on the receive path never fails. A frame that cannot be decoded is
//! turned into a well-formed `error` message carrying the raw text.

pub mod codec;
pub mod error;
pub mod kind;
pub mod message;

pub use codec::{
    decode_message, decode_or_error, encode_message, DEFAULT_MAX_FRAME_LEN,
};
pub use error::{CodecError, Result};
pub use kind::{
    is_recognized_kind, BROADCAST, CHAT, ERROR, PARSE_ERROR_FIELD, PING, PONG, WELCOME,
};
pub use message::ChannelMessage;
