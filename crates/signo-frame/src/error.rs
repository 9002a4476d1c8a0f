/// Errors that can occur while encoding or decoding channel messages.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The frame exceeds the configured maximum length.
    #[error("frame too large ({size} bytes, max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// The frame is not valid JSON.
    #[error("invalid json: {0}")]
    InvalidJson(#[source] serde_json::Error),

    /// The frame is JSON but not an object.
    #[error("frame is not a json object")]
    NotAnObject,

    /// The object has no string `kind` field.
    #[error("frame has no string 'kind' field")]
    MissingKind,

    /// The message could not be serialized.
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CodecError>;
