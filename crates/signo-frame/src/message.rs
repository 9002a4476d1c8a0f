use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{CodecError, Result};
use crate::kind::{CHAT, ERROR, PARSE_ERROR_FIELD, PING};

const KIND_FIELD: &str = "kind";

/// The unit of exchange on a channel.
///
/// Serializes as one flat JSON object: `kind` followed by the payload fields.
/// The `kind` key is reserved; payload setters ignore it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelMessage {
    kind: String,
    #[serde(flatten)]
    payload: Map<String, Value>,
}

impl ChannelMessage {
    /// Create a message with an empty payload.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            payload: Map::new(),
        }
    }

    /// Create a message from a kind and an existing payload.
    pub fn with_payload(kind: impl Into<String>, mut payload: Map<String, Value>) -> Self {
        payload.remove(KIND_FIELD);
        Self {
            kind: kind.into(),
            payload,
        }
    }

    /// Build a message from a decoded JSON object.
    pub fn from_object(mut object: Map<String, Value>) -> Result<Self> {
        let kind = match object.remove(KIND_FIELD) {
            Some(Value::String(kind)) => kind,
            _ => return Err(CodecError::MissingKind),
        };
        Ok(Self {
            kind,
            payload: object,
        })
    }

    /// Liveness probe stamped with the current UTC time.
    pub fn ping() -> Self {
        Self::new(PING).with_field("timestamp", now_rfc3339())
    }

    /// Chat message with a text body.
    pub fn chat(text: impl Into<String>) -> Self {
        Self::new(CHAT).with_text(text)
    }

    /// Attach a text body and the current timestamp, the way chat messages carry them.
    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.with_field("message", text.into())
            .with_field("timestamp", now_rfc3339())
    }

    /// Local stand-in for a frame that could not be decoded.
    pub fn parse_error(raw: impl Into<String>) -> Self {
        Self::new(ERROR)
            .with_field("message", raw.into())
            .with_field(PARSE_ERROR_FIELD, true)
    }

    /// Set a payload field, replacing any previous value.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Set a payload field in place. Returns the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        if key == KIND_FIELD {
            tracing::debug!("ignoring attempt to overwrite reserved 'kind' field");
            return None;
        }
        self.payload.insert(key, value.into())
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    /// A payload field as a string, if it is one.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }

    /// True for `error` messages synthesized from undecodable frames.
    pub fn is_parse_error(&self) -> bool {
        self.kind == ERROR
            && self
                .payload
                .get(PARSE_ERROR_FIELD)
                .and_then(Value::as_bool)
                .unwrap_or(false)
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
