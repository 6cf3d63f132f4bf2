//! Envelope (JSON) exchanged across the channel.
//!
//! Wire shape: `{"type": "<discriminator>", "payload": <any>}`. Requests,
//! responses and events share it; errors use the fixed type `"error"` with an
//! [`ErrorPayload`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ErrorCode, MsgBridgeError, Result};

/// Discriminator of error envelopes.
pub const ERROR_TYPE: &str = "error";

/// A message crossing the channel. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    msg_type: String,
    #[serde(default)]
    payload: Value,
}

impl Envelope {
    pub fn new(msg_type: impl Into<String>, payload: Value) -> Self {
        Self {
            msg_type: msg_type.into(),
            payload,
        }
    }

    /// Envelope with a null payload.
    pub fn bare(msg_type: impl Into<String>) -> Self {
        Self::new(msg_type, Value::Null)
    }

    pub fn msg_type(&self) -> &str {
        &self.msg_type
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn into_payload(self) -> Value {
        self.payload
    }

    pub fn is_error(&self) -> bool {
        self.msg_type == ERROR_TYPE
    }

    /// Typed view of an error envelope's payload. `None` for non-error envelopes
    /// or a payload that does not match the error shape.
    pub fn error_payload(&self) -> Option<ErrorPayload> {
        if !self.is_error() {
            return None;
        }
        serde_json::from_value(self.payload.clone()).ok()
    }

    /// Serialize to a JSON value for the channel.
    pub fn to_value(&self) -> Value {
        let mut map = Map::with_capacity(2);
        map.insert("type".into(), Value::String(self.msg_type.clone()));
        map.insert("payload".into(), self.payload.clone());
        Value::Object(map)
    }
}

/// Payload of an `error` envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: ErrorCode,
    pub message: String,
    /// Type of the request that triggered the error; absent for errors not
    /// tied to a request.
    #[serde(
        rename = "requestType",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub request_type: Option<String>,
}

/// Build an error envelope.
pub fn create_error_response(
    code: ErrorCode,
    message: impl Into<String>,
    request_type: Option<&str>,
) -> Envelope {
    let payload = ErrorPayload {
        code,
        message: message.into(),
        request_type: request_type.map(str::to_owned),
    };
    // ErrorPayload only holds strings and a unit enum; serialization cannot fail.
    let payload = serde_json::to_value(payload).unwrap_or(Value::Null);
    Envelope::new(ERROR_TYPE, payload)
}

/// Validate an inbound value at the channel boundary.
///
/// Rules:
/// - must be a JSON object with a non-empty string `type`
/// - an explicit `payload` field is taken as-is
/// - otherwise every remaining field becomes an object payload
///   (`{"type":"t","limit":5}` carries payload `{"limit":5}`)
pub fn decode_envelope(value: Value) -> Result<Envelope> {
    let mut map = match value {
        Value::Object(map) => map,
        other => {
            return Err(MsgBridgeError::BadEnvelope(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            )))
        }
    };

    let msg_type = match map.remove("type") {
        Some(Value::String(s)) if !s.is_empty() => s,
        Some(Value::String(_)) => {
            return Err(MsgBridgeError::BadEnvelope("`type` must not be empty".into()))
        }
        Some(other) => {
            return Err(MsgBridgeError::BadEnvelope(format!(
                "`type` must be a string, got {}",
                json_kind(&other)
            )))
        }
        None => return Err(MsgBridgeError::BadEnvelope("missing `type` field".into())),
    };

    let payload = match map.remove("payload") {
        Some(p) => {
            if !map.is_empty() {
                tracing::trace!(
                    msg_type = %msg_type,
                    extra = map.len(),
                    "ignoring fields next to explicit payload"
                );
            }
            p
        }
        None if map.is_empty() => Value::Null,
        None => Value::Object(map),
    };

    Ok(Envelope { msg_type, payload })
}

/// Best-effort `type` of a value that failed validation, for error correlation.
pub fn peek_type(value: &Value) -> Option<&str> {
    value
        .get("type")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
