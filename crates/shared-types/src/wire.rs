//! # Wire Formats
//!
//! JSON request/reply shapes exchanged with the device firmware.
//!
//! ```text
//! request:  {"src": "<reply source>", "id": 1, "method": "Temp.Read", "args": {}}
//! reply:    {"id": 1, "result": ...}   or   {"id": 1, "error": ...}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::correlation::CorrelationId;
use crate::errors::WireError;

/// Request frame published to the request topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireRequest {
    /// Reply routing prefix; the device answers on `<src>/rpc`.
    pub src: String,
    pub id: CorrelationId,
    /// Full method name, `<service>.<Method>`.
    pub method: String,
    pub args: Value,
}

impl WireRequest {
    /// Encode as UTF-8 JSON.
    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        serde_json::to_vec(self).map_err(|e| WireError::Encode(e.to_string()))
    }
}

/// The `id` field of a reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyId {
    /// A well-formed correlation id.
    Id(CorrelationId),
    /// Present but not a valid id; can never match a pending entry.
    Invalid(Value),
}

/// Outcome carried by a reply: exactly one of `result` / `error`.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyBody {
    Result(Value),
    Error(Value),
}

/// Classification of a decoded reply payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedReply {
    /// No `id` field at all.
    MissingId,
    /// Has an id but carries neither or both of `result` / `error`.
    Malformed { id: ReplyId, reason: &'static str },
    /// Well-formed reply.
    Reply { id: ReplyId, body: ReplyBody },
}

/// Decode any JSON payload (broadcast updates, heartbeats).
pub fn decode_json(raw: &[u8]) -> Result<Value, WireError> {
    serde_json::from_slice(raw).map_err(|e| WireError::Decode(e.to_string()))
}

/// Decode and classify a reply payload.
///
/// Fails only when the bytes are not a JSON object; every other shape is
/// classified so the caller can report it.
pub fn decode_reply(raw: &[u8]) -> Result<ParsedReply, WireError> {
    let value = decode_json(raw)?;
    let Value::Object(mut obj) = value else {
        return Err(WireError::NotAnObject);
    };
    Ok(classify_reply(&mut obj))
}

fn classify_reply(obj: &mut Map<String, Value>) -> ParsedReply {
    let Some(raw_id) = obj.remove("id") else {
        return ParsedReply::MissingId;
    };
    let id = match CorrelationId::from_json(&raw_id) {
        Some(id) => ReplyId::Id(id),
        None => ReplyId::Invalid(raw_id),
    };

    match (obj.remove("result"), obj.remove("error")) {
        (Some(result), None) => ParsedReply::Reply {
            id,
            body: ReplyBody::Result(result),
        },
        (None, Some(error)) => ParsedReply::Reply {
            id,
            body: ReplyBody::Error(error),
        },
        (Some(_), Some(_)) => ParsedReply::Malformed {
            id,
            reason: "both result and error present",
        },
        (None, None) => ParsedReply::Malformed {
            id,
            reason: "neither result nor error present",
        },
    }
}
