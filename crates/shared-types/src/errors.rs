//! # Error Types
//!
//! Wire-level errors and the result codes attached to error outputs.

use thiserror::Error;

/// Result codes carried in the `code` field of error outputs.
pub mod codes {
    /// The remote method reported an error.
    pub const REMOTE_ERROR: u16 = 400;
    /// Reply had no `id` field.
    pub const ID_MISSING: u16 = 406;
    /// No reply within the configured timeout.
    pub const TIMEOUT: u16 = 408;
    /// Reply for an id with no pending request.
    pub const UNKNOWN_ID: u16 = 412;
    /// Transport disconnected while the request was pending.
    pub const TRANSPORT_INACTIVE: u16 = 503;
}

/// Errors decoding or encoding wire payloads.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WireError {
    /// Payload is not valid JSON.
    #[error("malformed payload: {0}")]
    Decode(String),

    /// Payload is JSON but not an object.
    #[error("malformed payload: expected a JSON object")]
    NotAnObject,

    /// Request could not be serialized.
    #[error("failed to encode request: {0}")]
    Encode(String),
}
