//! # Transport Messages
//!
//! The unit of traffic carried by a transport, plus its delivery options and
//! errors.

use crate::topic_filter::FilterError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// MQTT quality-of-service level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum QoS {
    #[default]
    AtMostOnce,
    AtLeastOnce,
    ExactlyOnce,
}

impl QoS {
    pub fn level(&self) -> u8 {
        match self {
            QoS::AtMostOnce => 0,
            QoS::AtLeastOnce => 1,
            QoS::ExactlyOnce => 2,
        }
    }
}

impl TryFrom<u8> for QoS {
    type Error = TransportError;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        match level {
            0 => Ok(QoS::AtMostOnce),
            1 => Ok(QoS::AtLeastOnce),
            2 => Ok(QoS::ExactlyOnce),
            other => Err(TransportError::InvalidQoS(other)),
        }
    }
}

/// A message as seen on the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QoS,
    pub retain: bool,
}

impl TransportMessage {
    pub fn new(topic: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            topic: topic.into(),
            payload,
            qos: QoS::default(),
            retain: false,
        }
    }

    /// Payload as UTF-8, lossy.
    pub fn payload_str(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

/// Errors from transport operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The shared connection is down.
    #[error("Transport not connected")]
    NotConnected,

    /// The transport has shut down.
    #[error("Transport closed")]
    Closed,

    /// Publish topic is empty or contains wildcards.
    #[error("Invalid publish topic: {0}")]
    InvalidTopic(String),

    /// Subscription filter rejected.
    #[error("Invalid subscription filter: {0}")]
    InvalidFilter(#[from] FilterError),

    #[error("Invalid QoS level: {0}")]
    InvalidQoS(u8),
}

/// Validate a concrete publish topic.
pub(crate) fn validate_publish_topic(topic: &str) -> Result<(), TransportError> {
    if topic.is_empty() || topic.contains(['+', '#']) {
        return Err(TransportError::InvalidTopic(topic.to_string()));
    }
    Ok(())
}
