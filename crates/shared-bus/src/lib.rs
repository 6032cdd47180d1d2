//! # Shared Bus - Transport Facade
//!
//! The single shared publish/subscribe connection used by every RPC
//! correlation engine and liveness monitor of a bridge client.
//!
//! ```text
//! ┌──────────────┐   publish()     ┌──────────────┐   subscribe()   ┌──────────────┐
//! │  RPC engine  │ ──────────────▶ │  Transport   │ ◀────────────── │   Liveness   │
//! │  (service)   │ ◀────────────── │  (broker)    │ ──────────────▶ │   monitor    │
//! └──────────────┘   replies       └──────────────┘   heartbeats    └──────────────┘
//! ```
//!
//! Topic filters follow MQTT wildcard rules (`+`, `#`).

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod clock;
pub mod message;
pub mod publisher;
pub mod subscriber;
pub mod topic_filter;

pub use clock::TokioClock;
pub use message::{QoS, TransportError, TransportMessage};
pub use publisher::{InMemoryBroker, MessageTransport};
pub use subscriber::{MessageStream, Subscription, SubscriptionError, SubscriptionRegistry};
pub use topic_filter::{FilterError, TopicFilter};

/// Maximum messages buffered per subscriber before it lags.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_capacity() {
        assert_eq!(DEFAULT_CHANNEL_CAPACITY, 1000);
    }
}
