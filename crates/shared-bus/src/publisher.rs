//! # Transport Facade
//!
//! The narrow publish/subscribe/is-connected contract every component sees,
//! and an in-memory broker implementing it.

use crate::message::{validate_publish_topic, QoS, TransportError, TransportMessage};
use crate::subscriber::{Subscription, SubscriptionRegistry};
use crate::topic_filter::TopicFilter;
use crate::DEFAULT_CHANNEL_CAPACITY;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Shared publish/subscribe connection.
///
/// Implementations must be safe to share across the engines of one client.
pub trait MessageTransport: Send + Sync {
    /// Publish a payload on a concrete topic.
    fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        qos: QoS,
        retain: bool,
    ) -> Result<(), TransportError>;

    /// Subscribe to a topic filter on behalf of `subscriber_id`.
    fn subscribe(
        &self,
        filter: &str,
        qos: QoS,
        subscriber_id: &str,
    ) -> Result<Subscription, TransportError>;

    /// Whether the connection is currently up.
    fn is_connected(&self) -> bool;

    /// Drop every subscription held by `subscriber_id`.
    fn unsubscribe_all(&self, subscriber_id: &str) -> usize;
}

/// In-process broker.
///
/// Uses `tokio::sync::broadcast` for fan-out; each subscription filters by
/// topic on receive. The connection flag can be toggled to simulate broker
/// outages.
pub struct InMemoryBroker {
    sender: broadcast::Sender<TransportMessage>,
    registry: Arc<SubscriptionRegistry>,
    connected: AtomicBool,
    messages_published: AtomicU64,
    capacity: usize,
}

impl InMemoryBroker {
    /// Create a connected broker with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            registry: Arc::new(SubscriptionRegistry::new()),
            connected: AtomicBool::new(true),
            messages_published: AtomicU64::new(0),
            capacity,
        }
    }

    /// Toggle the connection state.
    pub fn set_connected(&self, connected: bool) {
        let was = self.connected.swap(connected, Ordering::SeqCst);
        if was != connected {
            if connected {
                info!("Broker connection up");
            } else {
                warn!("Broker connection down");
            }
        }
    }

    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    #[must_use]
    pub fn messages_published(&self) -> u64 {
        self.messages_published.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageTransport for InMemoryBroker {
    fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        qos: QoS,
        retain: bool,
    ) -> Result<(), TransportError> {
        validate_publish_topic(topic)?;
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }

        self.messages_published.fetch_add(1, Ordering::Relaxed);
        let msg = TransportMessage {
            topic: topic.to_string(),
            payload,
            qos,
            retain,
        };

        match self.sender.send(msg) {
            Ok(receivers) => {
                debug!(topic = %topic, receivers, "Message published");
            }
            Err(_) => {
                debug!(topic = %topic, "Message dropped (no receivers)");
            }
        }
        Ok(())
    }

    fn subscribe(
        &self,
        filter: &str,
        qos: QoS,
        subscriber_id: &str,
    ) -> Result<Subscription, TransportError> {
        let filter = TopicFilter::new(filter)?;
        debug!(
            filter = %filter.as_str(),
            qos = qos.level(),
            subscriber = %subscriber_id,
            "New subscription created"
        );
        Ok(Subscription::new(
            self.sender.subscribe(),
            filter,
            subscriber_id,
            Arc::clone(&self.registry),
        ))
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn unsubscribe_all(&self, subscriber_id: &str) -> usize {
        self.registry.unsubscribe_all(subscriber_id)
    }
}
