//! # Subscriptions
//!
//! The receiving side of a transport. A `Subscription` yields the messages
//! whose topic matches its filter until it is dropped or its subscriber is
//! unsubscribed as a whole.

use crate::message::TransportMessage;
use crate::topic_filter::TopicFilter;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tokio_stream::Stream;
use tracing::debug;

/// Errors from non-blocking receive.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The transport was dropped or the subscription was cancelled.
    #[error("Subscription closed")]
    Closed,
}

struct RegistryEntry {
    subscriber_id: String,
    filter: String,
    cancel: watch::Sender<bool>,
}

/// Book-keeping of live subscriptions, shared between a transport and the
/// subscriptions it handed out.
#[derive(Default)]
pub struct SubscriptionRegistry {
    entries: RwLock<HashMap<u64, RegistryEntry>>,
    next_key: AtomicU64,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self, subscriber_id: &str, filter: &str) -> (u64, watch::Receiver<bool>) {
        let key = self.next_key.fetch_add(1, Ordering::Relaxed);
        let (cancel, cancelled) = watch::channel(false);
        self.entries.write().insert(
            key,
            RegistryEntry {
                subscriber_id: subscriber_id.to_string(),
                filter: filter.to_string(),
                cancel,
            },
        );
        (key, cancelled)
    }

    fn release(&self, key: u64) {
        self.entries.write().remove(&key);
    }

    /// Cancel every subscription held by `subscriber_id`. Returns how many
    /// were removed.
    pub fn unsubscribe_all(&self, subscriber_id: &str) -> usize {
        let mut entries = self.entries.write();
        let keys: Vec<u64> = entries
            .iter()
            .filter(|(_, e)| e.subscriber_id == subscriber_id)
            .map(|(k, _)| *k)
            .collect();
        for key in &keys {
            if let Some(entry) = entries.remove(key) {
                let _ = entry.cancel.send(true);
                debug!(subscriber = %subscriber_id, filter = %entry.filter, "Subscription cancelled");
            }
        }
        keys.len()
    }

    /// Number of live subscriptions.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Filters currently held by `subscriber_id`.
    pub fn filters_of(&self, subscriber_id: &str) -> Vec<String> {
        let mut filters: Vec<String> = self
            .entries
            .read()
            .values()
            .filter(|e| e.subscriber_id == subscriber_id)
            .map(|e| e.filter.clone())
            .collect();
        filters.sort();
        filters
    }
}

/// A subscription handle for receiving messages.
///
/// When dropped, the subscription is automatically released.
pub struct Subscription {
    receiver: broadcast::Receiver<TransportMessage>,
    filter: TopicFilter,
    cancelled: watch::Receiver<bool>,
    registry: Arc<SubscriptionRegistry>,
    key: u64,
}

impl Subscription {
    /// Register a new subscription with `registry` and wrap `receiver`.
    pub fn new(
        receiver: broadcast::Receiver<TransportMessage>,
        filter: TopicFilter,
        subscriber_id: &str,
        registry: Arc<SubscriptionRegistry>,
    ) -> Self {
        let (key, cancelled) = registry.register(subscriber_id, filter.as_str());
        Self {
            receiver,
            filter,
            cancelled,
            registry,
            key,
        }
    }

    fn is_cancelled(&self) -> bool {
        *self.cancelled.borrow()
    }

    /// Receive the next message that matches the filter.
    ///
    /// Returns `None` once the transport is dropped or the subscription is
    /// cancelled.
    pub async fn recv(&mut self) -> Option<TransportMessage> {
        loop {
            if self.is_cancelled() {
                return None;
            }

            let msg = tokio::select! {
                biased;
                changed = self.cancelled.changed() => {
                    if changed.is_err() {
                        return None;
                    }
                    continue;
                }
                msg = self.receiver.recv() => msg,
            };

            let msg = match msg {
                Ok(m) => m,
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    debug!(lagged = count, filter = %self.filter.as_str(), "Subscriber lagged, some messages dropped");
                    continue;
                }
            };

            if self.filter.matches(&msg.topic) {
                return Some(msg);
            }
        }
    }

    /// Try to receive the next matching message without blocking.
    pub fn try_recv(&mut self) -> Result<Option<TransportMessage>, SubscriptionError> {
        loop {
            if self.is_cancelled() {
                return Err(SubscriptionError::Closed);
            }
            let msg = match self.receiver.try_recv() {
                Ok(m) => m,
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(SubscriptionError::Closed)
                }
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            };

            if self.filter.matches(&msg.topic) {
                return Ok(Some(msg));
            }
        }
    }

    #[must_use]
    pub fn filter(&self) -> &TopicFilter {
        &self.filter
    }

    /// Convert into a `Stream` of matching messages.
    pub fn into_stream(self) -> MessageStream {
        MessageStream::new(self)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.registry.release(self.key);
        debug!(filter = %self.filter.as_str(), "Subscription dropped");
    }
}

type RecvFuture = Pin<Box<dyn Future<Output = (Option<TransportMessage>, Subscription)> + Send>>;

async fn next_message(mut subscription: Subscription) -> (Option<TransportMessage>, Subscription) {
    let msg = subscription.recv().await;
    (msg, subscription)
}

/// Stream adapter over a subscription.
pub struct MessageStream {
    pending: Option<RecvFuture>,
}

impl MessageStream {
    #[must_use]
    pub fn new(subscription: Subscription) -> Self {
        Self {
            pending: Some(Box::pin(next_message(subscription))),
        }
    }
}

impl Stream for MessageStream {
    type Item = TransportMessage;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let Some(fut) = self.pending.as_mut() else {
            return Poll::Ready(None);
        };

        match fut.as_mut().poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready((Some(msg), subscription)) => {
                self.pending = Some(Box::pin(next_message(subscription)));
                Poll::Ready(Some(msg))
            }
            Poll::Ready((None, _)) => {
                self.pending = None;
                Poll::Ready(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::QoS;
    use crate::publisher::{InMemoryBroker, MessageTransport};
    use std::time::Duration;
    use tokio::time::timeout;
    use tokio_stream::StreamExt;

    #[tokio::test]
    async fn test_subscription_recv_filters_topics() {
        let broker = InMemoryBroker::new();
        let mut sub = broker
            .subscribe("n1_dev_Temp/rpc", QoS::AtMostOnce, "engine")
            .unwrap();

        broker
            .publish("n1_dev_Relay/rpc", b"other".to_vec(), QoS::AtMostOnce, false)
            .unwrap();
        broker
            .publish("n1_dev_Temp/rpc", b"mine".to_vec(), QoS::AtMostOnce, false)
            .unwrap();

        let msg = timeout(Duration::from_millis(100), sub.recv())
            .await
            .expect("timeout")
            .expect("closed");
        assert_eq!(msg.payload, b"mine");
    }

    #[tokio::test]
    async fn test_try_recv_empty() {
        let broker = InMemoryBroker::new();
        let mut sub = broker.subscribe("#", QoS::AtMostOnce, "tap").unwrap();
        assert_eq!(sub.try_recv(), Ok(None));
    }

    #[tokio::test]
    async fn test_drop_releases_registration() {
        let broker = InMemoryBroker::new();
        {
            let _sub = broker.subscribe("a/b", QoS::AtMostOnce, "x").unwrap();
            assert_eq!(broker.registry().len(), 1);
        }
        assert!(broker.registry().is_empty());
    }

    #[tokio::test]
    async fn test_unsubscribe_all_ends_recv() {
        let broker = InMemoryBroker::new();
        let mut a = broker.subscribe("a/#", QoS::AtMostOnce, "client").unwrap();
        let mut b = broker.subscribe("b/#", QoS::AtMostOnce, "client").unwrap();
        let _other = broker.subscribe("c/#", QoS::AtMostOnce, "other").unwrap();

        assert_eq!(broker.unsubscribe_all("client"), 2);
        assert!(a.recv().await.is_none());
        assert_eq!(b.try_recv(), Err(SubscriptionError::Closed));
        assert_eq!(broker.registry().filters_of("other"), vec!["c/#".to_string()]);
    }

    #[tokio::test]
    async fn test_message_stream() {
        let broker = InMemoryBroker::new();
        let mut stream = broker
            .subscribe("dev/rpc/#", QoS::AtMostOnce, "sim")
            .unwrap()
            .into_stream();

        broker
            .publish("dev/rpc/Temp.Read", b"1".to_vec(), QoS::AtMostOnce, false)
            .unwrap();
        broker
            .publish("dev/rpc/Temp.Write", b"2".to_vec(), QoS::AtMostOnce, false)
            .unwrap();

        let first = timeout(Duration::from_millis(100), stream.next())
            .await
            .unwrap()
            .unwrap();
        let second = timeout(Duration::from_millis(100), stream.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.topic, "dev/rpc/Temp.Read");
        assert_eq!(second.topic, "dev/rpc/Temp.Write");
    }

    #[tokio::test]
    async fn test_stream_ends_when_cancelled() {
        let broker = InMemoryBroker::new();
        let mut stream = broker
            .subscribe("x", QoS::AtMostOnce, "gone")
            .unwrap()
            .into_stream();
        broker.unsubscribe_all("gone");
        let next = timeout(Duration::from_millis(100), stream.next())
            .await
            .unwrap();
        assert!(next.is_none());
    }
}
