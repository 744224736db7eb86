use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::error::ServiceError;
use crate::facade::AccessKeyResponse;

/// Latest known outcome of the initial access-key check.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AccessKeyStatus {
    #[default]
    Absent,
    Available(AccessKeyResponse),
    Failed(ServiceError),
}

impl AccessKeyStatus {
    pub fn is_absent(&self) -> bool {
        matches!(self, AccessKeyStatus::Absent)
    }
}

impl From<Result<AccessKeyResponse, ServiceError>> for AccessKeyStatus {
    fn from(outcome: Result<AccessKeyResponse, ServiceError>) -> Self {
        match outcome {
            Ok(response) => AccessKeyStatus::Available(response),
            Err(error) => AccessKeyStatus::Failed(error),
        }
    }
}

struct Registry {
    current: AccessKeyStatus,
    subscribers: Vec<mpsc::UnboundedSender<AccessKeyStatus>>,
}

/// Replay-of-one broadcast of [`AccessKeyStatus`].
///
/// Each subscriber gets its own unbounded queue, seeded with the value that
/// was current when it subscribed, followed by every later publish in order.
pub struct StatusBroadcaster {
    inner: Mutex<Registry>,
}

impl Default for StatusBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusBroadcaster {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Registry {
                current: AccessKeyStatus::Absent,
                subscribers: Vec::new(),
            }),
        }
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn subscribe(&self) -> StatusSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut registry = self.registry();
        // rx is still held here, so the seed send cannot fail
        let _ = tx.send(registry.current.clone());
        registry.subscribers.push(tx);
        StatusSubscription { rx }
    }

    /// Replaces the current value and delivers it to every live subscriber.
    pub fn publish(&self, status: AccessKeyStatus) {
        let mut registry = self.registry();
        registry
            .subscribers
            .retain(|subscriber| subscriber.send(status.clone()).is_ok());
        registry.current = status;
    }

    pub fn latest(&self) -> AccessKeyStatus {
        self.registry().current.clone()
    }

    /// Number of subscribers still attached. Closed subscriptions are pruned
    /// before counting.
    pub fn subscriber_count(&self) -> usize {
        let mut registry = self.registry();
        registry.subscribers.retain(|subscriber| !subscriber.is_closed());
        registry.subscribers.len()
    }
}

/// Receiving half handed out by [`StatusBroadcaster::subscribe`].
#[derive(Debug)]
pub struct StatusSubscription {
    rx: mpsc::UnboundedReceiver<AccessKeyStatus>,
}

impl StatusSubscription {
    /// Waits for the next value. Returns `None` once the broadcaster is gone
    /// and the queue is drained.
    pub async fn recv(&mut self) -> Option<AccessKeyStatus> {
        self.rx.recv().await
    }

    /// Returns the next queued value without waiting.
    pub fn try_recv(&mut self) -> Option<AccessKeyStatus> {
        match self.rx.try_recv() {
            Ok(status) => Some(status),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    pub fn into_stream(self) -> UnboundedReceiverStream<AccessKeyStatus> {
        UnboundedReceiverStream::new(self.rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use serde_json::json;

    fn available(body: serde_json::Value) -> AccessKeyStatus {
        AccessKeyStatus::Available(AccessKeyResponse::ok(body))
    }

    #[test]
    fn new_subscriber_sees_absent_first() {
        let broadcaster = StatusBroadcaster::new();
        let mut sub = broadcaster.subscribe();
        assert_eq!(sub.try_recv(), Some(AccessKeyStatus::Absent));
        assert_eq!(sub.try_recv(), None);
    }

    #[test]
    fn late_subscriber_gets_only_the_latest_value() {
        let broadcaster = StatusBroadcaster::new();
        broadcaster.publish(available(json!({"n": 1})));
        broadcaster.publish(available(json!({"n": 2})));

        let mut sub = broadcaster.subscribe();
        assert_eq!(sub.try_recv(), Some(available(json!({"n": 2}))));
        assert_eq!(sub.try_recv(), None);
    }

    #[test]
    fn slow_subscriber_keeps_every_value_in_order() {
        let broadcaster = StatusBroadcaster::new();
        let mut sub = broadcaster.subscribe();
        for n in 0..100 {
            broadcaster.publish(available(json!({ "n": n })));
        }

        assert_eq!(sub.try_recv(), Some(AccessKeyStatus::Absent));
        for n in 0..100 {
            assert_eq!(sub.try_recv(), Some(available(json!({ "n": n }))));
        }
        assert_eq!(sub.try_recv(), None);
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let broadcaster = StatusBroadcaster::new();
        let keep = broadcaster.subscribe();
        let gone = broadcaster.subscribe();
        assert_eq!(broadcaster.subscriber_count(), 2);

        drop(gone);
        broadcaster.publish(AccessKeyStatus::Absent);
        assert_eq!(broadcaster.subscriber_count(), 1);
        drop(keep);
        assert_eq!(broadcaster.subscriber_count(), 0);
    }

    #[test]
    fn counting_prunes_closed_subscriptions_without_a_publish() {
        let broadcaster = StatusBroadcaster::new();
        let _keep = broadcaster.subscribe();
        drop(broadcaster.subscribe());
        assert_eq!(broadcaster.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn stream_ends_when_broadcaster_is_dropped() {
        let broadcaster = StatusBroadcaster::new();
        let stream = broadcaster.subscribe().into_stream();
        broadcaster.publish(AccessKeyStatus::Failed(ServiceError::new(
            Some(500),
            "SERVICE_ERROR",
            "boom",
        )));
        drop(broadcaster);

        let seen: Vec<AccessKeyStatus> = stream.collect().await;
        assert_eq!(seen.len(), 2);
        assert!(seen[0].is_absent());
        assert!(matches!(&seen[1], AccessKeyStatus::Failed(err) if err.code == "SERVICE_ERROR"));
    }

    #[test]
    fn status_serializes_with_state_tag() {
        let value = serde_json::to_value(available(json!({"valid": true}))).unwrap();
        assert_eq!(
            value,
            json!({"state": "available", "status": 200, "body": {"valid": true}})
        );
        let value = serde_json::to_value(AccessKeyStatus::Absent).unwrap();
        assert_eq!(value, json!({"state": "absent"}));
    }
}
