//! WebSocket Connection Hub
//!
//! Registry of live subscribers and the fanout of accepted batches.
//!
//! Each subscriber owns a bounded outbound queue drained by its socket task.
//! A push serialises the message once and offers the same text to every
//! registered queue with a non-blocking `try_send`, so a slow or dead viewer
//! never holds up ingestion or other viewers. A queue that is full or closed
//! costs that subscriber its registration; it must reconnect and backfill
//! over REST.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::messages::ServerMessage;

/// Unique identifier for a WebSocket connection
pub type SubscriberId = String;

/// Serialised frame as queued for a subscriber
pub type Frame = Arc<str>;

/// Lifecycle of a subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberState {
    /// Socket upgraded, not yet in the registry
    Connected,
    /// In the registry and receiving pushes
    Active,
    /// Removed from the registry; terminal
    Disconnected,
}

/// Configuration for the connection hub
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Maximum number of concurrent subscribers
    pub max_subscribers: usize,
    /// Frames a subscriber may have queued before it is dropped
    pub queue_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            max_subscribers: 1000,
            queue_capacity: 256,
        }
    }
}

/// Registry entry for one subscriber
struct SubscriberHandle {
    sender: mpsc::Sender<Frame>,
    /// Cleared on the first failed push so later pushes skip the handle
    /// before it is removed
    active: AtomicBool,
    connected_at: DateTime<Utc>,
}

/// What a newly registered subscriber gets back
pub struct Subscription {
    pub id: SubscriberId,
    /// Frames to write to the socket, in order
    pub frames: mpsc::Receiver<Frame>,
}

/// Outcome of one fanout
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Subscribers the frame was queued for
    pub delivered: usize,
    /// Subscribers dropped because their queue was full or closed
    pub dropped: usize,
}

/// Manages all live subscribers
pub struct ConnectionHub {
    /// Active subscribers: SubscriberId → handle
    subscribers: RwLock<HashMap<SubscriberId, SubscriberHandle>>,
    /// Configuration
    config: HubConfig,
}

impl ConnectionHub {
    /// Create a new connection hub
    pub fn new(config: HubConfig) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Register a new subscriber; it is `Active` once this returns
    ///
    /// Fails if the subscriber limit has been reached.
    pub async fn register(&self) -> Result<Subscription, HubError> {
        let mut subscribers = self.subscribers.write().await;
        if subscribers.len() >= self.config.max_subscribers {
            return Err(HubError::TooManyConnections(self.config.max_subscribers));
        }

        let id = Uuid::new_v4().to_string();
        let (sender, frames) = mpsc::channel(self.config.queue_capacity.max(1));
        tracing::trace!(subscriber_id = %id, state = ?SubscriberState::Connected, "Subscriber created");

        subscribers.insert(
            id.clone(),
            SubscriberHandle {
                sender,
                active: AtomicBool::new(true),
                connected_at: Utc::now(),
            },
        );

        tracing::info!(
            subscriber_id = %id,
            state = ?SubscriberState::Active,
            subscribers = subscribers.len(),
            "WebSocket connected"
        );
        Ok(Subscription { id, frames })
    }

    /// Remove a subscriber; no push reaches it after this returns
    ///
    /// Returns false if it was already gone.
    pub async fn unregister(&self, id: &str) -> bool {
        let removed = self.subscribers.write().await.remove(id);

        match removed {
            Some(handle) => {
                let connected_for = Utc::now() - handle.connected_at;
                tracing::info!(
                    subscriber_id = %id,
                    state = ?SubscriberState::Disconnected,
                    connected_secs = connected_for.num_seconds(),
                    "WebSocket disconnected"
                );
                true
            }
            None => false,
        }
    }

    /// Push one message to every active subscriber
    ///
    /// The message is serialised once. Per-subscriber failures are handled
    /// here by dropping the subscriber and never reach the caller.
    pub async fn broadcast(&self, message: &ServerMessage) -> Result<BroadcastReport, HubError> {
        let frame: Frame = serde_json::to_string(message)
            .map_err(|e| HubError::Serialization(e.to_string()))?
            .into();

        let mut report = BroadcastReport::default();
        let mut failed = Vec::new();

        {
            let subscribers = self.subscribers.read().await;
            for (id, handle) in subscribers.iter() {
                if !handle.active.load(Ordering::Acquire) {
                    continue;
                }

                match handle.sender.try_send(Arc::clone(&frame)) {
                    Ok(()) => report.delivered += 1,
                    Err(err) => {
                        handle.active.store(false, Ordering::Release);
                        let error = match err {
                            TrySendError::Full(_) => SubscriberDeliveryError::QueueFull,
                            TrySendError::Closed(_) => SubscriberDeliveryError::Closed,
                        };
                        failed.push((id.clone(), error));
                    }
                }
            }
        }

        if !failed.is_empty() {
            let mut subscribers = self.subscribers.write().await;
            for (id, error) in failed {
                if subscribers.remove(&id).is_some() {
                    report.dropped += 1;
                    tracing::warn!(
                        subscriber_id = %id,
                        error = %error,
                        state = ?SubscriberState::Disconnected,
                        "Dropping subscriber after failed push"
                    );
                }
            }
        }

        tracing::trace!(
            delivered = report.delivered,
            dropped = report.dropped,
            "Broadcast frame"
        );
        Ok(report)
    }

    /// Queue a message for a single subscriber (replies to client messages)
    pub async fn send_to(&self, id: &str, message: &ServerMessage) -> Result<(), HubError> {
        let frame: Frame = serde_json::to_string(message)
            .map_err(|e| HubError::Serialization(e.to_string()))?
            .into();

        let subscribers = self.subscribers.read().await;
        let handle = subscribers.get(id).ok_or(HubError::ConnectionNotFound)?;

        handle
            .sender
            .try_send(frame)
            .map_err(|_| HubError::SendFailed)
    }

    /// Current lifecycle state of a subscriber id
    pub async fn state(&self, id: &str) -> SubscriberState {
        match self.subscribers.read().await.get(id) {
            Some(handle) if handle.active.load(Ordering::Acquire) => SubscriberState::Active,
            _ => SubscriberState::Disconnected,
        }
    }

    /// Get the current subscriber count
    pub async fn connection_count(&self) -> usize {
        self.subscribers.read().await.len()
    }
}

/// Why a push to one subscriber failed
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberDeliveryError {
    #[error("outbound queue is full")]
    QueueFull,

    #[error("connection closed")]
    Closed,
}

/// Errors that can occur in the connection hub
#[derive(Debug, Error)]
pub enum HubError {
    #[error("Too many connections (limit: {0})")]
    TooManyConnections(usize),

    #[error("Connection not found")]
    ConnectionNotFound,

    #[error("Failed to send message")]
    SendFailed,

    #[error("Failed to serialize message: {0}")]
    Serialization(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn update(value: f64) -> ServerMessage {
        let mut signals = BTreeMap::new();
        signals.insert("sine_wave".to_string(), value);
        ServerMessage::TelemetryUpdate {
            timestamp: Utc::now(),
            signals,
        }
    }

    #[test]
    fn test_default_config() {
        let config = HubConfig::default();
        assert_eq!(config.max_subscribers, 1000);
        assert_eq!(config.queue_capacity, 256);
    }

    #[tokio::test]
    async fn test_register_unregister() {
        let hub = ConnectionHub::new(HubConfig::default());

        let sub = hub.register().await.unwrap();
        assert!(!sub.id.is_empty());
        assert_eq!(hub.connection_count().await, 1);
        assert_eq!(hub.state(&sub.id).await, SubscriberState::Active);

        assert!(hub.unregister(&sub.id).await);
        assert_eq!(hub.connection_count().await, 0);
        assert_eq!(hub.state(&sub.id).await, SubscriberState::Disconnected);
        assert!(!hub.unregister(&sub.id).await);
    }

    #[tokio::test]
    async fn test_connection_limit() {
        let hub = ConnectionHub::new(HubConfig {
            max_subscribers: 2,
            queue_capacity: 16,
        });

        let _a = hub.register().await.unwrap();
        let _b = hub.register().await.unwrap();
        let result = hub.register().await;

        assert!(matches!(result, Err(HubError::TooManyConnections(2))));
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_subscriber_once() {
        let hub = ConnectionHub::new(HubConfig::default());
        let mut a = hub.register().await.unwrap();
        let mut b = hub.register().await.unwrap();

        let report = hub.broadcast(&update(1.0)).await.unwrap();
        assert_eq!(report, BroadcastReport { delivered: 2, dropped: 0 });

        let frame_a = a.frames.try_recv().unwrap();
        let frame_b = b.frames.try_recv().unwrap();
        assert_eq!(frame_a, frame_b);
        assert!(frame_a.contains("\"type\":\"telemetry_update\""));

        assert!(a.frames.try_recv().is_err());
        assert!(b.frames.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_closed_subscriber_is_dropped_without_affecting_others() {
        let hub = ConnectionHub::new(HubConfig::default());
        let dead = hub.register().await.unwrap();
        let mut live = hub.register().await.unwrap();

        let dead_id = dead.id.clone();
        drop(dead.frames);

        let report = hub.broadcast(&update(1.0)).await.unwrap();
        assert_eq!(report, BroadcastReport { delivered: 1, dropped: 1 });
        assert_eq!(hub.state(&dead_id).await, SubscriberState::Disconnected);
        assert_eq!(hub.connection_count().await, 1);

        assert!(live.frames.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_slow_subscriber_is_dropped_when_queue_fills() {
        let hub = ConnectionHub::new(HubConfig {
            max_subscribers: 10,
            queue_capacity: 2,
        });
        let slow = hub.register().await.unwrap();
        let mut fast = hub.register().await.unwrap();

        for i in 0..3 {
            hub.broadcast(&update(i as f64)).await.unwrap();
            // the fast subscriber keeps up
            assert!(fast.frames.try_recv().is_ok());
        }

        assert_eq!(hub.state(&slow.id).await, SubscriberState::Disconnected);
        assert_eq!(hub.state(&fast.id).await, SubscriberState::Active);

        // Frames queued before the drop are still readable, then the queue ends
        let mut slow_frames = slow.frames;
        assert!(slow_frames.recv().await.is_some());
        assert!(slow_frames.recv().await.is_some());
        assert!(slow_frames.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_late_subscriber_misses_earlier_push() {
        let hub = ConnectionHub::new(HubConfig::default());
        let mut early = hub.register().await.unwrap();

        hub.broadcast(&update(1.0)).await.unwrap();
        let mut late = hub.register().await.unwrap();

        assert!(early.frames.try_recv().is_ok());
        assert!(late.frames.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unregistered_subscriber_receives_nothing() {
        let hub = ConnectionHub::new(HubConfig::default());
        let mut sub = hub.register().await.unwrap();
        hub.unregister(&sub.id).await;

        let report = hub.broadcast(&update(1.0)).await.unwrap();
        assert_eq!(report.delivered, 0);
        assert!(sub.frames.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_send_to_single_subscriber() {
        let hub = ConnectionHub::new(HubConfig::default());
        let mut a = hub.register().await.unwrap();
        let mut b = hub.register().await.unwrap();

        hub.send_to(&a.id, &ServerMessage::Pong).await.unwrap();
        assert_eq!(&*a.frames.try_recv().unwrap(), r#"{"type":"pong"}"#);
        assert!(b.frames.try_recv().is_err());

        let missing = hub.send_to("nope", &ServerMessage::Pong).await;
        assert!(matches!(missing, Err(HubError::ConnectionNotFound)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_register_and_unregister_during_broadcasts() {
        let hub = Arc::new(ConnectionHub::new(HubConfig::default()));

        let pusher = {
            let hub = Arc::clone(&hub);
            tokio::spawn(async move {
                for i in 0..200 {
                    hub.broadcast(&update(i as f64)).await.unwrap();
                }
            })
        };

        for _ in 0..50 {
            let sub = hub.register().await.unwrap();
            hub.unregister(&sub.id).await;
        }

        pusher.await.unwrap();
        assert_eq!(hub.connection_count().await, 0);
    }
}
