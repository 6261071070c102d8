//! Event envelope types and EventBus for the Sentra pipeline
//!
//! The bus decouples report creation from notification delivery.
//! Delivery is at-least-once: a slow consumer can lag and see
//! re-delivery-like gaps, so handlers must tolerate seeing a report
//! event more than once. Ordering is only guaranteed among messages
//! sharing the same topic and key, not globally.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;

/// Topic carrying confirmed-detection alerts
pub const ALERT_TOPIC: &str = "threat-alerts";

/// Message key used for alert events (per-key ordering)
pub const ALERT_KEY: &str = "alert";

/// A responder ranked by distance, as carried on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponderHit {
    pub id: String,
    pub name: String,
    pub distance_km: f64,
}

/// Report summary carried in the alert envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportPayload {
    pub report_id: String,
    pub owner_id: String,
    pub address: String,
    pub description: String,
    pub images: Vec<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub responders_in_radius: Vec<ResponderHit>,
}

/// The alert event envelope
///
/// Validated by serde once at the producer (serialization) and once
/// at the consumer boundary (deserialization); there is no loosely
/// typed dictionary stage in between.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub user_id: String,
    pub report: ReportPayload,
}

/// A raw message as carried by the bus
#[derive(Debug, Clone)]
pub struct Message {
    pub topic: String,
    pub key: String,
    pub payload: Vec<u8>,
}

/// Handler capability for consumed events
///
/// Implemented by the notification dispatcher; the consumer loop is
/// generic over this trait rather than taking an anonymous closure.
pub trait EventHandler: Send + Sync {
    fn on_event(&self, message: &Message) -> impl Future<Output = Result<()>> + Send;
}

/// In-process publish/subscribe bus
///
/// One broadcast channel per topic; a single sender per topic keeps
/// messages FIFO within a topic, which covers the per-key ordering
/// guarantee. Publishing to a topic nobody subscribes to fails with
/// `Dependency` rather than silently dropping the event.
pub struct EventBus {
    topics: Mutex<HashMap<String, broadcast::Sender<Message>>>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with the given per-topic buffer capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            topics: Mutex::new(HashMap::new()),
            capacity,
        }
    }

    fn sender(&self, topic: &str) -> broadcast::Sender<Message> {
        let mut topics = self
            .topics
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    /// Publish a payload to a topic
    ///
    /// Returns the number of subscribers reached, or `Dependency` if
    /// no subscriber is attached to the topic.
    pub fn publish(&self, topic: &str, key: &str, payload: Vec<u8>) -> Result<usize> {
        let message = Message {
            topic: topic.to_string(),
            key: key.to_string(),
            payload,
        };
        self.sender(topic)
            .send(message)
            .map_err(|_| Error::Dependency(format!("No subscribers on topic '{}'", topic)))
    }

    /// Subscribe to a topic
    ///
    /// `group_id` names the consumer for logging; the in-process bus
    /// broadcasts to every subscription.
    pub fn subscribe(&self, topic: &str, group_id: &str) -> Subscription {
        Subscription {
            rx: self.sender(topic).subscribe(),
            topic: topic.to_string(),
            group_id: group_id.to_string(),
        }
    }

    /// Number of active subscribers on a topic
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.sender(topic).receiver_count()
    }
}

/// A consumer's attachment to one topic
pub struct Subscription {
    rx: broadcast::Receiver<Message>,
    topic: String,
    group_id: String,
}

impl Subscription {
    /// Poll for the next message with a bounded wait
    ///
    /// `Ok(None)` on timeout so the caller can observe cancellation
    /// between polls. A lagged receiver logs the skipped count and
    /// keeps polling; a closed channel is a `Dependency` error the
    /// caller should back off on.
    pub async fn poll(&mut self, timeout: Duration) -> Result<Option<Message>> {
        loop {
            match tokio::time::timeout(timeout, self.rx.recv()).await {
                Err(_) => return Ok(None),
                Ok(Ok(message)) => return Ok(Some(message)),
                Ok(Err(broadcast::error::RecvError::Lagged(skipped))) => {
                    tracing::warn!(
                        topic = %self.topic,
                        group_id = %self.group_id,
                        skipped,
                        "Consumer lagged; continuing from oldest buffered message"
                    );
                    continue;
                }
                Ok(Err(broadcast::error::RecvError::Closed)) => {
                    return Err(Error::Dependency(format!(
                        "Topic '{}' closed",
                        self.topic
                    )));
                }
            }
        }
    }
}
