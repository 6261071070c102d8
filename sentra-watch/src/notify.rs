//! Push notification dispatch
//!
//! Consumes alert events from the bus and delivers them through the
//! push gateway. Everything here is per-message and non-fatal: a bad
//! payload, a missing token, or a gateway failure is logged and the
//! consumer loop keeps running.

use sentra_common::db::responders;
use sentra_common::events::{AlertEvent, EventHandler, Message};
use sentra_common::{Error, Result};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error as ThisError;
use uuid::Uuid;

/// A push notification ready for the gateway
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub title: String,
    pub body: String,
    /// Structured data delivered alongside the visible notification
    pub data: HashMap<String, String>,
}

/// Push gateway failure modes
#[derive(Debug, ThisError)]
pub enum PushError {
    #[error("Device token rejected by the gateway")]
    TokenInvalid,

    #[error("Push gateway unreachable: {0}")]
    Network(String),
}

/// Push gateway contract
pub trait PushGateway: Send + Sync {
    /// Deliver a notification; returns the gateway message id
    fn send(
        &self,
        token: &str,
        notification: &Notification,
    ) -> impl Future<Output = std::result::Result<String, PushError>> + Send;
}

/// Bus consumer that turns alert events into push notifications
pub struct NotificationDispatcher<G> {
    db: SqlitePool,
    gateway: Arc<G>,
}

impl<G: PushGateway> NotificationDispatcher<G> {
    pub fn new(db: SqlitePool, gateway: Arc<G>) -> Self {
        Self { db, gateway }
    }

    async fn handle(&self, message: &Message) -> Result<()> {
        let event: AlertEvent = serde_json::from_slice(&message.payload)
            .map_err(|e| Error::Validation(format!("Malformed alert payload: {}", e)))?;

        let recipient = Uuid::parse_str(&event.user_id)
            .map_err(|e| Error::Validation(format!("Malformed recipient id: {}", e)))?;

        let Some(token) = responders::get_push_token(&self.db, recipient).await? else {
            tracing::warn!(
                recipient = %recipient,
                report_id = %event.report.report_id,
                "No push token for recipient; notification dropped"
            );
            return Ok(());
        };

        let notification = build_notification(&event);

        match self.gateway.send(&token, &notification).await {
            Ok(message_id) => {
                tracing::info!(
                    recipient = %recipient,
                    report_id = %event.report.report_id,
                    message_id = %message_id,
                    "Push notification sent"
                );
            }
            Err(PushError::TokenInvalid) => {
                tracing::warn!(
                    recipient = %recipient,
                    report_id = %event.report.report_id,
                    "Push token invalid; notification dropped"
                );
            }
            Err(PushError::Network(reason)) => {
                // Known gap: no retry/backoff here; a redesign would
                // retry idempotently or dead-letter the event.
                tracing::error!(
                    recipient = %recipient,
                    report_id = %event.report.report_id,
                    reason = %reason,
                    "Push gateway failure; notification lost"
                );
            }
        }

        Ok(())
    }
}

fn build_notification(event: &AlertEvent) -> Notification {
    let mut data = HashMap::new();
    data.insert("report_id".to_string(), event.report.report_id.clone());
    data.insert("owner_id".to_string(), event.report.owner_id.clone());

    Notification {
        title: "Threat detected!".to_string(),
        body: format!("New report: {}", event.report.description),
        data,
    }
}

impl<G: PushGateway> EventHandler for NotificationDispatcher<G> {
    fn on_event(&self, message: &Message) -> impl Future<Output = Result<()>> + Send {
        self.handle(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentra_common::db::models::{Responder, Role};
    use sentra_common::db::{self};
    use sentra_common::events::{ReportPayload, ALERT_KEY, ALERT_TOPIC};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    struct MockGateway {
        sent: Mutex<Vec<(String, Notification)>>,
        fail_network: AtomicBool,
    }

    impl MockGateway {
        fn new() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail_network: AtomicBool::new(false),
            }
        }
    }

    impl PushGateway for MockGateway {
        async fn send(
            &self,
            token: &str,
            notification: &Notification,
        ) -> std::result::Result<String, PushError> {
            if self.fail_network.load(Ordering::SeqCst) {
                return Err(PushError::Network("connection refused".to_string()));
            }
            self.sent
                .lock()
                .unwrap()
                .push((token.to_string(), notification.clone()));
            Ok(format!("msg-{}", self.sent.lock().unwrap().len()))
        }
    }

    async fn setup(push_token: Option<&str>) -> (SqlitePool, Uuid) {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        db::init_tables(&pool).await.unwrap();

        let recipient = Uuid::new_v4();
        responders::insert(
            &pool,
            &Responder {
                guid: recipient,
                name: "Pak Budi".to_string(),
                email: format!("{}@example.com", recipient),
                address: None,
                lat: None,
                long: None,
                role: Role::Owner,
                push_token: push_token.map(str::to_string),
            },
        )
        .await
        .unwrap();

        (pool, recipient)
    }

    fn alert_message(recipient: Uuid) -> Message {
        let event = AlertEvent {
            user_id: recipient.to_string(),
            report: ReportPayload {
                report_id: Uuid::new_v4().to_string(),
                owner_id: recipient.to_string(),
                address: "Jl. Veteran 12".to_string(),
                description: "Weapon detected".to_string(),
                images: vec!["mem://a.jpg".to_string()],
                created_at: chrono::Utc::now(),
                responders_in_radius: Vec::new(),
            },
        };
        Message {
            topic: ALERT_TOPIC.to_string(),
            key: ALERT_KEY.to_string(),
            payload: serde_json::to_vec(&event).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_delivers_notification_with_report_data() {
        let (pool, recipient) = setup(Some("device-token")).await;
        let gateway = Arc::new(MockGateway::new());
        let dispatcher = NotificationDispatcher::new(pool, gateway.clone());

        dispatcher
            .on_event(&alert_message(recipient))
            .await
            .unwrap();

        let sent = gateway.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let (token, notification) = &sent[0];
        assert_eq!(token, "device-token");
        assert_eq!(notification.title, "Threat detected!");
        assert!(notification.body.contains("Weapon detected"));
        assert!(notification.data.contains_key("report_id"));
        assert!(notification.data.contains_key("owner_id"));
    }

    #[tokio::test]
    async fn test_missing_token_completes_without_error() {
        let (pool, recipient) = setup(None).await;
        let gateway = Arc::new(MockGateway::new());
        let dispatcher = NotificationDispatcher::new(pool, gateway.clone());

        dispatcher
            .on_event(&alert_message(recipient))
            .await
            .unwrap();

        assert!(gateway.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_payload_is_validation_error() {
        let (pool, _) = setup(Some("device-token")).await;
        let gateway = Arc::new(MockGateway::new());
        let dispatcher = NotificationDispatcher::new(pool, gateway);

        let message = Message {
            topic: ALERT_TOPIC.to_string(),
            key: ALERT_KEY.to_string(),
            payload: b"not json".to_vec(),
        };

        let err = dispatcher.on_event(&message).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_gateway_failure_is_logged_not_propagated() {
        let (pool, recipient) = setup(Some("device-token")).await;
        let gateway = Arc::new(MockGateway::new());
        gateway.fail_network.store(true, Ordering::SeqCst);
        let dispatcher = NotificationDispatcher::new(pool, gateway.clone());

        // Gateway loss must not poison the consumer loop
        dispatcher
            .on_event(&alert_message(recipient))
            .await
            .unwrap();
        assert!(gateway.sent.lock().unwrap().is_empty());
    }
}
