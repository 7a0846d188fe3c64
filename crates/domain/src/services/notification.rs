//! Outbound notification events and the dispatch queue.
//!
//! Every committed registration or review transition pushes an event onto an
//! in-memory queue; a background consumer drains it and delivers email
//! best-effort. The push is synchronous and cheap, delivery never blocks or
//! fails the primary response path, and a failed delivery is only logged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::models::identity::{AccountStatus, SubjectKind};

/// A committed account state change, emitted after the write succeeds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StatusChangeEvent {
    pub kind: SubjectKind,
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub status: AccountStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Result of a notification delivery attempt.
#[derive(Debug, Clone)]
pub enum NotifyResult {
    Sent,
    /// Delivery was intentionally skipped (e.g. email disabled).
    Skipped,
    /// Delivery failed; the failure is logged and never propagated.
    Failed(String),
}

/// Delivery backend consumed by the dispatcher.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: StatusChangeEvent) -> NotifyResult;
}

/// Sending half of the notification queue, held by the core services.
#[derive(Clone)]
pub struct NotificationQueue {
    tx: mpsc::UnboundedSender<StatusChangeEvent>,
}

impl NotificationQueue {
    /// Creates the queue, returning the sender and the receiver to hand to
    /// [`spawn_dispatcher`].
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StatusChangeEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Enqueue an event. Never blocks and never fails the caller; a closed
    /// queue (dispatcher gone during shutdown) is logged and ignored.
    pub fn push(&self, event: StatusChangeEvent) {
        if let Err(e) = self.tx.send(event) {
            tracing::warn!(
                kind = %e.0.kind,
                id = e.0.id,
                status = %e.0.status,
                "Notification queue closed, dropping event"
            );
        }
    }
}

/// Spawns the queue consumer. Delivery failures are logged, never retried
/// into the caller's path.
pub fn spawn_dispatcher(
    mut rx: mpsc::UnboundedReceiver<StatusChangeEvent>,
    notifier: std::sync::Arc<dyn Notifier>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let kind = event.kind;
            let id = event.id;
            let status = event.status;
            match notifier.notify(event).await {
                NotifyResult::Sent => {
                    tracing::debug!(kind = %kind, id, status = %status, "Notification sent");
                }
                NotifyResult::Skipped => {
                    tracing::debug!(kind = %kind, id, status = %status, "Notification skipped");
                }
                NotifyResult::Failed(err) => {
                    tracing::warn!(
                        kind = %kind,
                        id,
                        status = %status,
                        error = %err,
                        "Notification delivery failed"
                    );
                }
            }
        }
    })
}

/// Notifier that records events in memory, for tests and development.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    events: std::sync::Mutex<Vec<StatusChangeEvent>>,
    pub simulate_failure: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            events: std::sync::Mutex::new(Vec::new()),
            simulate_failure: true,
        }
    }

    /// Events recorded so far.
    pub fn events(&self) -> Vec<StatusChangeEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, event: StatusChangeEvent) -> NotifyResult {
        self.events.lock().unwrap().push(event);
        if self.simulate_failure {
            NotifyResult::Failed("simulated failure".to_string())
        } else {
            NotifyResult::Sent
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn event(id: i64, status: AccountStatus) -> StatusChangeEvent {
        StatusChangeEvent {
            kind: SubjectKind::Doctor,
            id,
            email: "doc@clinic.test".to_string(),
            name: Some("Dr. Test".to_string()),
            status,
            reason: None,
            occurred_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_dispatcher_drains_queue() {
        let (queue, rx) = NotificationQueue::new();
        let notifier = Arc::new(RecordingNotifier::new());
        let handle = spawn_dispatcher(rx, notifier.clone());

        queue.push(event(1, AccountStatus::Approved));
        queue.push(event(2, AccountStatus::Rejected));
        drop(queue);

        handle.await.unwrap();
        let events = notifier.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].id, 1);
        assert_eq!(events[1].status, AccountStatus::Rejected);
    }

    #[tokio::test]
    async fn test_failed_delivery_does_not_stop_dispatcher() {
        let (queue, rx) = NotificationQueue::new();
        let notifier = Arc::new(RecordingNotifier::failing());
        let handle = spawn_dispatcher(rx, notifier.clone());

        queue.push(event(1, AccountStatus::Approved));
        queue.push(event(2, AccountStatus::Approved));
        drop(queue);

        handle.await.unwrap();
        assert_eq!(notifier.events().len(), 2);
    }

    #[test]
    fn test_push_after_receiver_dropped_is_silent() {
        let (queue, rx) = NotificationQueue::new();
        drop(rx);
        // Must not panic or error.
        queue.push(event(1, AccountStatus::Pending));
    }

    #[test]
    fn test_event_serialization_omits_empty_fields() {
        let mut e = event(3, AccountStatus::Rejected);
        e.name = None;
        e.reason = Some("incomplete paperwork".to_string());
        let json = serde_json::to_string(&e).unwrap();
        assert!(json.contains("incomplete paperwork"));
        assert!(!json.contains("\"name\""));
    }
}
