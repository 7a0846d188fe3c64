//! Email-backed consumer for the notification queue.

use async_trait::async_trait;
use tracing::debug;

use domain::services::notification::{Notifier, NotifyResult, StatusChangeEvent};

use crate::services::email::EmailService;

/// Delivers status-change events over email. Skips silently when email
/// delivery is disabled in configuration.
pub struct EmailNotifier {
    email: EmailService,
}

impl EmailNotifier {
    pub fn new(email: EmailService) -> Self {
        Self { email }
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn notify(&self, event: StatusChangeEvent) -> NotifyResult {
        if !self.email.is_enabled() {
            debug!(kind = %event.kind, id = event.id, "Email disabled, skipping notification");
            return NotifyResult::Skipped;
        }
        match self.email.send_status_email(&event).await {
            Ok(()) => NotifyResult::Sent,
            Err(e) => NotifyResult::Failed(e.to_string()),
        }
    }
}
