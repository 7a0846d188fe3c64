//! Email service for onboarding and account-status notices.
//!
//! Supported providers:
//! - `console`: logs emails to the console (development)
//! - `smtp`: sends via SMTP server
//! - `sendgrid`: uses the SendGrid API

use crate::config::EmailConfig;
use domain::models::identity::AccountStatus;
use domain::models::invite::{InviteRole, InviteToken};
use domain::services::notification::StatusChangeEvent;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Errors that can occur during email operations.
#[derive(Debug, Error)]
pub enum EmailError {
    #[error("Email service not configured")]
    NotConfigured,

    #[error("Failed to send email: {0}")]
    SendFailed(String),

    #[error("Provider error: {0}")]
    ProviderError(String),
}

/// Email message to be sent.
#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub to: String,
    pub to_name: Option<String>,
    pub subject: String,
    pub body_text: String,
}

/// Email service for sending transactional emails.
#[derive(Clone)]
pub struct EmailService {
    config: Arc<EmailConfig>,
}

impl EmailService {
    /// Creates a new EmailService with the given configuration.
    pub fn new(config: EmailConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Check if email sending is enabled.
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Send an email message.
    pub async fn send(&self, message: EmailMessage) -> Result<(), EmailError> {
        if !self.config.enabled {
            debug!(
                to = %message.to,
                subject = %message.subject,
                "Email service disabled, skipping send"
            );
            return Ok(());
        }

        match self.config.provider.as_str() {
            "console" => self.send_console(message).await,
            "smtp" => self.send_smtp(message).await,
            "sendgrid" => self.send_sendgrid(message).await,
            provider => {
                error!(provider = %provider, "Unknown email provider");
                Err(EmailError::NotConfigured)
            }
        }
    }

    /// Send the registration link for a freshly issued invite.
    ///
    /// Best-effort: the caller logs failures and never propagates them into
    /// the issue response.
    pub async fn send_invite_email(&self, invite: &InviteToken) -> Result<(), EmailError> {
        let Some(to) = invite.recipient_email.clone() else {
            return Ok(());
        };

        let path = match invite.role {
            InviteRole::Doctor => "register/doctor",
            InviteRole::Patient => "register/patient",
        };
        let link = format!("{}/{}?token={}", self.config.base_url, path, invite.token);

        let body_text = format!(
            "Hi{name},\n\n\
             You have been invited to join {portal} as a {role}. Complete your \
             registration using the link below:\n\n\
             {link}\n\n\
             This invitation expires on {expires} UTC.\n\n\
             If you were not expecting this invitation, you can safely ignore \
             this email.",
            name = invite
                .recipient_name
                .as_deref()
                .map(|n| format!(" {}", n))
                .unwrap_or_default(),
            portal = self.config.sender_name,
            role = invite.role,
            link = link,
            expires = invite.expires_at.format("%Y-%m-%d %H:%M"),
        );

        self.send(EmailMessage {
            to,
            to_name: invite.recipient_name.clone(),
            subject: format!("Your {} registration invitation", self.config.sender_name),
            body_text,
        })
        .await
    }

    /// Send an account status notice for a committed review transition.
    pub async fn send_status_email(&self, event: &StatusChangeEvent) -> Result<(), EmailError> {
        let (subject, summary) = match event.status {
            AccountStatus::Approved => (
                "Your account has been approved",
                "Your account has been approved. You can now sign in to the portal.".to_string(),
            ),
            AccountStatus::Rejected => (
                "Your registration was not approved",
                match &event.reason {
                    Some(reason) => format!(
                        "Your registration was not approved. Reason: {}. If you believe \
                         this is a mistake, contact your practice administrator.",
                        reason
                    ),
                    None => "Your registration was not approved. If you believe this is a \
                             mistake, contact your practice administrator."
                        .to_string(),
                },
            ),
            AccountStatus::Deactivated => (
                "Your account has been deactivated",
                "Your account has been deactivated. Contact your practice administrator \
                 for details."
                    .to_string(),
            ),
            AccountStatus::Pending => (
                "Your registration was received",
                "Your registration was received and is awaiting review. You will be \
                 notified once it has been processed."
                    .to_string(),
            ),
        };

        let body_text = format!(
            "Hi{name},\n\n{summary}\n\nBest regards,\nThe {portal} Team",
            name = event
                .name
                .as_deref()
                .map(|n| format!(" {}", n))
                .unwrap_or_default(),
            summary = summary,
            portal = self.config.sender_name,
        );

        self.send(EmailMessage {
            to: event.email.clone(),
            to_name: event.name.clone(),
            subject: subject.to_string(),
            body_text,
        })
        .await
    }

    /// Console provider - logs email to the console (for development).
    async fn send_console(&self, message: EmailMessage) -> Result<(), EmailError> {
        info!(
            to = %message.to,
            to_name = ?message.to_name,
            subject = %message.subject,
            from = %self.config.sender_email,
            "Email (console provider)"
        );
        info!(body_text = %message.body_text, "Email body");
        Ok(())
    }

    /// SMTP provider - sends via SMTP server.
    async fn send_smtp(&self, message: EmailMessage) -> Result<(), EmailError> {
        if self.config.smtp_host.is_empty() {
            return Err(EmailError::NotConfigured);
        }

        // TODO: wire up lettre for real SMTP delivery; until then log only so
        // staging environments configured for smtp do not hard-fail.
        warn!(
            provider = "smtp",
            host = %self.config.smtp_host,
            port = %self.config.smtp_port,
            to = %message.to,
            subject = %message.subject,
            "SMTP delivery not implemented, logging instead"
        );
        Ok(())
    }

    /// SendGrid provider - sends via the SendGrid API.
    async fn send_sendgrid(&self, message: EmailMessage) -> Result<(), EmailError> {
        if self.config.sendgrid_api_key.is_empty() {
            return Err(EmailError::NotConfigured);
        }

        let client = reqwest::Client::new();

        let mut recipient = serde_json::json!({ "email": message.to });
        if let Some(name) = &message.to_name {
            recipient["name"] = serde_json::json!(name);
        }

        let body = serde_json::json!({
            "personalizations": [{ "to": [recipient] }],
            "from": {
                "email": self.config.sender_email,
                "name": self.config.sender_name
            },
            "subject": message.subject,
            "content": [{
                "type": "text/plain",
                "value": message.body_text
            }]
        });

        let response = client
            .post("https://api.sendgrid.com/v3/mail/send")
            .header(
                "Authorization",
                format!("Bearer {}", self.config.sendgrid_api_key),
            )
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| EmailError::SendFailed(format!("SendGrid request failed: {}", e)))?;

        if response.status().is_success() {
            info!(
                to = %message.to,
                subject = %message.subject,
                "Email sent via SendGrid"
            );
            Ok(())
        } else {
            let status = response.status();
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, error = %error_body, "SendGrid API error");
            Err(EmailError::ProviderError(format!(
                "SendGrid returned {}: {}",
                status, error_body
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use domain::models::invite::{generate_token, IssuerKind};
    use domain::models::identity::SubjectKind;
    use uuid::Uuid;

    fn test_config() -> EmailConfig {
        EmailConfig {
            enabled: true,
            provider: "console".to_string(),
            base_url: "https://portal.example.test".to_string(),
            ..EmailConfig::default()
        }
    }

    fn invite(recipient: Option<&str>) -> InviteToken {
        InviteToken {
            id: Uuid::new_v4(),
            token: generate_token(),
            role: InviteRole::Doctor,
            issuer_kind: IssuerKind::Admin,
            issuer_id: 1,
            practitioner_id: None,
            recipient_email: recipient.map(|s| s.to_string()),
            recipient_name: Some("Dr. Reed".to_string()),
            expires_at: Utc::now() + Duration::hours(3),
            used: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_email_service_disabled_by_default() {
        let service = EmailService::new(EmailConfig::default());
        assert!(!service.is_enabled());
    }

    #[tokio::test]
    async fn test_send_disabled_silently_succeeds() {
        let service = EmailService::new(EmailConfig::default());
        let result = service
            .send(EmailMessage {
                to: "user@example.com".to_string(),
                to_name: None,
                subject: "Test".to_string(),
                body_text: "Test".to_string(),
            })
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_invite_email_console() {
        let service = EmailService::new(test_config());
        assert!(service.send_invite_email(&invite(Some("doc@clinic.test"))).await.is_ok());
    }

    #[tokio::test]
    async fn test_invite_email_without_recipient_is_noop() {
        let service = EmailService::new(test_config());
        assert!(service.send_invite_email(&invite(None)).await.is_ok());
    }

    #[tokio::test]
    async fn test_status_email_rejection_includes_reason() {
        let service = EmailService::new(test_config());
        let event = StatusChangeEvent {
            kind: SubjectKind::Doctor,
            id: 1,
            email: "doc@clinic.test".to_string(),
            name: None,
            status: AccountStatus::Rejected,
            reason: Some("incomplete paperwork".to_string()),
            occurred_at: Utc::now(),
        };
        assert!(service.send_status_email(&event).await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_provider_errors() {
        let mut config = test_config();
        config.provider = "pigeon".to_string();
        let service = EmailService::new(config);
        let result = service
            .send(EmailMessage {
                to: "user@example.com".to_string(),
                to_name: None,
                subject: "Test".to_string(),
                body_text: "Test".to_string(),
            })
            .await;
        assert!(matches!(result, Err(EmailError::NotConfigured)));
    }
}
