//! Invite token lifecycle: issue, validate, redeem, consume, sweep.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{info, warn};
use validator::Validate;

use domain::error::{DomainError, TokenRejection};
use domain::models::invite::{
    generate_token, InviteRole, InviteSummary, InviteToken, IssueInviteRequest, IssuerKind,
    NewInvite, SWEEP_GRACE_HOURS,
};
use domain::store::InviteStore;
use shared::validation::normalize_email;

use crate::config::InviteConfig;
use crate::middleware::metrics::{record_invite_issued, record_invites_swept};
use crate::services::email::EmailService;

/// Manages the invite token lifecycle.
///
/// Redemption is split in two: [`redeem`](Self::redeem) checks the token and
/// returns it untouched, [`mark_used`](Self::mark_used) consumes it after the
/// identity write has committed. A crash in between leaves the token
/// redeemable instead of burning it.
#[derive(Clone)]
pub struct InviteService {
    store: Arc<dyn InviteStore>,
    email: EmailService,
    admin_ttl: Duration,
    practitioner_ttl: Duration,
}

impl InviteService {
    pub fn new(store: Arc<dyn InviteStore>, email: EmailService, config: &InviteConfig) -> Self {
        Self {
            store,
            email,
            admin_ttl: Duration::hours(config.admin_ttl_hours),
            practitioner_ttl: Duration::days(config.practitioner_ttl_days),
        }
    }

    /// Issue a new invite.
    ///
    /// Admin-issued invites get the short TTL (sent by email for immediate
    /// use); practitioner-issued patient invites get the long one. A
    /// practitioner may not issue doctor invites.
    pub async fn issue(&self, request: IssueInviteRequest) -> Result<InviteToken, DomainError> {
        request.validate()?;

        let role = InviteRole::from_str(&request.role)?;
        let issuer_kind = IssuerKind::from_str(&request.issuer_kind)?;

        if issuer_kind == IssuerKind::Doctor && role == InviteRole::Doctor {
            return Err(DomainError::InvalidRole(
                "practitioners may only issue patient invites".to_string(),
            ));
        }

        let ttl = match issuer_kind {
            IssuerKind::Admin => self.admin_ttl,
            IssuerKind::Doctor => self.practitioner_ttl,
        };

        let invite = self
            .store
            .insert(NewInvite {
                token: generate_token(),
                role,
                issuer_kind,
                issuer_id: request.issuer_id,
                practitioner_id: request.practitioner_id,
                recipient_email: request.recipient_email.as_deref().map(normalize_email),
                recipient_name: request.recipient_name,
                expires_at: Utc::now() + ttl,
            })
            .await?;

        info!(
            role = %invite.role,
            issuer_kind = %invite.issuer_kind,
            issuer_id = invite.issuer_id,
            expires_at = %invite.expires_at,
            "Invite issued"
        );
        record_invite_issued(&invite.role.to_string());

        // Best-effort: a failed invite email never fails the issue.
        if let Err(e) = self.email.send_invite_email(&invite).await {
            warn!(error = %e, "Failed to send invite email");
        }

        self.sweep_quietly().await;
        Ok(invite)
    }

    /// Validate a token for display, without consuming it.
    pub async fn validate(&self, token: &str) -> Result<InviteSummary, DomainError> {
        self.sweep_quietly().await;
        let invite = self.lookup(token).await?;
        Ok(invite.into())
    }

    /// Check a token for redemption under `expected_role` and return the full
    /// record. Does NOT mark the token used.
    pub async fn redeem(
        &self,
        token: &str,
        expected_role: InviteRole,
    ) -> Result<InviteToken, DomainError> {
        self.sweep_quietly().await;
        let invite = self.lookup(token).await?;
        if invite.role != expected_role {
            return Err(DomainError::InvalidToken(TokenRejection::WrongRole));
        }
        Ok(invite)
    }

    /// Consume a token after the registration it authorized has committed.
    /// Idempotent; a missing token is logged, not an error.
    pub async fn mark_used(&self, token: &str) -> Result<(), DomainError> {
        if !self.store.mark_used(token).await? {
            warn!("Attempted to consume an invite that no longer exists");
        }
        Ok(())
    }

    /// Hard-delete invites expired for at least the grace window. The
    /// predicate can never match a still-redeemable token.
    pub async fn sweep(&self) -> Result<u64, DomainError> {
        let cutoff = Utc::now() - Duration::hours(SWEEP_GRACE_HOURS);
        let deleted = self.store.delete_expired_before(cutoff).await?;
        if deleted > 0 {
            info!(deleted, "Swept expired invite tokens");
            record_invites_swept(deleted);
        }
        Ok(deleted)
    }

    /// Opportunistic sweep on the read/issue paths; failures are logged and
    /// swallowed so they never surface to the caller.
    async fn sweep_quietly(&self) {
        if let Err(e) = self.sweep().await {
            warn!(error = %e, "Opportunistic invite sweep failed");
        }
    }

    async fn lookup(&self, token: &str) -> Result<InviteToken, DomainError> {
        let invite = self
            .store
            .find_by_token(token)
            .await?
            .ok_or(DomainError::InvalidToken(TokenRejection::NotFound))?;
        if let Some(rejection) = invite.rejection(Utc::now()) {
            return Err(DomainError::InvalidToken(rejection));
        }
        Ok(invite)
    }
}
