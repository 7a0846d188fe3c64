//! Invite token domain model.
//!
//! An invite is a single-use, time-limited credential permitting registration
//! under a specific role, optionally bound to a practitioner and/or a
//! recipient email (the recipient binding doubles as the re-registration
//! marker for rejected doctors).

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::{DomainError, TokenRejection};

/// Invite token prefix.
pub const TOKEN_PREFIX: &str = "reg_";

/// Length of random bytes for token generation (264 bits of entropy).
const TOKEN_RANDOM_BYTES: usize = 33;

/// TTL for administrator-issued invites. Admin invites back fast-turnaround
/// onboarding sent immediately by email, so the window is short.
pub const ADMIN_INVITE_TTL_HOURS: i64 = 3;

/// TTL for practitioner-issued patient invites, handed out more casually.
pub const PRACTITIONER_INVITE_TTL_DAYS: i64 = 7;

/// Grace window after expiry before the cleanup sweep may hard-delete a
/// token. A token is redeemable only up to `expires_at`, strictly before
/// this threshold, so the sweep can never race a valid redemption.
pub const SWEEP_GRACE_HOURS: i64 = 24;

/// Role an invite permits registration under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InviteRole {
    Doctor,
    Patient,
}

impl std::fmt::Display for InviteRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Doctor => write!(f, "doctor"),
            Self::Patient => write!(f, "patient"),
        }
    }
}

impl std::str::FromStr for InviteRole {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "doctor" => Ok(Self::Doctor),
            "patient" => Ok(Self::Patient),
            other => Err(DomainError::InvalidRole(other.to_string())),
        }
    }
}

/// Who issued an invite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssuerKind {
    Admin,
    Doctor,
}

impl std::fmt::Display for IssuerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Admin => write!(f, "admin"),
            Self::Doctor => write!(f, "doctor"),
        }
    }
}

impl std::str::FromStr for IssuerKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "doctor" => Ok(Self::Doctor),
            other => Err(DomainError::Validation(format!(
                "unknown issuer kind '{}'",
                other
            ))),
        }
    }
}

/// Invite token domain model.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct InviteToken {
    pub id: Uuid,
    pub token: String,
    pub role: InviteRole,
    pub issuer_kind: IssuerKind,
    pub issuer_id: i64,
    /// Doctor a patient invite is bound to, when issued by or for a
    /// specific practitioner.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub practitioner_id: Option<i64>,
    /// Recipient binding; for doctor invites this doubles as the
    /// re-registration marker pointing at a rejected doctor's email.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient_name: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    pub created_at: DateTime<Utc>,
}

impl InviteToken {
    /// Check if the token is expired at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Check why the token cannot be redeemed at `now`, if it cannot.
    ///
    /// Ordering matters for error reporting: a used token reports
    /// `AlreadyUsed` even once it has also expired.
    pub fn rejection(&self, now: DateTime<Utc>) -> Option<TokenRejection> {
        if self.used {
            Some(TokenRejection::AlreadyUsed)
        } else if self.is_expired(now) {
            Some(TokenRejection::Expired)
        } else {
            None
        }
    }

    /// The instant after which the cleanup sweep may delete this token.
    pub fn sweep_after(&self) -> DateTime<Utc> {
        self.expires_at + Duration::hours(SWEEP_GRACE_HOURS)
    }
}

/// Fields for creating a new invite.
#[derive(Debug, Clone)]
pub struct NewInvite {
    pub token: String,
    pub role: InviteRole,
    pub issuer_kind: IssuerKind,
    pub issuer_id: i64,
    pub practitioner_id: Option<i64>,
    pub recipient_email: Option<String>,
    pub recipient_name: Option<String>,
    pub expires_at: DateTime<Utc>,
}

/// Request to issue a new invite.
///
/// `role` arrives as a string so that an unsupported value surfaces as the
/// domain `InvalidRole` error rather than a deserialization failure.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct IssueInviteRequest {
    pub role: String,
    pub issuer_kind: String,
    pub issuer_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub practitioner_id: Option<i64>,
    #[validate(custom(function = "validate_optional_email"))]
    pub recipient_email: Option<String>,
    pub recipient_name: Option<String>,
}

fn validate_optional_email(email: &str) -> Result<(), validator::ValidationError> {
    shared::validation::validate_email(email)
}

/// Public view of an invite returned by validation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct InviteSummary {
    pub role: InviteRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub practitioner_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient_name: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl From<InviteToken> for InviteSummary {
    fn from(invite: InviteToken) -> Self {
        Self {
            role: invite.role,
            practitioner_id: invite.practitioner_id,
            recipient_email: invite.recipient_email,
            recipient_name: invite.recipient_name,
            expires_at: invite.expires_at,
        }
    }
}

/// Generate a new invite token string.
pub fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let random_bytes: Vec<u8> = (0..TOKEN_RANDOM_BYTES).map(|_| rng.gen()).collect();
    format!("{}{}", TOKEN_PREFIX, URL_SAFE_NO_PAD.encode(random_bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invite(used: bool, expires_at: DateTime<Utc>) -> InviteToken {
        InviteToken {
            id: Uuid::new_v4(),
            token: generate_token(),
            role: InviteRole::Doctor,
            issuer_kind: IssuerKind::Admin,
            issuer_id: 1,
            practitioner_id: None,
            recipient_email: None,
            recipient_name: None,
            expires_at,
            used,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_generate_token_shape() {
        let token = generate_token();
        assert!(token.starts_with(TOKEN_PREFIX));
        // 33 bytes -> 44 base64 chars, plus the prefix
        assert_eq!(token.len(), TOKEN_PREFIX.len() + 44);
    }

    #[test]
    fn test_generate_token_uniqueness() {
        assert_ne!(generate_token(), generate_token());
    }

    #[test]
    fn test_invite_role_from_str() {
        use std::str::FromStr;
        assert_eq!(InviteRole::from_str("doctor").unwrap(), InviteRole::Doctor);
        assert_eq!(InviteRole::from_str("patient").unwrap(), InviteRole::Patient);
        assert!(matches!(
            InviteRole::from_str("admin"),
            Err(DomainError::InvalidRole(_))
        ));
    }

    #[test]
    fn test_rejection_fresh_token() {
        let now = Utc::now();
        let invite = invite(false, now + Duration::hours(1));
        assert_eq!(invite.rejection(now), None);
    }

    #[test]
    fn test_rejection_expired() {
        let now = Utc::now();
        let invite = invite(false, now - Duration::minutes(1));
        assert_eq!(invite.rejection(now), Some(TokenRejection::Expired));
    }

    #[test]
    fn test_rejection_used_wins_over_expired() {
        let now = Utc::now();
        let invite = invite(true, now - Duration::hours(5));
        assert_eq!(invite.rejection(now), Some(TokenRejection::AlreadyUsed));
    }

    #[test]
    fn test_expiry_boundary_is_exclusive() {
        let now = Utc::now();
        let invite = invite(false, now);
        // A token is redeemable strictly before expires_at.
        assert!(invite.is_expired(now));
    }

    #[test]
    fn test_sweep_after_grace_window() {
        let now = Utc::now();
        let invite = invite(false, now);
        assert_eq!(invite.sweep_after(), now + Duration::hours(24));
    }
}
