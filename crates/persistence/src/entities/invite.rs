//! Invite token entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

use domain::models::invite::{InviteRole, InviteToken, IssuerKind};
use domain::DomainError;

/// Database row mapping for the invite_tokens table.
#[derive(Debug, Clone, FromRow)]
pub struct InviteTokenEntity {
    pub id: Uuid,
    pub token: String,
    pub role: String,
    pub issuer_kind: String,
    pub issuer_id: i64,
    pub practitioner_id: Option<i64>,
    pub recipient_email: Option<String>,
    pub recipient_name: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<InviteTokenEntity> for InviteToken {
    type Error = DomainError;

    fn try_from(entity: InviteTokenEntity) -> Result<Self, Self::Error> {
        Ok(Self {
            id: entity.id,
            token: entity.token,
            role: InviteRole::from_str(&entity.role)?,
            issuer_kind: IssuerKind::from_str(&entity.issuer_kind)?,
            issuer_id: entity.issuer_id,
            practitioner_id: entity.practitioner_id,
            recipient_email: entity.recipient_email,
            recipient_name: entity.recipient_name,
            expires_at: entity.expires_at,
            used: entity.used,
            created_at: entity.created_at,
        })
    }
}
