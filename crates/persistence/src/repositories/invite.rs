//! Repository for invite token database operations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use domain::models::invite::{InviteToken, NewInvite};
use domain::store::{InviteStore, StoreResult};

use crate::entities::InviteTokenEntity;
use crate::metrics::QueryTimer;

/// sqlx-backed implementation of [`InviteStore`].
#[derive(Clone)]
pub struct PgInviteRepository {
    pool: PgPool,
}

impl PgInviteRepository {
    /// Creates a new invite repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InviteStore for PgInviteRepository {
    async fn insert(&self, invite: NewInvite) -> StoreResult<InviteToken> {
        let entity = sqlx::query_as::<_, InviteTokenEntity>(
            r#"
            INSERT INTO invite_tokens
                (token, role, issuer_kind, issuer_id, practitioner_id,
                 recipient_email, recipient_name, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, token, role, issuer_kind, issuer_id, practitioner_id,
                      recipient_email, recipient_name, expires_at, used, created_at
            "#,
        )
        .bind(&invite.token)
        .bind(invite.role.to_string())
        .bind(invite.issuer_kind.to_string())
        .bind(invite.issuer_id)
        .bind(invite.practitioner_id)
        .bind(&invite.recipient_email)
        .bind(&invite.recipient_name)
        .bind(invite.expires_at)
        .fetch_one(&self.pool)
        .await?;

        entity.try_into()
    }

    async fn find_by_token(&self, token: &str) -> StoreResult<Option<InviteToken>> {
        let timer = QueryTimer::new("find_invite_by_token");
        let entity = sqlx::query_as::<_, InviteTokenEntity>(
            r#"
            SELECT id, token, role, issuer_kind, issuer_id, practitioner_id,
                   recipient_email, recipient_name, expires_at, used, created_at
            FROM invite_tokens
            WHERE token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        timer.record();

        entity.map(InviteToken::try_from).transpose()
    }

    async fn mark_used(&self, token: &str) -> StoreResult<bool> {
        // `used = TRUE` is idempotent; no `AND used = FALSE` guard needed
        // because the redemption pre-check already rejected used tokens.
        let result = sqlx::query(
            r#"
            UPDATE invite_tokens
            SET used = TRUE
            WHERE token = $1
            "#,
        )
        .bind(token)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_expired_before(&self, cutoff: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM invite_tokens
            WHERE expires_at <= $1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
