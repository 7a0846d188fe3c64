//! Invite lifecycle endpoint handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use domain::models::invite::{InviteSummary, InviteToken, IssueInviteRequest};

use crate::app::AppState;
use crate::error::ApiError;

/// Response for a freshly issued invite. The opaque token only appears here;
/// validation responses never echo it back.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct IssuedInviteResponse {
    pub token: String,
    pub role: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

impl From<InviteToken> for IssuedInviteResponse {
    fn from(invite: InviteToken) -> Self {
        Self {
            token: invite.token,
            role: invite.role.to_string(),
            expires_at: invite.expires_at,
        }
    }
}

/// Response for the expired-invite sweep.
#[derive(Debug, Serialize)]
pub struct SweepResponse {
    pub deleted_count: u64,
}

/// POST /api/v1/invites
pub async fn issue_invite(
    State(state): State<AppState>,
    Json(request): Json<IssueInviteRequest>,
) -> Result<(StatusCode, Json<IssuedInviteResponse>), ApiError> {
    let invite = state.invites.issue(request).await?;
    Ok((StatusCode::CREATED, Json(invite.into())))
}

/// GET /api/v1/invites/:token
pub async fn validate_invite(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<InviteSummary>, ApiError> {
    let summary = state.invites.validate(&token).await?;
    Ok(Json(summary))
}

/// DELETE /api/v1/invites/expired
pub async fn sweep_expired(
    State(state): State<AppState>,
) -> Result<Json<SweepResponse>, ApiError> {
    let deleted_count = state.invites.sweep().await?;
    Ok(Json(SweepResponse { deleted_count }))
}
