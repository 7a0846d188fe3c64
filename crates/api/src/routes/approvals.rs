//! Account review endpoint handlers.
//!
//! The path kind (`doctor` or `patient`) and numeric id select the account;
//! the verb selects the transition.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;

use domain::models::identity::{AccountStatus, SubjectKind};

use crate::app::AppState;
use crate::error::ApiError;
use crate::services::AccountView;

#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct SetStatusRequest {
    pub status: String,
    pub reason: Option<String>,
}

fn parse_kind(kind: &str) -> Result<SubjectKind, ApiError> {
    Ok(kind.parse::<SubjectKind>()?)
}

/// POST /api/v1/accounts/:kind/:id/approve
pub async fn approve(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, i64)>,
) -> Result<Json<AccountView>, ApiError> {
    let kind = parse_kind(&kind)?;
    let view = state.approval.approve(kind, id).await?;
    Ok(Json(view))
}

/// POST /api/v1/accounts/:kind/:id/reject
pub async fn reject(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, i64)>,
    Json(request): Json<RejectRequest>,
) -> Result<Json<AccountView>, ApiError> {
    let kind = parse_kind(&kind)?;
    let view = state.approval.reject(kind, id, &request.reason).await?;
    Ok(Json(view))
}

/// POST /api/v1/accounts/:kind/:id/deactivate
pub async fn deactivate(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, i64)>,
) -> Result<Json<AccountView>, ApiError> {
    let kind = parse_kind(&kind)?;
    let view = state.approval.deactivate(kind, id).await?;
    Ok(Json(view))
}

/// PUT /api/v1/accounts/:kind/:id/status
pub async fn set_status(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, i64)>,
    Json(request): Json<SetStatusRequest>,
) -> Result<Json<AccountView>, ApiError> {
    let kind = parse_kind(&kind)?;
    let status = request.status.parse::<AccountStatus>()?;
    let view = state
        .approval
        .revert(kind, id, status, request.reason.as_deref())
        .await?;
    Ok(Json(view))
}
