//! Registration endpoint handlers.

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;

use domain::models::identity::{RegistrationForm, RegistrationOutcome};

use crate::app::AppState;
use crate::error::ApiError;

/// Request body for doctor registration. The token is mandatory; doctors
/// only enter the system through an invite.
#[derive(Debug, Deserialize)]
pub struct DoctorRegistrationRequest {
    pub token: String,
    #[serde(flatten)]
    pub form: RegistrationForm,
}

/// Request body for patient registration. Exactly one of `token` and
/// `practitioner_uid` must be present.
#[derive(Debug, Deserialize)]
pub struct PatientRegistrationRequest {
    pub token: Option<String>,
    pub practitioner_uid: Option<String>,
    #[serde(flatten)]
    pub form: RegistrationForm,
}

/// POST /api/v1/register/doctor
pub async fn register_doctor(
    State(state): State<AppState>,
    Json(request): Json<DoctorRegistrationRequest>,
) -> Result<(StatusCode, Json<RegistrationOutcome>), ApiError> {
    let outcome = state
        .registration
        .register_doctor(&request.token, request.form)
        .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// POST /api/v1/register/patient
pub async fn register_patient(
    State(state): State<AppState>,
    Json(request): Json<PatientRegistrationRequest>,
) -> Result<(StatusCode, Json<RegistrationOutcome>), ApiError> {
    let outcome = state
        .registration
        .register_patient(
            request.token.as_deref(),
            request.practitioner_uid.as_deref(),
            request.form,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}
