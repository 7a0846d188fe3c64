use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use domain::error::{DomainError, TokenRejection};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Invite existed but can no longer be redeemed (expired or consumed).
    #[error("Gone: {0}")]
    Gone(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg.clone()),
            ApiError::Gone(msg) => (StatusCode::GONE, "invite_unusable", msg.clone()),
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg.clone()),
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".into(),
                )
            }
            ApiError::ServiceUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "service_unavailable",
                msg.clone(),
            ),
        };

        let body = ErrorBody {
            error: error_code.into(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::InvalidRole(_) => ApiError::Validation(err.to_string()),
            DomainError::InvalidToken(rejection) => match rejection {
                TokenRejection::NotFound => ApiError::NotFound(rejection.to_string()),
                TokenRejection::Expired | TokenRejection::AlreadyUsed => {
                    ApiError::Gone(rejection.to_string())
                }
                TokenRejection::WrongRole => ApiError::Validation(rejection.to_string()),
            },
            DomainError::EmailInUse(conflict) => ApiError::Conflict(conflict.to_string()),
            DomainError::MissingCredential => ApiError::Validation(err.to_string()),
            DomainError::PractitionerNotFound(_) => ApiError::NotFound(err.to_string()),
            DomainError::NotFound(what) => ApiError::NotFound(format!("{} not found", what)),
            DomainError::InvalidStatus(msg) => ApiError::Validation(msg),
            DomainError::Validation(msg) => ApiError::Validation(msg),
            DomainError::Storage(e) => ApiError::Internal(format!("Database error: {}", e)),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ApiError::from(DomainError::from(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::error::EmailConflict;
    use domain::models::identity::AccountStatus;

    #[test]
    fn test_expired_invite_is_gone() {
        let error: ApiError = DomainError::InvalidToken(TokenRejection::Expired).into();
        assert_eq!(error.into_response().status(), StatusCode::GONE);
    }

    #[test]
    fn test_used_invite_is_gone() {
        let error: ApiError = DomainError::InvalidToken(TokenRejection::AlreadyUsed).into();
        assert_eq!(error.into_response().status(), StatusCode::GONE);
    }

    #[test]
    fn test_unknown_invite_is_not_found() {
        let error: ApiError = DomainError::InvalidToken(TokenRejection::NotFound).into();
        assert_eq!(error.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_email_in_use_is_conflict() {
        let error: ApiError =
            DomainError::EmailInUse(EmailConflict::Doctor(AccountStatus::Approved)).into();
        assert_eq!(error.into_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_invalid_transition_is_bad_request() {
        let error: ApiError =
            DomainError::InvalidStatus("only approved accounts can be deactivated".into()).into();
        assert_eq!(error.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_missing_credential_is_bad_request() {
        let error: ApiError = DomainError::MissingCredential.into();
        assert_eq!(error.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_practitioner_not_found_is_404() {
        let error: ApiError = DomainError::PractitionerNotFound("DOC00099".into()).into();
        assert_eq!(error.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_storage_error_is_internal() {
        let error: ApiError = DomainError::Storage(sqlx::Error::RowNotFound).into();
        assert_eq!(
            error.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
