//! Domain error taxonomy.
//!
//! Every error here is an expected, recoverable outcome returned to the
//! caller as a typed result. Only notification dispatch and the opportunistic
//! token sweep are allowed to fail opaquely (logged, swallowed) - see the
//! invite and notification services.

use thiserror::Error;

use crate::models::identity::AccountStatus;

/// Why an invite token could not be redeemed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRejection {
    /// No invite with this token string exists.
    NotFound,
    /// The invite exists but `expires_at` is in the past.
    Expired,
    /// The invite was already consumed by a successful registration.
    AlreadyUsed,
    /// The invite's role does not match the registration flow consuming it.
    WrongRole,
}

impl std::fmt::Display for TokenRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => write!(f, "invite not found"),
            Self::Expired => write!(f, "invite has expired"),
            Self::AlreadyUsed => write!(f, "invite has already been used"),
            Self::WrongRole => write!(f, "invite is not valid for this registration"),
        }
    }
}

/// Which identity already owns an email address, with enough detail for the
/// front end to give actionable guidance.
///
/// The rejected-vs-active distinction is part of the contract: a registrant
/// whose prior application was rejected must be told to use their
/// re-registration link rather than a generic "email taken" message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailConflict {
    /// The email belongs to an administrator account.
    Admin,
    /// The email belongs to a patient account.
    Patient,
    /// The email belongs to a doctor whose status blocks reuse.
    Doctor(AccountStatus),
    /// The email belongs to a rejected doctor, but this invite does not
    /// re-register that row; the registrant should use the re-registration
    /// link issued for their own account.
    RejectedAwaitingReinvite,
    /// Constraint-violation backstop where the owning row's status is not
    /// known (the database rejected the write before the pre-check ran).
    Taken,
}

impl std::fmt::Display for EmailConflict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Admin => write!(f, "this email address is in use by an administrator account"),
            Self::Patient => write!(f, "this email address is in use by a patient account"),
            Self::Doctor(AccountStatus::Pending) => {
                write!(f, "a registration with this email is already awaiting review")
            }
            Self::Doctor(AccountStatus::Approved) => {
                write!(f, "this email address belongs to an active practitioner account")
            }
            Self::Doctor(AccountStatus::Deactivated) => {
                write!(f, "this email address belongs to a deactivated practitioner account")
            }
            Self::Doctor(AccountStatus::Rejected) | Self::RejectedAwaitingReinvite => {
                write!(
                    f,
                    "a previous registration with this email was rejected; use the re-registration link you were sent"
                )
            }
            Self::Taken => write!(f, "this email address is already registered"),
        }
    }
}

/// Errors produced by the registration and approval core.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Invalid invite role: {0}")]
    InvalidRole(String),

    #[error("Invalid invite token: {0}")]
    InvalidToken(TokenRejection),

    #[error("Email already in use: {0}")]
    EmailInUse(EmailConflict),

    #[error("Either an invite token or a practitioner identifier is required")]
    MissingCredential,

    #[error("No approved practitioner found for identifier {0}")]
    PractitionerNotFound(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Invalid status transition: {0}")]
    InvalidStatus(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Storage(#[from] sqlx::Error),
}

impl From<validator::ValidationErrors> for DomainError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let messages: Vec<String> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| {
                    let msg = e
                        .message
                        .clone()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string());
                    format!("{}: {}", field, msg)
                })
            })
            .collect();
        DomainError::Validation(messages.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_rejection_display() {
        assert_eq!(TokenRejection::Expired.to_string(), "invite has expired");
        assert_eq!(
            TokenRejection::AlreadyUsed.to_string(),
            "invite has already been used"
        );
    }

    #[test]
    fn test_email_conflict_messages_distinguish_rejected_from_active() {
        let rejected = EmailConflict::RejectedAwaitingReinvite.to_string();
        let active = EmailConflict::Doctor(AccountStatus::Approved).to_string();
        assert!(rejected.contains("re-registration link"));
        assert!(active.contains("active practitioner"));
        assert_ne!(rejected, active);
    }

    #[test]
    fn test_email_conflict_pending_vs_approved_messages_differ() {
        assert_ne!(
            EmailConflict::Doctor(AccountStatus::Pending).to_string(),
            EmailConflict::Doctor(AccountStatus::Approved).to_string()
        );
    }

    #[test]
    fn test_domain_error_display() {
        let err = DomainError::InvalidToken(TokenRejection::NotFound);
        assert_eq!(err.to_string(), "Invalid invite token: invite not found");

        let err = DomainError::PractitionerNotFound("DOC00099".to_string());
        assert!(err.to_string().contains("DOC00099"));
    }
}
