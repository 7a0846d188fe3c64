//! Identity domain models for the admin, doctor and patient collections.
//!
//! The three collections are independently keyed but share one email
//! namespace; [`EmailOwner`] is the directory view used for the cross-table
//! uniqueness check.

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use validator::Validate;

use crate::error::DomainError;

/// Which identity collection a record lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityKind {
    Admin,
    Doctor,
    Patient,
}

impl std::fmt::Display for IdentityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Admin => write!(f, "admin"),
            Self::Doctor => write!(f, "doctor"),
            Self::Patient => write!(f, "patient"),
        }
    }
}

/// The reviewable identity kinds - admins have no approval lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectKind {
    Doctor,
    Patient,
}

impl SubjectKind {
    /// Prefix of the public identifier for this kind.
    pub fn uid_prefix(&self) -> &'static str {
        match self {
            Self::Doctor => "DOC",
            Self::Patient => "PAT",
        }
    }
}

impl std::fmt::Display for SubjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Doctor => write!(f, "doctor"),
            Self::Patient => write!(f, "patient"),
        }
    }
}

impl std::str::FromStr for SubjectKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "doctor" => Ok(Self::Doctor),
            "patient" => Ok(Self::Patient),
            other => Err(DomainError::NotFound(format!("identity kind '{}'", other))),
        }
    }
}

impl From<SubjectKind> for IdentityKind {
    fn from(kind: SubjectKind) -> Self {
        match kind {
            SubjectKind::Doctor => IdentityKind::Doctor,
            SubjectKind::Patient => IdentityKind::Patient,
        }
    }
}

/// Account lifecycle status for doctors and patients.
///
/// `Deactivated` is a first-class state: it distinguishes "was approved,
/// then pulled back" from a never-reviewed `Pending` account without
/// inspecting profile markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Pending,
    Approved,
    Rejected,
    Deactivated,
}

impl std::fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Approved => write!(f, "approved"),
            Self::Rejected => write!(f, "rejected"),
            Self::Deactivated => write!(f, "deactivated"),
        }
    }
}

impl std::str::FromStr for AccountStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "deactivated" => Ok(Self::Deactivated),
            other => Err(DomainError::InvalidStatus(format!(
                "unknown account status '{}'",
                other
            ))),
        }
    }
}

lazy_static! {
    static ref UID_RE: Regex = Regex::new(r"^(DOC|PAT)\d{5,}$").unwrap();
}

/// Formats the public identifier for an approved doctor or patient.
///
/// The identifier is derived from the numeric surrogate id, so the same row
/// always produces the same identifier.
pub fn public_uid(kind: SubjectKind, id: i64) -> String {
    format!("{}{:05}", kind.uid_prefix(), id)
}

/// Checks whether a string has the shape of a public identifier.
pub fn is_valid_uid(uid: &str) -> bool {
    UID_RE.is_match(uid)
}

/// Administrator identity. Admins are created out of band and have no
/// approval lifecycle; they participate only in the email namespace.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct AdminIdentity {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Doctor identity.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct DoctorIdentity {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub status: AccountStatus,
    /// Public identifier, assigned on first approval and retained across
    /// deactivation. Cleared on rejection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    /// Token of the invite that created or last re-registered this row.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invite_token: Option<String>,
    pub profile: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Patient identity.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct PatientIdentity {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub status: AccountStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    /// The practitioner this patient registered under, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub practitioner_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invite_token: Option<String>,
    pub profile: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A single owner of an email address in the identity directory.
///
/// Admins are reported with `Approved` status since they have no lifecycle.
/// An email may have several owners (multiple patients, or a rejected doctor
/// alongside patients), so directory lookups return all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmailOwner {
    pub kind: IdentityKind,
    pub id: i64,
    pub status: AccountStatus,
}

/// Submitted registration form shared by both flows.
///
/// `profile` carries the arbitrary structured portal form payload; the core
/// validates only the fields it depends on.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct RegistrationForm {
    #[validate(custom(function = "shared::validation::validate_email"))]
    pub email: String,
    #[validate(custom(function = "shared::validation::validate_password"))]
    pub password: String,
    #[validate(custom(function = "shared::validation::validate_display_name"))]
    pub full_name: String,
    #[serde(default)]
    pub profile: Value,
}

/// Result of a successful registration, returned to the web layer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct RegistrationOutcome {
    pub id: i64,
    pub email: String,
    pub status: AccountStatus,
}

// ---------------------------------------------------------------------------
// Profile payload construction
//
// The profile payload is the audit trail: registration metadata,
// re-registration markers, rejection reasons, deactivation records. Rows are
// never deleted, so the payload accumulates history.
// ---------------------------------------------------------------------------

/// Builds the profile payload for a freshly registered identity.
///
/// `invite_token` is absent for the manual patient path (registration by
/// practitioner identifier).
pub fn registration_profile(
    form: &RegistrationForm,
    invite_token: Option<&str>,
    issued_by: &str,
    now: DateTime<Utc>,
) -> Value {
    let mut profile = ensure_object(form.profile.clone());
    let obj = profile.as_object_mut().unwrap();
    obj.insert("full_name".into(), json!(form.full_name));
    let mut marker = json!({
        "registered_at": now,
        "issued_by": issued_by,
    });
    if let Some(token) = invite_token {
        marker["invite_token"] = json!(token);
    }
    obj.insert("registration".into(), marker);
    profile
}

/// Merges prior profile data with a re-registration submission.
///
/// Prior keys survive unless resubmitted; a `reregistration` marker records
/// the event and, when the email changed, the previous address.
pub fn reregistration_profile(
    prior: Value,
    form: &RegistrationForm,
    invite_token: &str,
    previous_email: Option<&str>,
    now: DateTime<Utc>,
) -> Value {
    let mut merged = ensure_object(prior);
    let obj = merged.as_object_mut().unwrap();
    if let Value::Object(submitted) = ensure_object(form.profile.clone()) {
        for (k, v) in submitted {
            obj.insert(k, v);
        }
    }
    obj.insert("full_name".into(), json!(form.full_name));
    let mut marker = json!({
        "reregistered_at": now,
        "invite_token": invite_token,
    });
    if let Some(prev) = previous_email {
        marker["previous_email"] = json!(prev);
    }
    obj.insert("reregistration".into(), marker);
    merged
}

/// Appends a rejection record to a profile payload.
pub fn record_rejection(profile: Value, reason: &str, now: DateTime<Utc>) -> Value {
    insert_marker(profile, "rejection", json!({ "reason": reason, "rejected_at": now }))
}

/// Appends a deactivation record to a profile payload.
pub fn record_deactivation(profile: Value, previous: AccountStatus, now: DateTime<Utc>) -> Value {
    insert_marker(
        profile,
        "deactivation",
        json!({ "previous_status": previous.to_string(), "deactivated_at": now }),
    )
}

/// Appends an approval record to a profile payload.
pub fn record_approval(profile: Value, now: DateTime<Utc>) -> Value {
    insert_marker(profile, "approval", json!({ "approved_at": now }))
}

/// Appends an administrative status-revert record to a profile payload.
pub fn record_revert(
    profile: Value,
    from: AccountStatus,
    to: AccountStatus,
    reason: Option<&str>,
    now: DateTime<Utc>,
) -> Value {
    insert_marker(
        profile,
        "revert",
        json!({
            "from": from.to_string(),
            "to": to.to_string(),
            "reason": reason,
            "reverted_at": now,
        }),
    )
}

fn insert_marker(profile: Value, key: &str, marker: Value) -> Value {
    let mut profile = ensure_object(profile);
    profile.as_object_mut().unwrap().insert(key.to_string(), marker);
    profile
}

fn ensure_object(value: Value) -> Value {
    match value {
        Value::Object(_) => value,
        Value::Null => json!({}),
        other => json!({ "data": other }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn form(email: &str) -> RegistrationForm {
        RegistrationForm {
            email: email.to_string(),
            password: "correct horse battery".to_string(),
            full_name: "Test Person".to_string(),
            profile: json!({ "specialty": "nutrition" }),
        }
    }

    #[test]
    fn test_public_uid_zero_padded() {
        assert_eq!(public_uid(SubjectKind::Doctor, 3), "DOC00003");
        assert_eq!(public_uid(SubjectKind::Patient, 99), "PAT00099");
        assert_eq!(public_uid(SubjectKind::Doctor, 123456), "DOC123456");
    }

    #[test]
    fn test_is_valid_uid() {
        assert!(is_valid_uid("DOC00003"));
        assert!(is_valid_uid("PAT123456"));
        assert!(!is_valid_uid("doc00003"));
        assert!(!is_valid_uid("ADM00001"));
        assert!(!is_valid_uid("DOC3"));
    }

    #[test]
    fn test_account_status_roundtrip() {
        for status in [
            AccountStatus::Pending,
            AccountStatus::Approved,
            AccountStatus::Rejected,
            AccountStatus::Deactivated,
        ] {
            assert_eq!(AccountStatus::from_str(&status.to_string()).unwrap(), status);
        }
        assert!(AccountStatus::from_str("limbo").is_err());
    }

    #[test]
    fn test_subject_kind_from_str() {
        assert_eq!(SubjectKind::from_str("doctor").unwrap(), SubjectKind::Doctor);
        assert_eq!(SubjectKind::from_str("patient").unwrap(), SubjectKind::Patient);
        assert!(SubjectKind::from_str("admin").is_err());
    }

    #[test]
    fn test_registration_form_validation() {
        assert!(form("a@x.com").validate().is_ok());

        let mut bad = form("not-an-email");
        assert!(bad.validate().is_err());
        bad = form("a@x.com");
        bad.password = "short".into();
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_registration_profile_carries_form_and_metadata() {
        let now = Utc::now();
        let profile = registration_profile(&form("a@x.com"), Some("reg_abc"), "admin:1", now);
        assert_eq!(profile["specialty"], "nutrition");
        assert_eq!(profile["full_name"], "Test Person");
        assert_eq!(profile["registration"]["invite_token"], "reg_abc");
        assert_eq!(profile["registration"]["issued_by"], "admin:1");
    }

    #[test]
    fn test_registration_profile_without_invite_token() {
        let profile = registration_profile(
            &form("a@x.com"),
            None,
            "practitioner:DOC00003",
            Utc::now(),
        );
        assert!(profile["registration"].get("invite_token").is_none());
        assert_eq!(profile["registration"]["issued_by"], "practitioner:DOC00003");
    }

    #[test]
    fn test_reregistration_profile_records_previous_email() {
        let now = Utc::now();
        let prior = json!({ "specialty": "cardiology", "clinic": "east wing" });
        let merged =
            reregistration_profile(prior, &form("b@x.com"), "reg_def", Some("a@x.com"), now);
        // Resubmitted key wins, untouched prior key survives.
        assert_eq!(merged["specialty"], "nutrition");
        assert_eq!(merged["clinic"], "east wing");
        assert_eq!(merged["reregistration"]["previous_email"], "a@x.com");
    }

    #[test]
    fn test_reregistration_profile_without_email_change() {
        let merged = reregistration_profile(
            json!({}),
            &form("a@x.com"),
            "reg_def",
            None,
            Utc::now(),
        );
        assert!(merged["reregistration"].get("previous_email").is_none());
    }

    #[test]
    fn test_markers_accumulate() {
        let now = Utc::now();
        let profile = record_rejection(json!({}), "incomplete credentials", now);
        let profile = record_revert(
            profile,
            AccountStatus::Rejected,
            AccountStatus::Pending,
            Some("admin mistake"),
            now,
        );
        assert_eq!(profile["rejection"]["reason"], "incomplete credentials");
        assert_eq!(profile["revert"]["to"], "pending");
    }

    #[test]
    fn test_non_object_profile_is_wrapped() {
        let profile = record_approval(json!("free text"), Utc::now());
        assert_eq!(profile["data"], "free text");
        assert!(profile["approval"]["approved_at"].is_string());
    }
}
