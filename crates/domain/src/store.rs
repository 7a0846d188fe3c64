//! Storage traits implemented by the persistence layer.
//!
//! The registration and approval services are written against these traits;
//! production uses the sqlx repositories, tests and development use the
//! in-memory store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::DomainError;
use crate::models::identity::{
    AccountStatus, DoctorIdentity, EmailOwner, PatientIdentity,
};
use crate::models::invite::{InviteToken, NewInvite};

/// Result type for store operations.
pub type StoreResult<T> = Result<T, DomainError>;

/// Persistence for invite tokens.
#[async_trait]
pub trait InviteStore: Send + Sync {
    /// Persist a new invite. A duplicate token string is a storage error;
    /// tokens carry enough entropy that collisions indicate a bug.
    async fn insert(&self, invite: NewInvite) -> StoreResult<InviteToken>;

    /// Find an invite by its token string.
    async fn find_by_token(&self, token: &str) -> StoreResult<Option<InviteToken>>;

    /// Mark an invite used. Idempotent; returns `false` when the token does
    /// not exist.
    async fn mark_used(&self, token: &str) -> StoreResult<bool>;

    /// Hard-delete all invites whose expiry lies at or before `cutoff`.
    /// Returns the number of deleted rows.
    async fn delete_expired_before(&self, cutoff: DateTime<Utc>) -> StoreResult<u64>;
}

/// Fields for inserting a new doctor row.
#[derive(Debug, Clone)]
pub struct NewDoctor {
    pub email: String,
    pub password_hash: String,
    pub invite_token: String,
    pub profile: Value,
}

/// In-place update applied when a rejected doctor re-registers.
///
/// Status is forced back to `Pending` and the stale UID is cleared; the row's
/// primary key never changes even when the email does.
#[derive(Debug, Clone)]
pub struct DoctorReregistration {
    pub email: String,
    pub password_hash: String,
    pub invite_token: String,
    pub profile: Value,
}

/// Fields for inserting a new patient row.
#[derive(Debug, Clone)]
pub struct NewPatient {
    pub email: String,
    pub password_hash: String,
    pub practitioner_id: Option<i64>,
    pub invite_token: Option<String>,
    pub profile: Value,
}

/// How a review transition touches the public identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UidChange {
    /// Leave the stored identifier as it is (deactivation, re-approval).
    Keep,
    /// Clear the stored identifier (doctor rejection).
    Clear,
    /// Assign an identifier (first approval).
    Set(String),
}

/// A committed state-machine transition, written atomically to one row.
#[derive(Debug, Clone)]
pub struct ReviewUpdate {
    pub status: AccountStatus,
    pub uid: UidChange,
    pub profile: Value,
}

/// Persistence for the three identity collections and the cross-table
/// email directory.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// All identities currently holding a normalized email, across the
    /// admin, doctor and patient collections. The single source of truth
    /// for the uniqueness check.
    async fn owners_of_email(&self, email: &str) -> StoreResult<Vec<EmailOwner>>;

    async fn find_doctor(&self, id: i64) -> StoreResult<Option<DoctorIdentity>>;

    async fn find_doctor_by_email(&self, email: &str) -> StoreResult<Option<DoctorIdentity>>;

    /// Look up a doctor by public identifier (e.g. `DOC00003`).
    async fn find_doctor_by_uid(&self, uid: &str) -> StoreResult<Option<DoctorIdentity>>;

    /// Insert a new doctor with status `Pending` and no UID.
    ///
    /// A unique-constraint violation on the email column must surface as
    /// [`DomainError::EmailInUse`], equivalent to a pre-check failure.
    async fn insert_doctor(&self, new: NewDoctor) -> StoreResult<DoctorIdentity>;

    /// Apply a re-registration update to an existing (rejected) doctor row.
    /// Returns `None` when the id does not exist.
    async fn reregister_doctor(
        &self,
        id: i64,
        update: DoctorReregistration,
    ) -> StoreResult<Option<DoctorIdentity>>;

    /// Apply a review transition to a doctor row.
    async fn apply_doctor_review(
        &self,
        id: i64,
        update: ReviewUpdate,
    ) -> StoreResult<Option<DoctorIdentity>>;

    async fn find_patient(&self, id: i64) -> StoreResult<Option<PatientIdentity>>;

    /// Insert a new patient with status `Pending` and no UID. Patient emails
    /// may repeat within the patient collection.
    async fn insert_patient(&self, new: NewPatient) -> StoreResult<PatientIdentity>;

    /// Apply a review transition to a patient row.
    async fn apply_patient_review(
        &self,
        id: i64,
        update: ReviewUpdate,
    ) -> StoreResult<Option<PatientIdentity>>;
}
