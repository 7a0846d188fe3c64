//! Repository for the admin, doctor and patient identity tables.
//!
//! The three tables enforce a single email namespace; `owners_of_email` is
//! the directory query all registration paths consult before writing, and
//! the unique indexes on admins.email and doctors.email are the backstop for
//! check-then-act races - a constraint violation is translated into the same
//! `EmailInUse` error the pre-check would have produced.

use async_trait::async_trait;
use sqlx::PgPool;
use std::str::FromStr;

use domain::error::{DomainError, EmailConflict};
use domain::models::identity::{
    AccountStatus, DoctorIdentity, EmailOwner, IdentityKind, PatientIdentity,
};
use domain::store::{
    DoctorReregistration, IdentityStore, NewDoctor, NewPatient, ReviewUpdate, StoreResult,
    UidChange,
};

use crate::entities::{DoctorEntity, EmailOwnerRow, PatientEntity};
use crate::metrics::QueryTimer;

const DOCTOR_COLUMNS: &str =
    "id, email, password_hash, status, uid, invite_token, profile, created_at, updated_at";
const PATIENT_COLUMNS: &str =
    "id, email, password_hash, status, uid, practitioner_id, invite_token, profile, created_at, updated_at";

/// sqlx-backed implementation of [`IdentityStore`].
#[derive(Clone)]
pub struct PgIdentityRepository {
    pool: PgPool,
}

impl PgIdentityRepository {
    /// Creates a new identity repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Maps a unique-constraint violation on an email column to `EmailInUse`,
/// leaving every other error untouched.
fn email_conflict_on_unique(err: sqlx::Error) -> DomainError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some("23505") {
            return DomainError::EmailInUse(EmailConflict::Taken);
        }
    }
    DomainError::Storage(err)
}

#[async_trait]
impl IdentityStore for PgIdentityRepository {
    async fn owners_of_email(&self, email: &str) -> StoreResult<Vec<EmailOwner>> {
        let timer = QueryTimer::new("owners_of_email");
        // Admins have no lifecycle; report them as approved.
        let rows = sqlx::query_as::<_, EmailOwnerRow>(
            r#"
            SELECT 'admin' AS kind, id, 'approved' AS status FROM admins WHERE email = $1
            UNION ALL
            SELECT 'doctor' AS kind, id, status FROM doctors WHERE email = $1
            UNION ALL
            SELECT 'patient' AS kind, id, status FROM patients WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_all(&self.pool)
        .await?;
        timer.record();

        rows.into_iter()
            .map(|row| {
                let kind = match row.kind.as_str() {
                    "admin" => IdentityKind::Admin,
                    "doctor" => IdentityKind::Doctor,
                    "patient" => IdentityKind::Patient,
                    other => {
                        return Err(DomainError::Validation(format!(
                            "unexpected identity kind '{}' in directory",
                            other
                        )))
                    }
                };
                Ok(EmailOwner {
                    kind,
                    id: row.id,
                    status: AccountStatus::from_str(&row.status)?,
                })
            })
            .collect()
    }

    async fn find_doctor(&self, id: i64) -> StoreResult<Option<DoctorIdentity>> {
        let entity = sqlx::query_as::<_, DoctorEntity>(&format!(
            "SELECT {} FROM doctors WHERE id = $1",
            DOCTOR_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        entity.map(DoctorIdentity::try_from).transpose()
    }

    async fn find_doctor_by_email(&self, email: &str) -> StoreResult<Option<DoctorIdentity>> {
        let entity = sqlx::query_as::<_, DoctorEntity>(&format!(
            "SELECT {} FROM doctors WHERE email = $1",
            DOCTOR_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        entity.map(DoctorIdentity::try_from).transpose()
    }

    async fn find_doctor_by_uid(&self, uid: &str) -> StoreResult<Option<DoctorIdentity>> {
        let entity = sqlx::query_as::<_, DoctorEntity>(&format!(
            "SELECT {} FROM doctors WHERE uid = $1",
            DOCTOR_COLUMNS
        ))
        .bind(uid)
        .fetch_optional(&self.pool)
        .await?;

        entity.map(DoctorIdentity::try_from).transpose()
    }

    async fn insert_doctor(&self, new: NewDoctor) -> StoreResult<DoctorIdentity> {
        let entity = sqlx::query_as::<_, DoctorEntity>(&format!(
            r#"
            INSERT INTO doctors (email, password_hash, status, invite_token, profile)
            VALUES ($1, $2, 'pending', $3, $4)
            RETURNING {}
            "#,
            DOCTOR_COLUMNS
        ))
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(&new.invite_token)
        .bind(&new.profile)
        .fetch_one(&self.pool)
        .await
        .map_err(email_conflict_on_unique)?;

        entity.try_into()
    }

    async fn reregister_doctor(
        &self,
        id: i64,
        update: DoctorReregistration,
    ) -> StoreResult<Option<DoctorIdentity>> {
        // One write: email change, password, status reset and UID clear all
        // land together, and the primary key never changes.
        let entity = sqlx::query_as::<_, DoctorEntity>(&format!(
            r#"
            UPDATE doctors
            SET email = $2, password_hash = $3, status = 'pending', uid = NULL,
                invite_token = $4, profile = $5, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            DOCTOR_COLUMNS
        ))
        .bind(id)
        .bind(&update.email)
        .bind(&update.password_hash)
        .bind(&update.invite_token)
        .bind(&update.profile)
        .fetch_optional(&self.pool)
        .await
        .map_err(email_conflict_on_unique)?;

        entity.map(DoctorIdentity::try_from).transpose()
    }

    async fn apply_doctor_review(
        &self,
        id: i64,
        update: ReviewUpdate,
    ) -> StoreResult<Option<DoctorIdentity>> {
        let entity = match &update.uid {
            UidChange::Keep => {
                sqlx::query_as::<_, DoctorEntity>(&format!(
                    r#"
                    UPDATE doctors
                    SET status = $2, profile = $3, updated_at = NOW()
                    WHERE id = $1
                    RETURNING {}
                    "#,
                    DOCTOR_COLUMNS
                ))
                .bind(id)
                .bind(update.status.to_string())
                .bind(&update.profile)
                .fetch_optional(&self.pool)
                .await?
            }
            UidChange::Clear => {
                sqlx::query_as::<_, DoctorEntity>(&format!(
                    r#"
                    UPDATE doctors
                    SET status = $2, uid = NULL, profile = $3, updated_at = NOW()
                    WHERE id = $1
                    RETURNING {}
                    "#,
                    DOCTOR_COLUMNS
                ))
                .bind(id)
                .bind(update.status.to_string())
                .bind(&update.profile)
                .fetch_optional(&self.pool)
                .await?
            }
            UidChange::Set(uid) => {
                sqlx::query_as::<_, DoctorEntity>(&format!(
                    r#"
                    UPDATE doctors
                    SET status = $2, uid = $3, profile = $4, updated_at = NOW()
                    WHERE id = $1
                    RETURNING {}
                    "#,
                    DOCTOR_COLUMNS
                ))
                .bind(id)
                .bind(update.status.to_string())
                .bind(uid)
                .bind(&update.profile)
                .fetch_optional(&self.pool)
                .await?
            }
        };

        entity.map(DoctorIdentity::try_from).transpose()
    }

    async fn find_patient(&self, id: i64) -> StoreResult<Option<PatientIdentity>> {
        let entity = sqlx::query_as::<_, PatientEntity>(&format!(
            "SELECT {} FROM patients WHERE id = $1",
            PATIENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        entity.map(PatientIdentity::try_from).transpose()
    }

    async fn insert_patient(&self, new: NewPatient) -> StoreResult<PatientIdentity> {
        let entity = sqlx::query_as::<_, PatientEntity>(&format!(
            r#"
            INSERT INTO patients (email, password_hash, status, practitioner_id, invite_token, profile)
            VALUES ($1, $2, 'pending', $3, $4, $5)
            RETURNING {}
            "#,
            PATIENT_COLUMNS
        ))
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(new.practitioner_id)
        .bind(&new.invite_token)
        .bind(&new.profile)
        .fetch_one(&self.pool)
        .await
        .map_err(email_conflict_on_unique)?;

        entity.try_into()
    }

    async fn apply_patient_review(
        &self,
        id: i64,
        update: ReviewUpdate,
    ) -> StoreResult<Option<PatientIdentity>> {
        let entity = match &update.uid {
            UidChange::Keep => {
                sqlx::query_as::<_, PatientEntity>(&format!(
                    r#"
                    UPDATE patients
                    SET status = $2, profile = $3, updated_at = NOW()
                    WHERE id = $1
                    RETURNING {}
                    "#,
                    PATIENT_COLUMNS
                ))
                .bind(id)
                .bind(update.status.to_string())
                .bind(&update.profile)
                .fetch_optional(&self.pool)
                .await?
            }
            UidChange::Clear => {
                sqlx::query_as::<_, PatientEntity>(&format!(
                    r#"
                    UPDATE patients
                    SET status = $2, uid = NULL, profile = $3, updated_at = NOW()
                    WHERE id = $1
                    RETURNING {}
                    "#,
                    PATIENT_COLUMNS
                ))
                .bind(id)
                .bind(update.status.to_string())
                .bind(&update.profile)
                .fetch_optional(&self.pool)
                .await?
            }
            UidChange::Set(uid) => {
                sqlx::query_as::<_, PatientEntity>(&format!(
                    r#"
                    UPDATE patients
                    SET status = $2, uid = $3, profile = $4, updated_at = NOW()
                    WHERE id = $1
                    RETURNING {}
                    "#,
                    PATIENT_COLUMNS
                ))
                .bind(id)
                .bind(update.status.to_string())
                .bind(uid)
                .bind(&update.profile)
                .fetch_optional(&self.pool)
                .await?
            }
        };

        entity.map(PatientIdentity::try_from).transpose()
    }
}
