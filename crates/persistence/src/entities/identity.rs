//! Identity entities (database row mappings) for the doctor and patient
//! tables, plus the cross-table email directory row.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::FromRow;
use std::str::FromStr;

use domain::models::identity::{AccountStatus, DoctorIdentity, PatientIdentity};
use domain::DomainError;

/// Database row mapping for the doctors table.
#[derive(Debug, Clone, FromRow)]
pub struct DoctorEntity {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub status: String,
    pub uid: Option<String>,
    pub invite_token: Option<String>,
    pub profile: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DoctorEntity> for DoctorIdentity {
    type Error = DomainError;

    fn try_from(entity: DoctorEntity) -> Result<Self, Self::Error> {
        Ok(Self {
            id: entity.id,
            email: entity.email,
            password_hash: entity.password_hash,
            status: AccountStatus::from_str(&entity.status)?,
            uid: entity.uid,
            invite_token: entity.invite_token,
            profile: entity.profile,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        })
    }
}

/// Database row mapping for the patients table.
#[derive(Debug, Clone, FromRow)]
pub struct PatientEntity {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub status: String,
    pub uid: Option<String>,
    pub practitioner_id: Option<i64>,
    pub invite_token: Option<String>,
    pub profile: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<PatientEntity> for PatientIdentity {
    type Error = DomainError;

    fn try_from(entity: PatientEntity) -> Result<Self, Self::Error> {
        Ok(Self {
            id: entity.id,
            email: entity.email,
            password_hash: entity.password_hash,
            status: AccountStatus::from_str(&entity.status)?,
            uid: entity.uid,
            practitioner_id: entity.practitioner_id,
            invite_token: entity.invite_token,
            profile: entity.profile,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        })
    }
}

/// Row shape for the cross-table email directory query.
#[derive(Debug, Clone, FromRow)]
pub struct EmailOwnerRow {
    pub kind: String,
    pub id: i64,
    pub status: String,
}
