//! In-memory implementation of the store traits.
//!
//! Backs the service-level tests and local development without a database.
//! Behaviour mirrors the Postgres repositories, including the unique-email
//! backstop on the admin and doctor collections and the idempotence of
//! `mark_used`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use domain::error::{DomainError, EmailConflict};
use domain::models::identity::{
    AccountStatus, AdminIdentity, DoctorIdentity, EmailOwner, IdentityKind, PatientIdentity,
};
use domain::models::invite::{InviteToken, NewInvite};
use domain::store::{
    DoctorReregistration, IdentityStore, InviteStore, NewDoctor, NewPatient, ReviewUpdate,
    StoreResult, UidChange,
};

#[derive(Default)]
struct Tables {
    invites: HashMap<String, InviteToken>,
    admins: HashMap<i64, AdminIdentity>,
    doctors: HashMap<i64, DoctorIdentity>,
    patients: HashMap<i64, PatientIdentity>,
}

/// Thread-safe in-memory store implementing both [`InviteStore`] and
/// [`IdentityStore`].
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
    next_id: Arc<AtomicI64>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            tables: Arc::new(RwLock::new(Tables::default())),
            next_id: Arc::new(AtomicI64::new(1)),
        }
    }

    fn allocate_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Seed an admin row. Admins are created out of band in production, so
    /// the store only needs this for tests and local bootstrap.
    pub async fn seed_admin(&self, email: &str, password_hash: &str) -> AdminIdentity {
        let now = Utc::now();
        let admin = AdminIdentity {
            id: self.allocate_id(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            display_name: None,
            created_at: now,
            updated_at: now,
        };
        let mut tables = self.tables.write().await;
        tables.admins.insert(admin.id, admin.clone());
        admin
    }

    fn apply_uid_change(current: &mut Option<String>, change: &UidChange) {
        match change {
            UidChange::Keep => {}
            UidChange::Clear => *current = None,
            UidChange::Set(uid) => *current = Some(uid.clone()),
        }
    }
}

#[async_trait]
impl InviteStore for InMemoryStore {
    async fn insert(&self, invite: NewInvite) -> StoreResult<InviteToken> {
        let mut tables = self.tables.write().await;
        if tables.invites.contains_key(&invite.token) {
            return Err(DomainError::Validation(format!(
                "duplicate invite token '{}'",
                invite.token
            )));
        }
        let row = InviteToken {
            id: Uuid::new_v4(),
            token: invite.token.clone(),
            role: invite.role,
            issuer_kind: invite.issuer_kind,
            issuer_id: invite.issuer_id,
            practitioner_id: invite.practitioner_id,
            recipient_email: invite.recipient_email,
            recipient_name: invite.recipient_name,
            expires_at: invite.expires_at,
            used: false,
            created_at: Utc::now(),
        };
        tables.invites.insert(invite.token, row.clone());
        Ok(row)
    }

    async fn find_by_token(&self, token: &str) -> StoreResult<Option<InviteToken>> {
        let tables = self.tables.read().await;
        Ok(tables.invites.get(token).cloned())
    }

    async fn mark_used(&self, token: &str) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.invites.get_mut(token) {
            Some(invite) => {
                invite.used = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_expired_before(&self, cutoff: DateTime<Utc>) -> StoreResult<u64> {
        let mut tables = self.tables.write().await;
        let before = tables.invites.len();
        tables.invites.retain(|_, inv| inv.expires_at > cutoff);
        Ok((before - tables.invites.len()) as u64)
    }
}

#[async_trait]
impl IdentityStore for InMemoryStore {
    async fn owners_of_email(&self, email: &str) -> StoreResult<Vec<EmailOwner>> {
        let tables = self.tables.read().await;
        let mut owners = Vec::new();
        for admin in tables.admins.values() {
            if admin.email == email {
                owners.push(EmailOwner {
                    kind: IdentityKind::Admin,
                    id: admin.id,
                    status: AccountStatus::Approved,
                });
            }
        }
        for doctor in tables.doctors.values() {
            if doctor.email == email {
                owners.push(EmailOwner {
                    kind: IdentityKind::Doctor,
                    id: doctor.id,
                    status: doctor.status,
                });
            }
        }
        for patient in tables.patients.values() {
            if patient.email == email {
                owners.push(EmailOwner {
                    kind: IdentityKind::Patient,
                    id: patient.id,
                    status: patient.status,
                });
            }
        }
        Ok(owners)
    }

    async fn find_doctor(&self, id: i64) -> StoreResult<Option<DoctorIdentity>> {
        let tables = self.tables.read().await;
        Ok(tables.doctors.get(&id).cloned())
    }

    async fn find_doctor_by_email(&self, email: &str) -> StoreResult<Option<DoctorIdentity>> {
        let tables = self.tables.read().await;
        Ok(tables.doctors.values().find(|d| d.email == email).cloned())
    }

    async fn find_doctor_by_uid(&self, uid: &str) -> StoreResult<Option<DoctorIdentity>> {
        let tables = self.tables.read().await;
        Ok(tables
            .doctors
            .values()
            .find(|d| d.uid.as_deref() == Some(uid))
            .cloned())
    }

    async fn insert_doctor(&self, new: NewDoctor) -> StoreResult<DoctorIdentity> {
        let mut tables = self.tables.write().await;
        let email_taken = tables.doctors.values().any(|d| d.email == new.email)
            || tables.admins.values().any(|a| a.email == new.email);
        if email_taken {
            return Err(DomainError::EmailInUse(EmailConflict::Taken));
        }
        let now = Utc::now();
        let doctor = DoctorIdentity {
            id: self.allocate_id(),
            email: new.email,
            password_hash: new.password_hash,
            status: AccountStatus::Pending,
            uid: None,
            invite_token: Some(new.invite_token),
            profile: new.profile,
            created_at: now,
            updated_at: now,
        };
        tables.doctors.insert(doctor.id, doctor.clone());
        Ok(doctor)
    }

    async fn reregister_doctor(
        &self,
        id: i64,
        update: DoctorReregistration,
    ) -> StoreResult<Option<DoctorIdentity>> {
        let mut tables = self.tables.write().await;
        let email_taken = tables
            .doctors
            .values()
            .any(|d| d.id != id && d.email == update.email)
            || tables.admins.values().any(|a| a.email == update.email);
        if email_taken {
            return Err(DomainError::EmailInUse(EmailConflict::Taken));
        }
        let Some(doctor) = tables.doctors.get_mut(&id) else {
            return Ok(None);
        };
        doctor.email = update.email;
        doctor.password_hash = update.password_hash;
        doctor.status = AccountStatus::Pending;
        doctor.uid = None;
        doctor.invite_token = Some(update.invite_token);
        doctor.profile = update.profile;
        doctor.updated_at = Utc::now();
        Ok(Some(doctor.clone()))
    }

    async fn apply_doctor_review(
        &self,
        id: i64,
        update: ReviewUpdate,
    ) -> StoreResult<Option<DoctorIdentity>> {
        let mut tables = self.tables.write().await;
        let Some(doctor) = tables.doctors.get_mut(&id) else {
            return Ok(None);
        };
        doctor.status = update.status;
        Self::apply_uid_change(&mut doctor.uid, &update.uid);
        doctor.profile = update.profile;
        doctor.updated_at = Utc::now();
        Ok(Some(doctor.clone()))
    }

    async fn find_patient(&self, id: i64) -> StoreResult<Option<PatientIdentity>> {
        let tables = self.tables.read().await;
        Ok(tables.patients.get(&id).cloned())
    }

    async fn insert_patient(&self, new: NewPatient) -> StoreResult<PatientIdentity> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let patient = PatientIdentity {
            id: self.allocate_id(),
            email: new.email,
            password_hash: new.password_hash,
            status: AccountStatus::Pending,
            uid: None,
            practitioner_id: new.practitioner_id,
            invite_token: new.invite_token,
            profile: new.profile,
            created_at: now,
            updated_at: now,
        };
        tables.patients.insert(patient.id, patient.clone());
        Ok(patient)
    }

    async fn apply_patient_review(
        &self,
        id: i64,
        update: ReviewUpdate,
    ) -> StoreResult<Option<PatientIdentity>> {
        let mut tables = self.tables.write().await;
        let Some(patient) = tables.patients.get_mut(&id) else {
            return Ok(None);
        };
        patient.status = update.status;
        Self::apply_uid_change(&mut patient.uid, &update.uid);
        patient.profile = update.profile;
        patient.updated_at = Utc::now();
        Ok(Some(patient.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use domain::models::invite::{generate_token, InviteRole, IssuerKind};
    use serde_json::json;

    fn sample_invite(expires_in: Duration) -> NewInvite {
        NewInvite {
            token: generate_token(),
            role: InviteRole::Doctor,
            issuer_kind: IssuerKind::Admin,
            issuer_id: 1,
            practitioner_id: None,
            recipient_email: None,
            recipient_name: None,
            expires_at: Utc::now() + expires_in,
        }
    }

    fn sample_doctor(email: &str) -> NewDoctor {
        NewDoctor {
            email: email.to_string(),
            password_hash: "hash".to_string(),
            invite_token: "reg_test".to_string(),
            profile: json!({"full_name": "Dr. Test"}),
        }
    }

    #[tokio::test]
    async fn mark_used_is_idempotent_and_reports_missing_tokens() {
        let store = InMemoryStore::new();
        let invite = store.insert(sample_invite(Duration::hours(3))).await.unwrap();

        assert!(store.mark_used(&invite.token).await.unwrap());
        assert!(store.mark_used(&invite.token).await.unwrap());
        assert!(!store.mark_used("reg_missing").await.unwrap());

        let found = store.find_by_token(&invite.token).await.unwrap().unwrap();
        assert!(found.used);
    }

    #[tokio::test]
    async fn delete_expired_before_keeps_unexpired_rows() {
        let store = InMemoryStore::new();
        let stale = store.insert(sample_invite(Duration::hours(-48))).await.unwrap();
        let fresh = store.insert(sample_invite(Duration::hours(3))).await.unwrap();

        let removed = store
            .delete_expired_before(Utc::now() - Duration::hours(24))
            .await
            .unwrap();

        assert_eq!(removed, 1);
        assert!(store.find_by_token(&stale.token).await.unwrap().is_none());
        assert!(store.find_by_token(&fresh.token).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn delete_expired_before_includes_exact_cutoff() {
        let store = InMemoryStore::new();
        let cutoff = Utc::now() - Duration::hours(24);
        let mut boundary = sample_invite(Duration::zero());
        boundary.expires_at = cutoff;
        let boundary = store.insert(boundary).await.unwrap();

        let removed = store.delete_expired_before(cutoff).await.unwrap();

        assert_eq!(removed, 1);
        assert!(store.find_by_token(&boundary.token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_doctor_email_is_rejected() {
        let store = InMemoryStore::new();
        store.insert_doctor(sample_doctor("a@clinic.test")).await.unwrap();

        let err = store
            .insert_doctor(sample_doctor("a@clinic.test"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::EmailInUse(_)));
    }

    #[tokio::test]
    async fn reregistration_keeps_the_row_id_and_resets_review_state() {
        let store = InMemoryStore::new();
        let doctor = store.insert_doctor(sample_doctor("old@clinic.test")).await.unwrap();
        store
            .apply_doctor_review(
                doctor.id,
                ReviewUpdate {
                    status: AccountStatus::Rejected,
                    uid: UidChange::Clear,
                    profile: doctor.profile.clone(),
                },
            )
            .await
            .unwrap();

        let updated = store
            .reregister_doctor(
                doctor.id,
                DoctorReregistration {
                    email: "new@clinic.test".to_string(),
                    password_hash: "hash2".to_string(),
                    invite_token: "reg_again".to_string(),
                    profile: json!({"full_name": "Dr. Test"}),
                },
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.id, doctor.id);
        assert_eq!(updated.email, "new@clinic.test");
        assert_eq!(updated.status, AccountStatus::Pending);
        assert!(updated.uid.is_none());
    }

    #[tokio::test]
    async fn patient_emails_may_repeat() {
        let store = InMemoryStore::new();
        let shared = NewPatient {
            email: "family@example.test".to_string(),
            password_hash: "hash".to_string(),
            practitioner_id: None,
            invite_token: None,
            profile: json!({"full_name": "Pat One"}),
        };
        let first = store.insert_patient(shared.clone()).await.unwrap();
        let second = store.insert_patient(shared).await.unwrap();
        assert_ne!(first.id, second.id);

        let owners = store.owners_of_email("family@example.test").await.unwrap();
        assert_eq!(owners.len(), 2);
        assert!(owners.iter().all(|o| o.kind == IdentityKind::Patient));
    }

    #[tokio::test]
    async fn owners_of_email_spans_all_collections() {
        let store = InMemoryStore::new();
        store.seed_admin("admin@clinic.test", "hash").await;
        store.insert_doctor(sample_doctor("doc@clinic.test")).await.unwrap();

        let admin_owners = store.owners_of_email("admin@clinic.test").await.unwrap();
        assert_eq!(admin_owners.len(), 1);
        assert_eq!(admin_owners[0].kind, IdentityKind::Admin);
        assert_eq!(admin_owners[0].status, AccountStatus::Approved);

        assert!(store.owners_of_email("nobody@clinic.test").await.unwrap().is_empty());
    }
}
