//! Account review state machine for doctors and patients.
//!
//! PENDING -> APPROVED | REJECTED, APPROVED -> DEACTIVATED -> APPROVED, plus
//! an explicit administrative revert. Doctor and patient transitions share
//! shape; only the UID prefix differs, and only doctors lose their UID on
//! rejection.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use domain::error::DomainError;
use domain::models::identity::{
    public_uid, record_approval, record_deactivation, record_rejection, record_revert,
    AccountStatus, SubjectKind,
};
use domain::services::notification::{NotificationQueue, StatusChangeEvent};
use domain::store::{IdentityStore, ReviewUpdate, UidChange};

use crate::middleware::metrics::record_status_transition;

/// Public view of a reviewed account returned by the review endpoints.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct AccountView {
    pub kind: SubjectKind,
    pub id: i64,
    pub email: String,
    pub status: AccountStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
}

/// Snapshot of the fields the state machine reads, independent of kind.
struct Subject {
    email: String,
    status: AccountStatus,
    uid: Option<String>,
    profile: Value,
    name: Option<String>,
}

/// Drives review transitions and emits notification events.
#[derive(Clone)]
pub struct ApprovalService {
    identities: Arc<dyn IdentityStore>,
    queue: NotificationQueue,
}

impl ApprovalService {
    pub fn new(identities: Arc<dyn IdentityStore>, queue: NotificationQueue) -> Self {
        Self { identities, queue }
    }

    /// Approve an account. Assigns the public identifier on first approval;
    /// a UID retained across deactivation is preserved. Approving an
    /// already-approved account is an idempotent no-op.
    pub async fn approve(&self, kind: SubjectKind, id: i64) -> Result<AccountView, DomainError> {
        let subject = self.fetch(kind, id).await?;
        if subject.status == AccountStatus::Approved {
            return Ok(view(kind, id, &subject));
        }

        let uid = match &subject.uid {
            Some(_) => UidChange::Keep,
            None => UidChange::Set(public_uid(kind, id)),
        };
        let update = ReviewUpdate {
            status: AccountStatus::Approved,
            uid,
            profile: record_approval(subject.profile.clone(), Utc::now()),
        };
        self.commit(kind, id, subject, update, None).await
    }

    /// Reject an account from any state, recording the reason. A doctor's
    /// UID is cleared so it can be reassigned; a patient's is left untouched.
    pub async fn reject(
        &self,
        kind: SubjectKind,
        id: i64,
        reason: &str,
    ) -> Result<AccountView, DomainError> {
        let subject = self.fetch(kind, id).await?;

        let uid = match kind {
            SubjectKind::Doctor => UidChange::Clear,
            SubjectKind::Patient => UidChange::Keep,
        };
        let update = ReviewUpdate {
            status: AccountStatus::Rejected,
            uid,
            profile: record_rejection(subject.profile.clone(), reason, Utc::now()),
        };
        self.commit(kind, id, subject, update, Some(reason.to_string()))
            .await
    }

    /// Deactivate an approved account. The UID stays in storage so a later
    /// re-approval restores the same public identifier.
    pub async fn deactivate(&self, kind: SubjectKind, id: i64) -> Result<AccountView, DomainError> {
        let subject = self.fetch(kind, id).await?;
        if subject.status != AccountStatus::Approved {
            return Err(DomainError::InvalidStatus(format!(
                "only approved accounts can be deactivated (current status: {})",
                subject.status
            )));
        }

        let update = ReviewUpdate {
            status: AccountStatus::Deactivated,
            uid: UidChange::Keep,
            profile: record_deactivation(subject.profile.clone(), subject.status, Utc::now()),
        };
        self.commit(kind, id, subject, update, None).await
    }

    /// Administrative correction to an explicit target status. The UID is
    /// adjusted exactly as approve/reject would for the target state;
    /// reverting a doctor to PENDING also clears the UID.
    pub async fn revert(
        &self,
        kind: SubjectKind,
        id: i64,
        new_status: AccountStatus,
        reason: Option<&str>,
    ) -> Result<AccountView, DomainError> {
        if new_status == AccountStatus::Deactivated {
            return Err(DomainError::InvalidStatus(
                "cannot revert to deactivated; use the deactivate operation".to_string(),
            ));
        }

        let subject = self.fetch(kind, id).await?;
        let uid = match (new_status, kind) {
            (AccountStatus::Approved, _) => match &subject.uid {
                Some(_) => UidChange::Keep,
                None => UidChange::Set(public_uid(kind, id)),
            },
            (_, SubjectKind::Doctor) => UidChange::Clear,
            (_, SubjectKind::Patient) => UidChange::Keep,
        };
        let update = ReviewUpdate {
            status: new_status,
            uid,
            profile: record_revert(
                subject.profile.clone(),
                subject.status,
                new_status,
                reason,
                Utc::now(),
            ),
        };
        self.commit(kind, id, subject, update, reason.map(|r| r.to_string()))
            .await
    }

    async fn fetch(&self, kind: SubjectKind, id: i64) -> Result<Subject, DomainError> {
        let not_found = || DomainError::NotFound(kind.to_string());
        let subject = match kind {
            SubjectKind::Doctor => {
                let d = self.identities.find_doctor(id).await?.ok_or_else(not_found)?;
                Subject {
                    name: profile_name(&d.profile),
                    email: d.email,
                    status: d.status,
                    uid: d.uid,
                    profile: d.profile,
                }
            }
            SubjectKind::Patient => {
                let p = self.identities.find_patient(id).await?.ok_or_else(not_found)?;
                Subject {
                    name: profile_name(&p.profile),
                    email: p.email,
                    status: p.status,
                    uid: p.uid,
                    profile: p.profile,
                }
            }
        };
        Ok(subject)
    }

    async fn commit(
        &self,
        kind: SubjectKind,
        id: i64,
        subject: Subject,
        update: ReviewUpdate,
        reason: Option<String>,
    ) -> Result<AccountView, DomainError> {
        let not_found = || DomainError::NotFound(kind.to_string());
        let (email, status, uid) = match kind {
            SubjectKind::Doctor => {
                let d = self
                    .identities
                    .apply_doctor_review(id, update)
                    .await?
                    .ok_or_else(not_found)?;
                (d.email, d.status, d.uid)
            }
            SubjectKind::Patient => {
                let p = self
                    .identities
                    .apply_patient_review(id, update)
                    .await?
                    .ok_or_else(not_found)?;
                (p.email, p.status, p.uid)
            }
        };

        info!(kind = %kind, id, from = %subject.status, to = %status, "Account status changed");
        record_status_transition(&kind.to_string(), &status.to_string());
        self.queue.push(StatusChangeEvent {
            kind,
            id,
            email: email.clone(),
            name: subject.name,
            status,
            reason,
            occurred_at: Utc::now(),
        });

        Ok(AccountView {
            kind,
            id,
            email,
            status,
            uid,
        })
    }
}

fn profile_name(profile: &Value) -> Option<String> {
    profile
        .get("full_name")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

fn view(kind: SubjectKind, id: i64, subject: &Subject) -> AccountView {
    AccountView {
        kind,
        id,
        email: subject.email.clone(),
        status: subject.status,
        uid: subject.uid.clone(),
    }
}
