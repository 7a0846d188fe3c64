//! End-to-end onboarding flows over the in-memory store: invite issuance,
//! registration, review transitions and invite sweeping, wired through the
//! real services.

use std::sync::Arc;

use practice_portal_api::config::{EmailConfig, InviteConfig};
use practice_portal_api::services::{
    ApprovalService, EmailService, InviteService, RegistrationService,
};

use chrono::{Duration, Utc};
use domain::error::{DomainError, TokenRejection};
use domain::models::identity::{AccountStatus, RegistrationForm, SubjectKind};
use domain::models::invite::{InviteRole, IssueInviteRequest, IssuerKind, NewInvite};
use domain::services::notification::NotificationQueue;
use domain::store::{IdentityStore, InviteStore};
use persistence::memory::InMemoryStore;
use serde_json::json;

struct Stack {
    store: InMemoryStore,
    invites: InviteService,
    registration: RegistrationService,
    approval: ApprovalService,
}

fn stack() -> Stack {
    let store = InMemoryStore::new();
    let invites = InviteService::new(
        Arc::new(store.clone()),
        EmailService::new(EmailConfig::default()),
        &InviteConfig::default(),
    );
    let (queue, _rx) = NotificationQueue::new();
    let registration =
        RegistrationService::new(invites.clone(), Arc::new(store.clone()), queue.clone());
    let approval = ApprovalService::new(Arc::new(store.clone()), queue);
    Stack {
        store,
        invites,
        registration,
        approval,
    }
}

fn form(email: &str, name: &str) -> RegistrationForm {
    RegistrationForm {
        email: email.to_string(),
        password: "correct horse battery".to_string(),
        full_name: name.to_string(),
        profile: json!({}),
    }
}

async fn issue(stack: &Stack, role: &str, issuer_kind: &str, practitioner_id: Option<i64>) -> String {
    stack
        .invites
        .issue(IssueInviteRequest {
            role: role.to_string(),
            issuer_kind: issuer_kind.to_string(),
            issuer_id: 1,
            practitioner_id,
            recipient_email: None,
            recipient_name: None,
        })
        .await
        .unwrap()
        .token
}

#[tokio::test]
async fn test_full_doctor_onboarding_pipeline() {
    let stack = stack();

    // Admin issues a doctor invite, the doctor registers and lands pending.
    let token = issue(&stack, "doctor", "admin", None).await;
    let outcome = stack
        .registration
        .register_doctor(&token, form("gregor@clinic.test", "Gregor Hall"))
        .await
        .unwrap();
    assert_eq!(outcome.status, AccountStatus::Pending);

    // The token is consumed and rejects a second registration.
    let err = stack
        .registration
        .register_doctor(&token, form("other@clinic.test", "Other Person"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DomainError::InvalidToken(TokenRejection::AlreadyUsed)
    ));

    // Approval assigns the public identifier.
    let view = stack
        .approval
        .approve(SubjectKind::Doctor, outcome.id)
        .await
        .unwrap();
    assert_eq!(view.uid.as_deref(), Some(format!("DOC{:05}", outcome.id).as_str()));

    // The approved doctor can now issue patient invites bound to themselves.
    let patient_token = issue(&stack, "patient", "doctor", Some(outcome.id)).await;
    let patient = stack
        .registration
        .register_patient(Some(patient_token.as_str()), None, form("pat@example.test", "Pat Low"))
        .await
        .unwrap();

    let stored = stack.store.find_patient(patient.id).await.unwrap().unwrap();
    assert_eq!(stored.practitioner_id, Some(outcome.id));
}

#[tokio::test]
async fn test_rejected_doctor_reinvite_keeps_row_and_uid_history() {
    let stack = stack();

    let token = issue(&stack, "doctor", "admin", None).await;
    let first = stack
        .registration
        .register_doctor(&token, form("dana@clinic.test", "Dana Voss"))
        .await
        .unwrap();

    stack
        .approval
        .reject(SubjectKind::Doctor, first.id, "incomplete license details")
        .await
        .unwrap();

    // Re-invite bound to the rejected doctor's email; registration reuses
    // the same row even under a new address.
    let retoken = stack
        .invites
        .issue(IssueInviteRequest {
            role: "doctor".to_string(),
            issuer_kind: "admin".to_string(),
            issuer_id: 1,
            practitioner_id: None,
            recipient_email: Some("dana@clinic.test".to_string()),
            recipient_name: None,
        })
        .await
        .unwrap()
        .token;

    let second = stack
        .registration
        .register_doctor(&retoken, form("dana.voss@clinic.test", "Dana Voss"))
        .await
        .unwrap();
    assert_eq!(second.id, first.id);
    assert_eq!(second.status, AccountStatus::Pending);

    // The rejection cleared the UID, so a fresh approval mints it again
    // from the same row id.
    let view = stack
        .approval
        .approve(SubjectKind::Doctor, second.id)
        .await
        .unwrap();
    assert_eq!(view.uid.as_deref(), Some(format!("DOC{:05}", first.id).as_str()));
}

#[tokio::test]
async fn test_uid_survives_deactivation_cycle() {
    let stack = stack();

    let token = issue(&stack, "doctor", "admin", None).await;
    let outcome = stack
        .registration
        .register_doctor(&token, form("kim@clinic.test", "Kim Ortiz"))
        .await
        .unwrap();

    let approved = stack
        .approval
        .approve(SubjectKind::Doctor, outcome.id)
        .await
        .unwrap();
    stack
        .approval
        .deactivate(SubjectKind::Doctor, outcome.id)
        .await
        .unwrap();
    let restored = stack
        .approval
        .approve(SubjectKind::Doctor, outcome.id)
        .await
        .unwrap();

    assert_eq!(approved.uid, restored.uid);
    assert_eq!(restored.status, AccountStatus::Approved);
}

fn expired_invite(token: &str, age: Duration) -> NewInvite {
    NewInvite {
        token: token.to_string(),
        role: InviteRole::Patient,
        issuer_kind: IssuerKind::Admin,
        issuer_id: 1,
        practitioner_id: None,
        recipient_email: None,
        recipient_name: None,
        expires_at: Utc::now() - age,
    }
}

#[tokio::test]
async fn test_sweep_spares_tokens_inside_grace_window() {
    let stack = stack();

    // A live token, one expired inside the 24h grace window, one past it.
    let live = issue(&stack, "patient", "admin", None).await;
    stack
        .store
        .insert(expired_invite("reg_stale_within_grace", Duration::hours(2)))
        .await
        .unwrap();
    stack
        .store
        .insert(expired_invite("reg_stale_past_grace", Duration::hours(30)))
        .await
        .unwrap();

    let deleted = stack.invites.sweep().await.unwrap();
    assert_eq!(deleted, 1);

    // Redeemable and in-grace tokens are untouched.
    assert!(stack.store.find_by_token(&live).await.unwrap().is_some());
    assert!(stack
        .store
        .find_by_token("reg_stale_within_grace")
        .await
        .unwrap()
        .is_some());
    assert!(stack
        .store
        .find_by_token("reg_stale_past_grace")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_doctor_email_conflicts_span_roles() {
    let stack = stack();

    let token = issue(&stack, "patient", "admin", None).await;
    stack
        .registration
        .register_patient(Some(token.as_str()), None, form("shared@example.test", "Pat Shared"))
        .await
        .unwrap();

    // A doctor cannot register under an email a patient already holds.
    let dtoken = issue(&stack, "doctor", "admin", None).await;
    let err = stack
        .registration
        .register_doctor(&dtoken, form("shared@example.test", "Doc Shared"))
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::EmailInUse(_)));

    // The failed registration never consumed the invite.
    let outcome = stack
        .registration
        .register_doctor(&dtoken, form("unshared@clinic.test", "Doc Shared"))
        .await
        .unwrap();
    assert_eq!(outcome.status, AccountStatus::Pending);
}
