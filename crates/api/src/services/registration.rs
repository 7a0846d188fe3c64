//! Registration resolver: converts a redeemed invite plus a submitted form
//! into an identity row.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use validator::Validate;

use domain::error::DomainError;
use domain::models::identity::{
    is_valid_uid, registration_profile, reregistration_profile, AccountStatus, DoctorIdentity,
    RegistrationForm, RegistrationOutcome, SubjectKind,
};
use domain::models::invite::InviteRole;
use domain::services::directory::{doctor_email_conflict, patient_email_conflict};
use domain::services::notification::{NotificationQueue, StatusChangeEvent};
use domain::store::{DoctorReregistration, IdentityStore, NewDoctor, NewPatient};
use shared::validation::normalize_email;

use crate::middleware::metrics::record_registration;
use crate::services::invites::InviteService;

/// Resolves registrations for both onboarding flows.
#[derive(Clone)]
pub struct RegistrationService {
    invites: InviteService,
    identities: Arc<dyn IdentityStore>,
    queue: NotificationQueue,
}

impl RegistrationService {
    pub fn new(
        invites: InviteService,
        identities: Arc<dyn IdentityStore>,
        queue: NotificationQueue,
    ) -> Self {
        Self {
            invites,
            identities,
            queue,
        }
    }

    /// Register a doctor from an invite token.
    ///
    /// A rejected doctor re-registers into their existing row: the invite's
    /// bound recipient email names the target, falling back to the submitted
    /// email when the invite is unbound. The row's primary key never changes,
    /// even when the email does.
    pub async fn register_doctor(
        &self,
        token: &str,
        form: RegistrationForm,
    ) -> Result<RegistrationOutcome, DomainError> {
        form.validate()?;
        let invite = self.invites.redeem(token, InviteRole::Doctor).await?;
        let email = normalize_email(&form.email);
        let now = Utc::now();

        let target = self.reregistration_target(&invite.recipient_email, &email).await?;

        let owners = self.identities.owners_of_email(&email).await?;
        doctor_email_conflict(&owners, target.as_ref().map(|d| d.id))?;

        let password_hash = hash(&form.password)?;

        let doctor = match target {
            Some(prior) => {
                let previous_email = (prior.email != email).then(|| prior.email.clone());
                let profile = reregistration_profile(
                    prior.profile.clone(),
                    &form,
                    token,
                    previous_email.as_deref(),
                    now,
                );
                self.identities
                    .reregister_doctor(
                        prior.id,
                        DoctorReregistration {
                            email: email.clone(),
                            password_hash,
                            invite_token: token.to_string(),
                            profile,
                        },
                    )
                    .await?
                    .ok_or_else(|| DomainError::NotFound("doctor".to_string()))?
            }
            None => {
                let profile = registration_profile(
                    &form,
                    Some(token),
                    &format!("{}:{}", invite.issuer_kind, invite.issuer_id),
                    now,
                );
                self.identities
                    .insert_doctor(NewDoctor {
                        email: email.clone(),
                        password_hash,
                        invite_token: token.to_string(),
                        profile,
                    })
                    .await?
            }
        };

        // The identity write has committed; consuming the token is now safe.
        self.invites.mark_used(token).await?;

        info!(id = doctor.id, "Doctor registration accepted");
        record_registration("doctor");
        self.queue.push(StatusChangeEvent {
            kind: SubjectKind::Doctor,
            id: doctor.id,
            email: doctor.email.clone(),
            name: Some(form.full_name),
            status: doctor.status,
            reason: None,
            occurred_at: now,
        });

        Ok(RegistrationOutcome {
            id: doctor.id,
            email: doctor.email,
            status: doctor.status,
        })
    }

    /// Register a patient, either from an invite token or manually against an
    /// approved practitioner's public identifier. Exactly one credential must
    /// be supplied.
    pub async fn register_patient(
        &self,
        token: Option<&str>,
        practitioner_uid: Option<&str>,
        form: RegistrationForm,
    ) -> Result<RegistrationOutcome, DomainError> {
        form.validate()?;
        let email = normalize_email(&form.email);
        let now = Utc::now();

        let (practitioner_id, issued_by) = match (token, practitioner_uid) {
            (Some(token), None) => {
                let invite = self.invites.redeem(token, InviteRole::Patient).await?;
                (
                    invite.practitioner_id,
                    format!("{}:{}", invite.issuer_kind, invite.issuer_id),
                )
            }
            (None, Some(uid)) => {
                let doctor = self.approved_practitioner(uid).await?;
                (Some(doctor.id), format!("practitioner:{}", uid))
            }
            _ => return Err(DomainError::MissingCredential),
        };

        let owners = self.identities.owners_of_email(&email).await?;
        patient_email_conflict(&owners)?;

        let password_hash = hash(&form.password)?;
        let profile = registration_profile(&form, token, &issued_by, now);

        let patient = self
            .identities
            .insert_patient(NewPatient {
                email: email.clone(),
                password_hash,
                practitioner_id,
                invite_token: token.map(|t| t.to_string()),
                profile,
            })
            .await?;

        if let Some(token) = token {
            self.invites.mark_used(token).await?;
        }

        info!(id = patient.id, "Patient registration accepted");
        record_registration("patient");
        self.queue.push(StatusChangeEvent {
            kind: SubjectKind::Patient,
            id: patient.id,
            email: patient.email.clone(),
            name: Some(form.full_name),
            status: patient.status,
            reason: None,
            occurred_at: now,
        });

        Ok(RegistrationOutcome {
            id: patient.id,
            email: patient.email,
            status: patient.status,
        })
    }

    /// Locates the rejected doctor row this registration updates in place,
    /// if any. An invite bound to a recipient names its target exclusively;
    /// only an unbound invite falls back to the submitted address. Both
    /// lookups match REJECTED rows only, so a bound invite for a different
    /// recipient leaves a rejected submitted-email row to the conflict check.
    async fn reregistration_target(
        &self,
        bound_email: &Option<String>,
        submitted_email: &str,
    ) -> Result<Option<DoctorIdentity>, DomainError> {
        if let Some(bound) = bound_email {
            let bound = normalize_email(bound);
            if let Some(doctor) = self.identities.find_doctor_by_email(&bound).await? {
                if doctor.status == AccountStatus::Rejected {
                    return Ok(Some(doctor));
                }
            }
            return Ok(None);
        }
        if let Some(doctor) = self.identities.find_doctor_by_email(submitted_email).await? {
            if doctor.status == AccountStatus::Rejected {
                return Ok(Some(doctor));
            }
        }
        Ok(None)
    }

    async fn approved_practitioner(&self, uid: &str) -> Result<DoctorIdentity, DomainError> {
        if !is_valid_uid(uid) {
            return Err(DomainError::PractitionerNotFound(uid.to_string()));
        }
        let doctor = self
            .identities
            .find_doctor_by_uid(uid)
            .await?
            .ok_or_else(|| DomainError::PractitionerNotFound(uid.to_string()))?;
        if doctor.status != AccountStatus::Approved {
            return Err(DomainError::PractitionerNotFound(uid.to_string()));
        }
        Ok(doctor)
    }
}

fn hash(password: &str) -> Result<String, DomainError> {
    shared::password::hash_password(password)
        .map_err(|e| DomainError::Validation(format!("password hashing failed: {}", e)))
}
