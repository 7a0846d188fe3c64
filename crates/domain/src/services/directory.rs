//! Email-uniqueness policy over the identity directory.
//!
//! One normalized email may be active in at most one of {admin,
//! doctor(non-rejected), patient}, with two deliberate carve-outs:
//! - a rejected doctor's email is released, but only to the re-registration
//!   of that same row;
//! - patient emails may repeat within the patient collection (family members
//!   sharing an address).
//!
//! These are pure functions over directory lookups so the policy can be
//! tested in isolation from any store.

use crate::error::{DomainError, EmailConflict};
use crate::models::identity::{AccountStatus, EmailOwner, IdentityKind};

/// Checks whether `owners` permit a doctor registration with this email.
///
/// `reregistering` names the rejected doctor row this invite updates in
/// place, if any; that row's own claim on the email is not a conflict.
/// A rejected doctor row other than the target yields the actionable
/// "use your re-registration link" conflict.
pub fn doctor_email_conflict(
    owners: &[EmailOwner],
    reregistering: Option<i64>,
) -> Result<(), DomainError> {
    for owner in owners {
        let conflict = match owner.kind {
            IdentityKind::Admin => Some(EmailConflict::Admin),
            IdentityKind::Patient => Some(EmailConflict::Patient),
            IdentityKind::Doctor => {
                if reregistering == Some(owner.id) {
                    None
                } else if owner.status == AccountStatus::Rejected {
                    Some(EmailConflict::RejectedAwaitingReinvite)
                } else {
                    Some(EmailConflict::Doctor(owner.status))
                }
            }
        };
        if let Some(conflict) = conflict {
            return Err(DomainError::EmailInUse(conflict));
        }
    }
    Ok(())
}

/// Checks whether `owners` permit a patient registration with this email.
///
/// Deliberately weaker than the doctor rule: existing patients never block,
/// and a rejected doctor's email is usable for a patient account.
pub fn patient_email_conflict(owners: &[EmailOwner]) -> Result<(), DomainError> {
    for owner in owners {
        let conflict = match owner.kind {
            IdentityKind::Admin => Some(EmailConflict::Admin),
            IdentityKind::Patient => None,
            IdentityKind::Doctor => {
                if owner.status == AccountStatus::Rejected {
                    None
                } else {
                    Some(EmailConflict::Doctor(owner.status))
                }
            }
        };
        if let Some(conflict) = conflict {
            return Err(DomainError::EmailInUse(conflict));
        }
    }
    Ok(())
}
