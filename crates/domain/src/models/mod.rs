//! Domain models.

pub mod identity;
pub mod invite;

pub use identity::{
    AccountStatus, AdminIdentity, DoctorIdentity, EmailOwner, IdentityKind, PatientIdentity,
    RegistrationForm, RegistrationOutcome, SubjectKind,
};
pub use invite::{InviteRole, InviteSummary, InviteToken, IssueInviteRequest, IssuerKind};
