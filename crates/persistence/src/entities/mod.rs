//! Entity definitions (database row mappings).

pub mod identity;
pub mod invite;

pub use identity::{DoctorEntity, EmailOwnerRow, PatientEntity};
pub use invite::InviteTokenEntity;
