//! sqlx-backed repositories implementing the domain store traits.

pub mod identity;
pub mod invite;

pub use identity::PgIdentityRepository;
pub use invite::PgInviteRepository;
