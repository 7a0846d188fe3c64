pub mod approvals;
pub mod health;
pub mod invites;
pub mod registration;
