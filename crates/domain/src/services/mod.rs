//! Domain services and policies.

pub mod directory;
pub mod notification;
