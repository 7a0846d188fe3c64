//! Domain layer for the Practice Portal backend.
//!
//! This crate contains:
//! - Domain models (invite tokens, identities, account status)
//! - Store traits implemented by the persistence layer
//! - Domain error types
//! - Notification events and the outbound dispatch queue

pub mod error;
pub mod models;
pub mod services;
pub mod store;

pub use error::{DomainError, EmailConflict, TokenRejection};
