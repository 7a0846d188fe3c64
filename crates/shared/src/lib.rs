//! Shared utilities and common types for the Practice Portal backend.
//!
//! This crate provides common functionality used across all other crates:
//! - Password hashing with Argon2id
//! - Email normalization and common validation logic

pub mod password;
pub mod validation;
