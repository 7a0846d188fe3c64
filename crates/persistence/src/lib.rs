//! Persistence layer for the Practice Portal backend.
//!
//! This crate contains:
//! - Database connection management
//! - Entity definitions (database row mappings)
//! - Repository implementations of the domain store traits
//! - An in-memory store for tests and local development

pub mod db;
pub mod entities;
pub mod memory;
pub mod metrics;
pub mod repositories;
