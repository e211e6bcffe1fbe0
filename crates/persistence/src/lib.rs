//! Persistence layer for the Atelier events backend.
//!
//! This crate contains:
//! - Database connection management and migrations
//! - Entity definitions (database row mappings)
//! - PostgreSQL implementations of the domain repository traits

pub mod db;
pub mod entities;
pub mod metrics;
pub mod repositories;
