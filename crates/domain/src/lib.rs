//! Domain layer for the Atelier events backend.
//!
//! This crate contains:
//! - Domain models (Event, User, Organization, Attendance)
//! - Repository traits and an in-memory store
//! - The attendance transition engine and notification seam

pub mod models;
pub mod repositories;
pub mod services;
