//! Shared utilities and common types for the Atelier events backend.
//!
//! This crate provides common functionality used across all other crates:
//! - Purpose-scoped signed tokens for emailed action links
//! - Verification of identity-provider JWTs
//! - Common validation logic

pub mod jwt;
pub mod signing;
pub mod validation;
