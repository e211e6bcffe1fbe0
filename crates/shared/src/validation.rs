//! Common validation utilities.

use chrono::{DateTime, Utc};
use validator::ValidationError;

/// Upper bound for the number of seats of a single event.
const MAX_EVENT_CAPACITY: i32 = 10_000;

/// Validates that an event capacity is within range (0 to 10 000).
pub fn validate_capacity(capacity: i32) -> Result<(), ValidationError> {
    if (0..=MAX_EVENT_CAPACITY).contains(&capacity) {
        Ok(())
    } else {
        let mut err = ValidationError::new("capacity_range");
        err.message = Some("Capacity must be between 0 and 10000".into());
        Err(err)
    }
}

/// Validates that a string contains something other than whitespace.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Value must not be blank".into());
        Err(err)
    } else {
        Ok(())
    }
}

/// Validates that an event ends after it starts.
pub fn validate_time_window(
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
) -> Result<(), ValidationError> {
    if ends_at > starts_at {
        Ok(())
    } else {
        let mut err = ValidationError::new("time_window");
        err.message = Some("Event must end after it starts".into());
        Err(err)
    }
}

/// Normalizes an email address for storage and lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Builds a URL slug: lowercase ASCII alphanumerics separated by single dashes.
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut pending_dash = false;

    for c in value.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}
