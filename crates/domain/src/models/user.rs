//! User domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

pub type UserId = i64;

/// User domain model.
///
/// A user with an empty first name is a temporary account, created only so
/// that a guest can receive booking links by email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Temporary users have never filled in their name.
    pub fn is_temporary(&self) -> bool {
        self.first_name.trim().is_empty()
    }

    /// Name used in greetings, if any.
    pub fn display_name(&self) -> Option<String> {
        let full = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let full = full.trim();
        if full.is_empty() {
            None
        } else {
            Some(full.to_string())
        }
    }
}

/// Data for inserting a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

impl NewUser {
    /// A placeholder account for a guest booking.
    pub fn temporary(email: &str) -> Self {
        Self {
            email: shared::validation::normalize_email(email),
            first_name: String::new(),
            last_name: String::new(),
        }
    }
}

/// Request to book an event with only an email address.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BookByEmailRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(first: &str, last: &str) -> User {
        User {
            id: 1,
            email: "user@example.com".to_string(),
            first_name: first.to_string(),
            last_name: last.to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_is_temporary() {
        assert!(user("", "").is_temporary());
        assert!(user("  ", "Doe").is_temporary());
        assert!(!user("Jane", "").is_temporary());
    }

    #[test]
    fn test_display_name() {
        assert_eq!(user("Jane", "Doe").display_name().as_deref(), Some("Jane Doe"));
        assert_eq!(user("Jane", "").display_name().as_deref(), Some("Jane"));
        assert_eq!(user("", "").display_name(), None);
    }

    #[test]
    fn test_temporary_new_user_normalizes_email() {
        let new_user = NewUser::temporary(" Guest@Example.org ");
        assert_eq!(new_user.email, "guest@example.org");
        assert!(new_user.first_name.is_empty());
    }

    #[test]
    fn test_book_by_email_request_validation() {
        let valid = BookByEmailRequest {
            email: "guest@example.org".to_string(),
        };
        assert!(valid.validate().is_ok());

        let invalid = BookByEmailRequest {
            email: "not-an-email".to_string(),
        };
        assert!(invalid.validate().is_err());
    }
}
