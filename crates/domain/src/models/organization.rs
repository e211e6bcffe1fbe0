//! Organization and membership domain models.
//!
//! Membership roles form a ladder: visitor < member < volunteer < admin.
//! Route-level permission checks are explicit guards built with
//! [`require_role`] and evaluated against the caller's membership.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;
use validator::Validate;

use super::user::UserId;

pub type OrganizationId = i64;

/// Roles for organization members, ordered by privilege.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrgRole {
    Visitor,
    Member,
    Volunteer,
    Admin,
}

impl OrgRole {
    /// Check if this role has at least the specified role level.
    pub fn has_at_least(&self, required: OrgRole) -> bool {
        *self >= required
    }

    /// Staff can manage events (volunteers and admins).
    pub fn is_staff(&self) -> bool {
        self.has_at_least(OrgRole::Volunteer)
    }
}

impl FromStr for OrgRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "visitor" => Ok(OrgRole::Visitor),
            "member" => Ok(OrgRole::Member),
            "volunteer" => Ok(OrgRole::Volunteer),
            "admin" => Ok(OrgRole::Admin),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

impl std::fmt::Display for OrgRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrgRole::Visitor => write!(f, "visitor"),
            OrgRole::Member => write!(f, "member"),
            OrgRole::Volunteer => write!(f, "volunteer"),
            OrgRole::Admin => write!(f, "admin"),
        }
    }
}

/// Organization domain model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub id: OrganizationId,
    pub name: String,
    pub slug: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// A user's role in an organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    pub organization_id: OrganizationId,
    pub user_id: UserId,
    pub role: OrgRole,
    pub granted_at: DateTime<Utc>,
}

/// Request to set a member's role.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SetMemberRoleRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    pub role: OrgRole,
}

/// Why a guard refused access.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuardError {
    #[error("Not a member of this organization")]
    NotAMember,

    #[error("Insufficient permissions. Required role: {required} or higher")]
    InsufficientRole { required: OrgRole, actual: OrgRole },
}

/// Permission check requiring a minimum role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleGuard {
    required: OrgRole,
}

/// Builds a guard requiring at least `role`.
pub fn require_role(role: OrgRole) -> RoleGuard {
    RoleGuard { required: role }
}

impl RoleGuard {
    pub fn required(&self) -> OrgRole {
        self.required
    }

    /// Checks the caller's role (None when not a member).
    pub fn check(&self, role: Option<OrgRole>) -> Result<OrgRole, GuardError> {
        let actual = role.ok_or(GuardError::NotAMember)?;
        if actual.has_at_least(self.required) {
            Ok(actual)
        } else {
            Err(GuardError::InsufficientRole {
                required: self.required,
                actual,
            })
        }
    }
}
