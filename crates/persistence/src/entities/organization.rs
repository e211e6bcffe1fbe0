//! Organization and membership entities (database row mappings).

use chrono::{DateTime, Utc};
use domain::models::OrgRole;
use sqlx::FromRow;

/// Database enum for org_role that maps to PostgreSQL enum type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "org_role", rename_all = "lowercase")]
pub enum OrgRoleDb {
    Visitor,
    Member,
    Volunteer,
    Admin,
}

impl From<OrgRoleDb> for OrgRole {
    fn from(db_role: OrgRoleDb) -> Self {
        match db_role {
            OrgRoleDb::Visitor => OrgRole::Visitor,
            OrgRoleDb::Member => OrgRole::Member,
            OrgRoleDb::Volunteer => OrgRole::Volunteer,
            OrgRoleDb::Admin => OrgRole::Admin,
        }
    }
}

impl From<OrgRole> for OrgRoleDb {
    fn from(role: OrgRole) -> Self {
        match role {
            OrgRole::Visitor => OrgRoleDb::Visitor,
            OrgRole::Member => OrgRoleDb::Member,
            OrgRole::Volunteer => OrgRoleDb::Volunteer,
            OrgRole::Admin => OrgRoleDb::Admin,
        }
    }
}

/// Database row mapping for the organizations table.
#[derive(Debug, Clone, FromRow)]
pub struct OrganizationEntity {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<OrganizationEntity> for domain::models::Organization {
    fn from(entity: OrganizationEntity) -> Self {
        Self {
            id: entity.id,
            name: entity.name,
            slug: entity.slug,
            active: entity.active,
            created_at: entity.created_at,
        }
    }
}

/// Database row mapping for the organization_members table.
#[derive(Debug, Clone, FromRow)]
pub struct MembershipEntity {
    pub organization_id: i64,
    pub user_id: i64,
    pub role: OrgRoleDb,
    pub granted_at: DateTime<Utc>,
}

impl From<MembershipEntity> for domain::models::Membership {
    fn from(entity: MembershipEntity) -> Self {
        Self {
            organization_id: entity.organization_id,
            user_id: entity.user_id,
            role: entity.role.into(),
            granted_at: entity.granted_at,
        }
    }
}
