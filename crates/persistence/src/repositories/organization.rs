//! Organization repository for database operations.

use async_trait::async_trait;
use domain::models::{Membership, OrgRole, Organization, OrganizationId, UserId};
use domain::repositories::{OrganizationRepository, StoreError};
use sqlx::PgPool;

use super::map_sqlx_error;
use crate::entities::{MembershipEntity, OrgRoleDb, OrganizationEntity};
use crate::metrics::QueryTimer;

/// Repository for organization-related database operations.
#[derive(Clone)]
pub struct PgOrganizationRepository {
    pool: PgPool,
}

impl PgOrganizationRepository {
    /// Creates a new PgOrganizationRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create an organization. Used by seeding and tests; there is no
    /// public endpoint for it.
    pub async fn create(&self, name: &str) -> Result<Organization, StoreError> {
        let timer = QueryTimer::new("create_organization");
        let result = sqlx::query_as::<_, OrganizationEntity>(
            r#"
            INSERT INTO organizations (name, slug)
            VALUES ($1, $2)
            RETURNING id, name, slug, active, created_at
            "#,
        )
        .bind(name)
        .bind(shared::validation::slugify(name))
        .fetch_one(&self.pool)
        .await;
        timer.record();
        Ok(result.map_err(map_sqlx_error)?.into())
    }
}

#[async_trait]
impl OrganizationRepository for PgOrganizationRepository {
    async fn find_by_id(&self, id: OrganizationId) -> Result<Option<Organization>, StoreError> {
        let timer = QueryTimer::new("find_organization_by_id");
        let result = sqlx::query_as::<_, OrganizationEntity>(
            r#"
            SELECT id, name, slug, active, created_at
            FROM organizations
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        Ok(result.map_err(map_sqlx_error)?.map(Into::into))
    }

    async fn member_role(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
    ) -> Result<Option<OrgRole>, StoreError> {
        let timer = QueryTimer::new("find_member_role");
        let result = sqlx::query_scalar::<_, OrgRoleDb>(
            r#"
            SELECT role FROM organization_members
            WHERE organization_id = $1 AND user_id = $2
            "#,
        )
        .bind(organization_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        Ok(result.map_err(map_sqlx_error)?.map(Into::into))
    }

    async fn set_member_role(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
        role: OrgRole,
    ) -> Result<Membership, StoreError> {
        let timer = QueryTimer::new("set_member_role");
        let result = sqlx::query_as::<_, MembershipEntity>(
            r#"
            INSERT INTO organization_members (organization_id, user_id, role)
            VALUES ($1, $2, $3)
            ON CONFLICT (organization_id, user_id)
            DO UPDATE SET role = EXCLUDED.role, granted_at = NOW()
            RETURNING organization_id, user_id, role, granted_at
            "#,
        )
        .bind(organization_id)
        .bind(user_id)
        .bind(OrgRoleDb::from(role))
        .fetch_one(&self.pool)
        .await;
        timer.record();
        Ok(result.map_err(map_sqlx_error)?.into())
    }

    async fn remove_member(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
    ) -> Result<bool, StoreError> {
        let timer = QueryTimer::new("remove_member");
        let result = sqlx::query(
            r#"
            DELETE FROM organization_members
            WHERE organization_id = $1 AND user_id = $2
            "#,
        )
        .bind(organization_id)
        .bind(user_id)
        .execute(&self.pool)
        .await;
        timer.record();
        Ok(result.map_err(map_sqlx_error)?.rows_affected() > 0)
    }
}
