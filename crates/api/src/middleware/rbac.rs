//! Organization role checks.
//!
//! Routes call [`authorize`] with the organization the resource belongs to
//! and a guard from [`domain::models::require_role`].

use domain::models::{OrgRole, OrganizationId, RoleGuard, UserId};

use crate::app::AppState;
use crate::error::ApiError;

/// Looks up the caller's role in `organization_id` and checks it against `guard`.
pub async fn authorize(
    state: &AppState,
    organization_id: OrganizationId,
    user_id: UserId,
    guard: RoleGuard,
) -> Result<OrgRole, ApiError> {
    let role = state
        .organizations
        .member_role(organization_id, user_id)
        .await?;

    guard.check(role).map_err(|err| {
        tracing::info!(
            organization_id,
            user_id,
            required = %guard.required(),
            "Permission denied"
        );
        ApiError::from(err)
    })
}
