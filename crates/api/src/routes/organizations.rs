//! Organization membership management (admins only).

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use domain::models::{
    require_role, Membership, OrgRole, OrganizationId, SetMemberRoleRequest, UserId,
};
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::{authorize, AuthenticatedUser};

/// PUT /api/v1/organizations/:org_id/members
///
/// Grants a role to a registered user, replacing their previous role.
/// Guests who only ever booked by email cannot be made members, and an
/// existing admin is left untouched.
pub async fn set_member_role(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
    Path(org_id): Path<OrganizationId>,
    Json(request): Json<SetMemberRoleRequest>,
) -> Result<Json<Membership>, ApiError> {
    authorize(&state, org_id, caller.user_id, require_role(OrgRole::Admin)).await?;
    request.validate()?;

    let user = state
        .users
        .find_by_email(&request.email)
        .await?
        .filter(|user| !user.is_temporary())
        .ok_or_else(|| ApiError::NotFound("No registered user with this email".into()))?;

    if state.organizations.member_role(org_id, user.id).await? == Some(OrgRole::Admin) {
        return Err(ApiError::Conflict(
            "User is already an admin of this organization".into(),
        ));
    }

    let membership = state
        .organizations
        .set_member_role(org_id, user.id, request.role)
        .await?;

    tracing::info!(
        organization_id = org_id,
        user_id = user.id,
        role = %membership.role,
        granted_by = caller.user_id,
        "Member role set"
    );
    Ok(Json(membership))
}

/// DELETE /api/v1/organizations/:org_id/members/:user_id
pub async fn remove_member(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
    Path((org_id, user_id)): Path<(OrganizationId, UserId)>,
) -> Result<StatusCode, ApiError> {
    authorize(&state, org_id, caller.user_id, require_role(OrgRole::Admin)).await?;

    if !state.organizations.remove_member(org_id, user_id).await? {
        return Err(ApiError::NotFound("Membership not found".into()));
    }

    tracing::info!(
        organization_id = org_id,
        user_id,
        removed_by = caller.user_id,
        "Member removed"
    );
    Ok(StatusCode::NO_CONTENT)
}
