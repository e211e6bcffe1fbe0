//! Event listing, detail, booking by email and staff event management.

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use domain::models::{
    require_role, BookByEmailRequest, CreateEventRequest, Event, EventId, EventSummary, OrgRole,
    OrganizationId, User, UserId,
};
use domain::services::{AttendanceAction, FlashMessage};
use serde::Serialize;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::{authorize, AuthenticatedUser};
use crate::routes::attendance::{see_other, RedirectQuery};
use crate::services::flash::{build_clear_flash_cookie, read_flash};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventListResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flash: Option<FlashMessage>,
    pub events: Vec<EventSummary>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDetailResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flash: Option<FlashMessage>,
    pub event: EventSummary,
}

/// One line of the organizer roster.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    pub user_id: UserId,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// present link for registered users, absent link for present ones
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_url: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterResponse {
    pub event_id: EventId,
    pub capacity: i32,
    pub remaining_seats: i32,
    pub registered: Vec<RosterEntry>,
    pub presents: Vec<RosterEntry>,
    pub organizers: Vec<RosterEntry>,
}

/// GET /events
///
/// Published events that have not ended yet, soonest first.
pub async fn list_events(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let events = state.events.list_upcoming_published(Utc::now()).await?;
    let body = EventListResponse {
        flash: read_flash(&headers),
        events,
    };
    Ok(with_flash_consumed(body.flash.is_some(), Json(body)))
}

/// GET /events/:event_id
pub async fn get_event(
    State(state): State<AppState>,
    Path(event_id): Path<EventId>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let event = find_published(&state, event_id).await?;
    let attendance = state
        .events
        .attendance(event_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Event not found".into()))?;

    let body = EventDetailResponse {
        flash: read_flash(&headers),
        event: EventSummary::new(
            event,
            attendance.registered.len() as i64,
            attendance.presents.len() as i64,
        ),
    };
    Ok(with_flash_consumed(body.flash.is_some(), Json(body)))
}

/// POST /events/:event_id/book
///
/// Books by email address alone. Answers with a redirect to the signed book
/// link so the booking itself goes through `/attendance/book/{token}`.
pub async fn book_by_email(
    State(state): State<AppState>,
    Path(event_id): Path<EventId>,
    Query(query): Query<RedirectQuery>,
    Json(request): Json<BookByEmailRequest>,
) -> Result<Response, ApiError> {
    request.validate()?;
    find_published(&state, event_id).await?;

    let path = state
        .attendance
        .book_by_email(event_id, &request.email, query.redirect.as_deref())
        .await?;
    Ok(see_other(&path))
}

/// POST /api/v1/organizations/:org_id/events
///
/// Volunteers and admins create events; the creator becomes an organizer.
pub async fn create_event(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(org_id): Path<OrganizationId>,
    Json(request): Json<CreateEventRequest>,
) -> Result<(StatusCode, Json<Event>), ApiError> {
    authorize(&state, org_id, user.user_id, require_role(OrgRole::Volunteer)).await?;
    request.validate()?;

    let event = state
        .events
        .create(request.into_new_event(org_id, Utc::now()), user.user_id)
        .await?;

    tracing::info!(
        event_id = event.id,
        organization_id = org_id,
        created_by = user.user_id,
        "Event created"
    );
    Ok((StatusCode::CREATED, Json(event)))
}

/// DELETE /api/v1/events/:event_id
pub async fn delete_event(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(event_id): Path<EventId>,
) -> Result<StatusCode, ApiError> {
    let event = find_event(&state, event_id).await?;
    authorize(
        &state,
        event.organization_id,
        user.user_id,
        require_role(OrgRole::Admin),
    )
    .await?;

    if !state.events.delete(event_id).await? {
        return Err(ApiError::NotFound("Event not found".into()));
    }

    tracing::info!(event_id, deleted_by = user.user_id, "Event deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/events/:event_id/attendance
///
/// Roster for organizers, with signed present/absent links per attendee.
pub async fn get_roster(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(event_id): Path<EventId>,
) -> Result<Json<RosterResponse>, ApiError> {
    let event = find_event(&state, event_id).await?;
    authorize(
        &state,
        event.organization_id,
        user.user_id,
        require_role(OrgRole::Volunteer),
    )
    .await?;

    let attendance = state
        .events
        .attendance(event_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Event not found".into()))?;

    let ids: Vec<UserId> = attendance
        .registered
        .iter()
        .chain(&attendance.presents)
        .chain(&attendance.organizers)
        .copied()
        .collect();
    let users = state.users.find_many(&ids).await?;

    let entries = |members: &std::collections::BTreeSet<UserId>,
                   action: Option<AttendanceAction>|
     -> Result<Vec<RosterEntry>, ApiError> {
        users
            .iter()
            .filter(|u| members.contains(&u.id))
            .map(|u| roster_entry(&state, u, event_id, action))
            .collect()
    };

    Ok(Json(RosterResponse {
        event_id,
        capacity: attendance.capacity,
        remaining_seats: attendance.remaining_seats(),
        registered: entries(&attendance.registered, Some(AttendanceAction::Present))?,
        presents: entries(&attendance.presents, Some(AttendanceAction::Absent))?,
        organizers: entries(&attendance.organizers, None)?,
    }))
}

fn roster_entry(
    state: &AppState,
    user: &User,
    event_id: EventId,
    action: Option<AttendanceAction>,
) -> Result<RosterEntry, ApiError> {
    let action_url = action
        .map(|action| state.attendance.action_link(action, user.id, event_id))
        .transpose()
        .map_err(|e| ApiError::Internal(format!("Failed to sign roster link: {}", e)))?;

    Ok(RosterEntry {
        user_id: user.id,
        email: user.email.clone(),
        name: user.display_name(),
        action_url,
    })
}

async fn find_event(state: &AppState, event_id: EventId) -> Result<Event, ApiError> {
    state
        .events
        .find_by_id(event_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Event not found".into()))
}

/// Unpublished events are invisible on the public pages.
async fn find_published(state: &AppState, event_id: EventId) -> Result<Event, ApiError> {
    let event = find_event(state, event_id).await?;
    if !event.is_currently_published(Utc::now()) {
        return Err(ApiError::NotFound("Event not found".into()));
    }
    Ok(event)
}

fn with_flash_consumed(consumed: bool, body: impl IntoResponse) -> Response {
    let mut response = body.into_response();
    if consumed {
        if let Ok(value) = HeaderValue::from_str(&build_clear_flash_cookie()) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }
    response
}
