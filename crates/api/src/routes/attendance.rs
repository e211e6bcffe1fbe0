//! Token link handlers: `/attendance/{action}/{token}`.
//!
//! These are opened from emails and rosters, so they never answer with an
//! error page. Every outcome is a `303 See Other` plus a flash cookie.

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use domain::services::{AttendanceAction, TransitionOutcome, EVENT_LIST_PATH};
use serde::Deserialize;

use crate::app::AppState;
use crate::middleware::metrics::record_transition;
use crate::services::flash::add_flash_cookie;

#[derive(Debug, Default, Deserialize)]
pub struct RedirectQuery {
    pub redirect: Option<String>,
}

pub async fn book(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Query(query): Query<RedirectQuery>,
) -> Response {
    run(state, AttendanceAction::Book, token, query).await
}

pub async fn cancel(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Query(query): Query<RedirectQuery>,
) -> Response {
    run(state, AttendanceAction::Cancel, token, query).await
}

pub async fn present(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Query(query): Query<RedirectQuery>,
) -> Response {
    run(state, AttendanceAction::Present, token, query).await
}

pub async fn absent(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Query(query): Query<RedirectQuery>,
) -> Response {
    run(state, AttendanceAction::Absent, token, query).await
}

async fn run(
    state: AppState,
    action: AttendanceAction,
    token: String,
    query: RedirectQuery,
) -> Response {
    let outcome = state
        .attendance
        .apply(action, &token, query.redirect.as_deref())
        .await;
    record_transition(action, outcome.kind);
    redirect_with_flash(outcome)
}

fn redirect_with_flash(outcome: TransitionOutcome) -> Response {
    let mut headers = HeaderMap::new();
    add_flash_cookie(&mut headers, &outcome.flash);
    (headers, see_other(&outcome.redirect_to)).into_response()
}

/// `303 See Other` to `location`; a value that cannot be a header goes to the event list.
pub(crate) fn see_other(location: &str) -> Response {
    let value = HeaderValue::from_str(location).unwrap_or_else(|_| {
        tracing::warn!(location, "Redirect target is not a valid header value");
        HeaderValue::from_static(EVENT_LIST_PATH)
    });
    (StatusCode::SEE_OTHER, [(header::LOCATION, value)]).into_response()
}
