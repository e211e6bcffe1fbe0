//! Integration tests for event pages, booking by email and staff endpoints.

mod common;

use atelier_api::services::flash::build_flash_cookie;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use chrono::{Duration, Utc};
use common::{
    bearer_token, flash, get_request, json_request, json_request_with_auth, location,
    parse_response_body, request_with_auth, TestApp,
};
use domain::models::{AttendeeStatus, OrgRole};
use domain::repositories::{EventRepository, UserRepository};
use domain::services::{AttendanceAction, FlashLevel, FlashMessage};
use serde_json::json;

#[tokio::test]
async fn test_list_shows_only_published_events() {
    let app = TestApp::new();
    let org = app.organization().await;
    let published = app.event(&org, 10).await;
    let draft = app.insert_event(&org, 10, false).await;

    let response = app.send(get_request("/events")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = parse_response_body(response).await;
    let ids: Vec<i64> = body["events"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["id"].as_i64().unwrap())
        .collect();
    assert!(ids.contains(&published.id));
    assert!(!ids.contains(&draft.id));
    assert!(body.get("flash").is_none());
}

#[tokio::test]
async fn test_pending_flash_is_shown_once() {
    let app = TestApp::new();
    let cookie = build_flash_cookie(&FlashMessage::new(FlashLevel::Info, "Hello"));
    let pair = cookie.split(';').next().unwrap().to_string();

    let request = Request::builder()
        .uri("/events")
        .header(header::COOKIE, pair)
        .body(Body::empty())
        .unwrap();
    let response = app.send(request).await;

    let cleared = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .any(|v| v.to_str().unwrap().starts_with("flash=;"));
    assert!(cleared);

    let body = parse_response_body(response).await;
    assert_eq!(body["flash"]["level"], "info");
    assert_eq!(body["flash"]["text"], "Hello");
}

#[tokio::test]
async fn test_event_detail_reports_remaining_seats() {
    let app = TestApp::new();
    let org = app.organization().await;
    let event = app.event(&org, 3).await;
    let user = app.user().await;
    app.send(get_request(&app.link(AttendanceAction::Book, user.id, event.id)))
        .await;

    let response = app
        .send(get_request(&format!("/events/{}", event.id)))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = parse_response_body(response).await;
    assert_eq!(body["event"]["id"], event.id);
    assert_eq!(body["event"]["registeredCount"], 1);
    assert_eq!(body["event"]["remainingSeats"], 2);
}

#[tokio::test]
async fn test_unpublished_event_is_not_found() {
    let app = TestApp::new();
    let org = app.organization().await;
    let draft = app.insert_event(&org, 10, false).await;

    let response = app
        .send(get_request(&format!("/events/{}", draft.id)))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .send(json_request(
            Method::POST,
            &format!("/events/{}/book", draft.id),
            json!({ "email": "guest@example.org" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_book_by_email_creates_guest_and_redirects_to_book_link() {
    let app = TestApp::new();
    let org = app.organization().await;
    let event = app.event(&org, 10).await;

    let response = app
        .send(json_request(
            Method::POST,
            &format!("/events/{}/book?redirect=/events", event.id),
            json!({ "email": "Guest@Example.org" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let link = location(&response);
    assert!(link.starts_with("/attendance/book/"));
    assert!(link.ends_with("?redirect=%2Fevents"));

    let guest = UserRepository::find_by_email(app.store.as_ref(), "guest@example.org")
        .await
        .unwrap()
        .expect("temporary user");
    assert!(guest.is_temporary());

    // Nothing is booked until the link is followed.
    let attendance = EventRepository::attendance(app.store.as_ref(), event.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(attendance.status_of(guest.id), None);

    let response = app.send(get_request(&link)).await;
    assert_eq!(location(&response), "/events");
    assert_eq!(flash(&response).unwrap().level, FlashLevel::Success);

    let attendance = EventRepository::attendance(app.store.as_ref(), event.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        attendance.status_of(guest.id),
        Some(AttendeeStatus::Registered)
    );
}

#[tokio::test]
async fn test_book_by_email_keeps_redirect_query_intact() {
    let app = TestApp::new();
    let org = app.organization().await;
    let event = app.event(&org, 10).await;

    let response = app
        .send(json_request(
            Method::POST,
            &format!(
                "/events/{}/book?redirect=%2Fevents%3Fpage%3D2%26sort%3Ddate",
                event.id
            ),
            json!({ "email": "reader@example.org" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let link = location(&response);
    assert!(!link.contains("&sort"));

    let response = app.send(get_request(&link)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/events?page=2&sort=date");
    assert_eq!(flash(&response).unwrap().level, FlashLevel::Success);
}

#[tokio::test]
async fn test_book_by_email_reuses_existing_user() {
    let app = TestApp::new();
    let org = app.organization().await;
    let event = app.event(&org, 10).await;
    let user = app.user().await;

    let response = app
        .send(json_request(
            Method::POST,
            &format!("/events/{}/book", event.id),
            json!({ "email": user.email }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    app.send(get_request(&location(&response))).await;
    let attendance = EventRepository::attendance(app.store.as_ref(), event.id)
        .await
        .unwrap()
        .unwrap();
    assert!(attendance.registered.contains(&user.id));
}

#[tokio::test]
async fn test_book_by_email_rejects_invalid_address() {
    let app = TestApp::new();
    let org = app.organization().await;
    let event = app.event(&org, 10).await;

    let response = app
        .send(json_request(
            Method::POST,
            &format!("/events/{}/book", event.id),
            json!({ "email": "not-an-email" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = parse_response_body(response).await;
    assert_eq!(body["error"], "validation_error");
}

fn event_payload(capacity: i32) -> serde_json::Value {
    let starts_at = Utc::now() + Duration::days(7);
    json!({
        "activityId": 1,
        "title": "Sewing workshop",
        "startsAt": starts_at,
        "endsAt": starts_at + Duration::hours(2),
        "capacity": capacity,
    })
}

#[tokio::test]
async fn test_create_event_requires_authentication() {
    let app = TestApp::new();
    let org = app.organization().await;

    let response = app
        .send(json_request(
            Method::POST,
            &format!("/api/v1/organizations/{}/events", org.id),
            event_payload(12),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .send(json_request_with_auth(
            Method::POST,
            &format!("/api/v1/organizations/{}/events", org.id),
            event_payload(12),
            "not.a.jwt",
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_event_requires_volunteer() {
    let app = TestApp::new();
    let org = app.organization().await;
    let member = app.member(&org, OrgRole::Member).await;

    let response = app
        .send(json_request_with_auth(
            Method::POST,
            &format!("/api/v1/organizations/{}/events", org.id),
            event_payload(12),
            &bearer_token(member.id),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_volunteer_creates_event_and_organizes_it() {
    let app = TestApp::new();
    let org = app.organization().await;
    let volunteer = app.member(&org, OrgRole::Volunteer).await;

    let response = app
        .send(json_request_with_auth(
            Method::POST,
            &format!("/api/v1/organizations/{}/events", org.id),
            event_payload(12),
            &bearer_token(volunteer.id),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = parse_response_body(response).await;
    assert_eq!(body["title"], "Sewing workshop");
    assert_eq!(body["organizationId"], org.id);
    assert_eq!(body["capacity"], 12);

    let event_id = body["id"].as_i64().unwrap();
    let attendance = EventRepository::attendance(app.store.as_ref(), event_id)
        .await
        .unwrap()
        .unwrap();
    assert!(attendance.is_organizer(volunteer.id));
    assert_eq!(attendance.remaining_seats(), 12);
}

#[tokio::test]
async fn test_create_event_rejects_inverted_window() {
    let app = TestApp::new();
    let org = app.organization().await;
    let admin = app.member(&org, OrgRole::Admin).await;

    let starts_at = Utc::now() + Duration::days(7);
    let response = app
        .send(json_request_with_auth(
            Method::POST,
            &format!("/api/v1/organizations/{}/events", org.id),
            json!({
                "activityId": 1,
                "title": "Backwards",
                "startsAt": starts_at,
                "endsAt": starts_at - Duration::hours(1),
            }),
            &bearer_token(admin.id),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_roster_lists_attendees_with_signed_links() {
    let app = TestApp::new();
    let org = app.organization().await;
    let event = app.event(&org, 10).await;
    let volunteer = app.member(&org, OrgRole::Volunteer).await;
    let attendee = app.user().await;
    app.send(get_request(&app.link(AttendanceAction::Book, attendee.id, event.id)))
        .await;

    let response = app
        .send(request_with_auth(
            Method::GET,
            &format!("/api/v1/events/{}/attendance", event.id),
            &bearer_token(volunteer.id),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = parse_response_body(response).await;
    assert_eq!(body["remainingSeats"], 9);
    let registered = body["registered"].as_array().unwrap();
    assert_eq!(registered.len(), 1);
    assert_eq!(registered[0]["userId"], attendee.id);

    let present_url = registered[0]["actionUrl"].as_str().unwrap();
    let present_path = present_url
        .strip_prefix(common::BASE_URL)
        .expect("absolute link");
    assert!(present_path.starts_with("/attendance/present/"));

    app.send(get_request(present_path)).await;
    let response = app
        .send(request_with_auth(
            Method::GET,
            &format!("/api/v1/events/{}/attendance", event.id),
            &bearer_token(volunteer.id),
        ))
        .await;
    let body = parse_response_body(response).await;
    assert!(body["registered"].as_array().unwrap().is_empty());
    let presents = body["presents"].as_array().unwrap();
    assert_eq!(presents[0]["userId"], attendee.id);
    assert!(presents[0]["actionUrl"]
        .as_str()
        .unwrap()
        .contains("/attendance/absent/"));
}

#[tokio::test]
async fn test_roster_forbidden_to_members() {
    let app = TestApp::new();
    let org = app.organization().await;
    let event = app.event(&org, 10).await;
    let member = app.member(&org, OrgRole::Member).await;

    let response = app
        .send(request_with_auth(
            Method::GET,
            &format!("/api/v1/events/{}/attendance", event.id),
            &bearer_token(member.id),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_only_admins_delete_events() {
    let app = TestApp::new();
    let org = app.organization().await;
    let event = app.event(&org, 10).await;
    let volunteer = app.member(&org, OrgRole::Volunteer).await;
    let admin = app.member(&org, OrgRole::Admin).await;
    let uri = format!("/api/v1/events/{}", event.id);

    let response = app
        .send(request_with_auth(
            Method::DELETE,
            &uri,
            &bearer_token(volunteer.id),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .send(request_with_auth(Method::DELETE, &uri, &bearer_token(admin.id)))
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .send(get_request(&format!("/events/{}", event.id)))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
