//! Event domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use super::attendance::remaining_seats;
use super::organization::OrganizationId;

pub type EventId = i64;

/// A scheduled occurrence of an activity, optionally at a venue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: EventId,
    pub organization_id: OrganizationId,
    pub activity_id: i64,
    pub location_id: Option<i64>,
    pub title: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub publish_at: DateTime<Utc>,
    pub published: bool,
    pub capacity: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    /// Visible to the public: flagged published and past its publication date.
    pub fn is_currently_published(&self, now: DateTime<Utc>) -> bool {
        is_currently_published(self.published, self.publish_at, now)
    }

    /// Published and not yet over.
    pub fn is_upcoming(&self, now: DateTime<Utc>) -> bool {
        self.is_currently_published(now) && self.ends_at >= now
    }

    /// Relative path of the public detail page.
    pub fn detail_path(&self) -> String {
        detail_path(self.id)
    }
}

pub fn is_currently_published(
    published: bool,
    publish_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> bool {
    published && publish_at <= now
}

pub fn detail_path(event_id: EventId) -> String {
    format!("/events/{}", event_id)
}

/// Data for inserting an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEvent {
    pub organization_id: OrganizationId,
    pub activity_id: i64,
    pub location_id: Option<i64>,
    pub title: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub publish_at: DateTime<Utc>,
    pub capacity: i32,
}

fn default_capacity() -> i32 {
    0
}

/// Request payload for creating an event within an organization.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_event_window"))]
pub struct CreateEventRequest {
    pub activity_id: i64,

    pub location_id: Option<i64>,

    #[validate(
        length(min = 1, max = 200, message = "Title must be 1-200 characters"),
        custom(function = "shared::validation::validate_not_blank")
    )]
    pub title: String,

    pub starts_at: DateTime<Utc>,

    pub ends_at: DateTime<Utc>,

    /// Defaults to the creation time.
    pub publish_at: Option<DateTime<Utc>>,

    #[serde(default = "default_capacity")]
    #[validate(custom(function = "shared::validation::validate_capacity"))]
    pub capacity: i32,
}

fn validate_event_window(request: &CreateEventRequest) -> Result<(), ValidationError> {
    shared::validation::validate_time_window(request.starts_at, request.ends_at)
}

impl CreateEventRequest {
    pub fn into_new_event(self, organization_id: OrganizationId, now: DateTime<Utc>) -> NewEvent {
        NewEvent {
            organization_id,
            activity_id: self.activity_id,
            location_id: self.location_id,
            title: self.title.trim().to_string(),
            starts_at: self.starts_at,
            ends_at: self.ends_at,
            publish_at: self.publish_at.unwrap_or(now),
            capacity: self.capacity,
        }
    }
}

/// Event with its attendance counts, as listed publicly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSummary {
    #[serde(flatten)]
    pub event: Event,
    pub registered_count: i64,
    pub present_count: i64,
    pub remaining_seats: i32,
}

impl EventSummary {
    pub fn new(event: Event, registered_count: i64, present_count: i64) -> Self {
        let remaining = remaining_seats(event.capacity, registered_count, present_count);
        Self {
            event,
            registered_count,
            present_count,
            remaining_seats: remaining,
        }
    }

    pub fn is_full(&self) -> bool {
        self.remaining_seats == 0
    }
}
