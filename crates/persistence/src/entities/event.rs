//! Event and attendance entities (database row mappings).

use chrono::{DateTime, Utc};
use domain::models::{AttendeeStatus, EventSummary};
use sqlx::FromRow;

/// Database enum for attendee_status that maps to PostgreSQL enum type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "attendee_status", rename_all = "lowercase")]
pub enum AttendeeStatusDb {
    Registered,
    Present,
}

impl From<AttendeeStatusDb> for AttendeeStatus {
    fn from(status: AttendeeStatusDb) -> Self {
        match status {
            AttendeeStatusDb::Registered => AttendeeStatus::Registered,
            AttendeeStatusDb::Present => AttendeeStatus::Present,
        }
    }
}

impl From<AttendeeStatus> for AttendeeStatusDb {
    fn from(status: AttendeeStatus) -> Self {
        match status {
            AttendeeStatus::Registered => AttendeeStatusDb::Registered,
            AttendeeStatus::Present => AttendeeStatusDb::Present,
        }
    }
}

/// Database row mapping for the events table.
#[derive(Debug, Clone, FromRow)]
pub struct EventEntity {
    pub id: i64,
    pub organization_id: i64,
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

impl From<EventEntity> for domain::models::Event {
    fn from(entity: EventEntity) -> Self {
        Self {
            id: entity.id,
            organization_id: entity.organization_id,
            activity_id: entity.activity_id,
            location_id: entity.location_id,
            title: entity.title,
            starts_at: entity.starts_at,
            ends_at: entity.ends_at,
            publish_at: entity.publish_at,
            published: entity.published,
            capacity: entity.capacity,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}

/// Event row joined with its attendance counts.
#[derive(Debug, Clone, FromRow)]
pub struct EventSummaryEntity {
    #[sqlx(flatten)]
    pub event: EventEntity,
    pub registered_count: i64,
    pub present_count: i64,
}

impl From<EventSummaryEntity> for EventSummary {
    fn from(entity: EventSummaryEntity) -> Self {
        EventSummary::new(
            entity.event.into(),
            entity.registered_count,
            entity.present_count,
        )
    }
}

/// Database row mapping for the event_attendees table.
#[derive(Debug, Clone, FromRow)]
pub struct AttendeeEntity {
    pub user_id: i64,
    pub status: AttendeeStatusDb,
}
