//! Storage seams for events, users and organizations.
//!
//! The PostgreSQL implementations live in the `persistence` crate; an
//! in-memory implementation is provided in [`memory`] for tests and local
//! development.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{
    Attendance, Change, Event, EventId, EventSummary, Membership, NewEvent, NewUser, OrgRole,
    Organization, OrganizationId, User, UserId,
};

pub use memory::InMemoryStore;

/// Errors raised by a storage backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Record not found")]
    NotFound,

    #[error("Event {0} has no remaining seats")]
    CapacityExceeded(EventId),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Result of an attendance mutation: whether anything changed and the sets
/// as they stand after the mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceUpdate {
    pub change: Change,
    pub attendance: Attendance,
}

/// Event storage, including per-event attendance sets.
///
/// Attendance mutations are atomic per event: the capacity check and the
/// insert of `add_registered` cannot interleave with another mutation of the
/// same event.
#[async_trait]
pub trait EventRepository: Send + Sync {
    async fn find_by_id(&self, id: EventId) -> Result<Option<Event>, StoreError>;

    /// Inserts an event and adds `creator` to its organizers.
    async fn create(&self, new_event: NewEvent, creator: UserId) -> Result<Event, StoreError>;

    /// Deletes an event with its attendance. Returns false if it did not exist.
    async fn delete(&self, id: EventId) -> Result<bool, StoreError>;

    /// Published events visible at `now` that have not ended, soonest first.
    async fn list_upcoming_published(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<EventSummary>, StoreError>;

    /// Publishes every unpublished event whose `publish_at` has passed.
    /// Returns the number of events published.
    async fn publish_due(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;

    /// Visible, unfinished events starting no later than `until`.
    async fn list_starting_before(
        &self,
        now: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Event>, StoreError>;

    async fn attendance(&self, event_id: EventId) -> Result<Option<Attendance>, StoreError>;

    async fn add_registered(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> Result<AttendanceUpdate, StoreError>;

    async fn remove_registered(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> Result<AttendanceUpdate, StoreError>;

    async fn add_present(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> Result<AttendanceUpdate, StoreError>;

    async fn remove_present(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> Result<AttendanceUpdate, StoreError>;
}

/// User storage.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, StoreError>;

    /// Lookup by normalized email.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_many(&self, ids: &[UserId]) -> Result<Vec<User>, StoreError>;

    /// Fails with `Conflict` when the email is taken.
    async fn create(&self, new_user: NewUser) -> Result<User, StoreError>;

    /// Deletes a user along with their attendance and memberships.
    async fn delete(&self, id: UserId) -> Result<bool, StoreError>;

    /// Deletes a user who neither attends nor organizes any event.
    /// Returns `false`, keeping the user, when some attendance remains.
    async fn delete_if_unattached(&self, id: UserId) -> Result<bool, StoreError>;
}

/// Organization and membership storage.
#[async_trait]
pub trait OrganizationRepository: Send + Sync {
    async fn find_by_id(&self, id: OrganizationId) -> Result<Option<Organization>, StoreError>;

    async fn member_role(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
    ) -> Result<Option<OrgRole>, StoreError>;

    /// Grants `role`, replacing any previous role of the user.
    async fn set_member_role(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
        role: OrgRole,
    ) -> Result<Membership, StoreError>;

    async fn remove_member(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
    ) -> Result<bool, StoreError>;
}
