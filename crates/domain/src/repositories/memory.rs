//! In-memory store backing all repository traits.
//!
//! Every mutation takes the single write lock, which serializes attendance
//! changes the same way the PostgreSQL row lock does.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

use super::{
    AttendanceUpdate, EventRepository, OrganizationRepository, StoreError, UserRepository,
};
use crate::models::attendance::CapacityExceeded;
use crate::models::{
    Attendance, Change, Event, EventId, EventSummary, Membership, NewEvent, NewUser, OrgRole,
    Organization, OrganizationId, User, UserId,
};

#[derive(Debug, Default)]
struct State {
    next_id: i64,
    users: BTreeMap<UserId, User>,
    events: BTreeMap<EventId, StoredEvent>,
    organizations: BTreeMap<OrganizationId, Organization>,
    memberships: HashMap<(OrganizationId, UserId), Membership>,
}

#[derive(Debug, Clone)]
struct StoredEvent {
    event: Event,
    attendance: Attendance,
}

impl State {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn stored_event(&mut self, event_id: EventId) -> Result<&mut StoredEvent, StoreError> {
        self.events.get_mut(&event_id).ok_or(StoreError::NotFound)
    }

    fn ensure_user(&self, user_id: UserId) -> Result<(), StoreError> {
        if self.users.contains_key(&user_id) {
            Ok(())
        } else {
            Err(StoreError::NotFound)
        }
    }

    fn mutate_attendance<F>(
        &mut self,
        event_id: EventId,
        user_id: UserId,
        mutation: F,
    ) -> Result<AttendanceUpdate, StoreError>
    where
        F: FnOnce(&mut Attendance) -> Result<Change, StoreError>,
    {
        self.ensure_user(user_id)?;
        let stored = self.stored_event(event_id)?;
        let change = mutation(&mut stored.attendance)?;
        if change.is_applied() {
            stored.event.updated_at = Utc::now();
        }
        Ok(AttendanceUpdate {
            change,
            attendance: stored.attendance.clone(),
        })
    }
}

/// Thread-safe in-memory store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an active organization.
    pub async fn insert_organization(&self, name: &str) -> Organization {
        let mut state = self.state.write().await;
        let organization = Organization {
            id: state.allocate_id(),
            name: name.to_string(),
            slug: shared::validation::slugify(name),
            active: true,
            created_at: Utc::now(),
        };
        state
            .organizations
            .insert(organization.id, organization.clone());
        organization
    }

    /// Inserts an event as-is, bypassing publication defaults.
    pub async fn insert_event(&self, event: Event) -> Event {
        let mut state = self.state.write().await;
        state.next_id = state.next_id.max(event.id);
        state.events.insert(
            event.id,
            StoredEvent {
                attendance: Attendance::new(event.capacity),
                event: event.clone(),
            },
        );
        event
    }
}

#[async_trait]
impl EventRepository for InMemoryStore {
    async fn find_by_id(&self, id: EventId) -> Result<Option<Event>, StoreError> {
        let state = self.state.read().await;
        Ok(state.events.get(&id).map(|stored| stored.event.clone()))
    }

    async fn create(&self, new_event: NewEvent, creator: UserId) -> Result<Event, StoreError> {
        let mut state = self.state.write().await;
        state.ensure_user(creator)?;
        if !state.organizations.contains_key(&new_event.organization_id) {
            return Err(StoreError::NotFound);
        }

        let now = Utc::now();
        let event = Event {
            id: state.allocate_id(),
            organization_id: new_event.organization_id,
            activity_id: new_event.activity_id,
            location_id: new_event.location_id,
            title: new_event.title,
            starts_at: new_event.starts_at,
            ends_at: new_event.ends_at,
            publish_at: new_event.publish_at,
            published: false,
            capacity: new_event.capacity,
            created_at: now,
            updated_at: now,
        };
        let mut attendance = Attendance::new(event.capacity);
        attendance.add_organizer(creator);
        state.events.insert(
            event.id,
            StoredEvent {
                event: event.clone(),
                attendance,
            },
        );
        Ok(event)
    }

    async fn delete(&self, id: EventId) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        Ok(state.events.remove(&id).is_some())
    }

    async fn list_upcoming_published(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<EventSummary>, StoreError> {
        let state = self.state.read().await;
        let mut summaries: Vec<EventSummary> = state
            .events
            .values()
            .filter(|stored| stored.event.is_upcoming(now))
            .map(|stored| {
                EventSummary::new(
                    stored.event.clone(),
                    stored.attendance.registered.len() as i64,
                    stored.attendance.presents.len() as i64,
                )
            })
            .collect();
        summaries.sort_by_key(|summary| (summary.event.starts_at, summary.event.id));
        Ok(summaries)
    }

    async fn publish_due(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut state = self.state.write().await;
        let mut published = 0;
        for stored in state.events.values_mut() {
            if !stored.event.published && stored.event.publish_at <= now {
                stored.event.published = true;
                stored.event.updated_at = now;
                published += 1;
            }
        }
        Ok(published)
    }

    async fn list_starting_before(
        &self,
        now: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Event>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .events
            .values()
            .filter(|stored| stored.event.is_upcoming(now) && stored.event.starts_at <= until)
            .map(|stored| stored.event.clone())
            .collect())
    }

    async fn attendance(&self, event_id: EventId) -> Result<Option<Attendance>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .events
            .get(&event_id)
            .map(|stored| stored.attendance.clone()))
    }

    async fn add_registered(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> Result<AttendanceUpdate, StoreError> {
        let mut state = self.state.write().await;
        state.mutate_attendance(event_id, user_id, |attendance| {
            attendance
                .add_registered(user_id)
                .map_err(|CapacityExceeded| StoreError::CapacityExceeded(event_id))
        })
    }

    async fn remove_registered(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> Result<AttendanceUpdate, StoreError> {
        let mut state = self.state.write().await;
        state.mutate_attendance(event_id, user_id, |attendance| {
            Ok(attendance.remove_registered(user_id))
        })
    }

    async fn add_present(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> Result<AttendanceUpdate, StoreError> {
        let mut state = self.state.write().await;
        state.mutate_attendance(event_id, user_id, |attendance| {
            Ok(attendance.add_present(user_id))
        })
    }

    async fn remove_present(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> Result<AttendanceUpdate, StoreError> {
        let mut state = self.state.write().await;
        state.mutate_attendance(event_id, user_id, |attendance| {
            Ok(attendance.remove_present(user_id))
        })
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let state = self.state.read().await;
        Ok(state.users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let email = shared::validation::normalize_email(email);
        let state = self.state.read().await;
        Ok(state.users.values().find(|user| user.email == email).cloned())
    }

    async fn find_many(&self, ids: &[UserId]) -> Result<Vec<User>, StoreError> {
        let state = self.state.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.users.get(id).cloned())
            .collect())
    }

    async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        let mut state = self.state.write().await;
        let email = shared::validation::normalize_email(&new_user.email);
        if state.users.values().any(|user| user.email == email) {
            return Err(StoreError::Conflict(format!("email {} already registered", email)));
        }
        let user = User {
            id: state.allocate_id(),
            email,
            first_name: new_user.first_name,
            last_name: new_user.last_name,
            created_at: Utc::now(),
        };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn delete(&self, id: UserId) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        if state.users.remove(&id).is_none() {
            return Ok(false);
        }
        for stored in state.events.values_mut() {
            stored.attendance.registered.remove(&id);
            stored.attendance.presents.remove(&id);
            stored.attendance.organizers.remove(&id);
        }
        state.memberships.retain(|(_, user_id), _| *user_id != id);
        Ok(true)
    }

    async fn delete_if_unattached(&self, id: UserId) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        let attached = state.events.values().any(|stored| {
            let attendance = &stored.attendance;
            attendance.registered.contains(&id)
                || attendance.presents.contains(&id)
                || attendance.organizers.contains(&id)
        });
        if attached {
            return Ok(false);
        }
        state.memberships.retain(|(_, user_id), _| *user_id != id);
        Ok(state.users.remove(&id).is_some())
    }
}

#[async_trait]
impl OrganizationRepository for InMemoryStore {
    async fn find_by_id(&self, id: OrganizationId) -> Result<Option<Organization>, StoreError> {
        let state = self.state.read().await;
        Ok(state.organizations.get(&id).cloned())
    }

    async fn member_role(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
    ) -> Result<Option<OrgRole>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .memberships
            .get(&(organization_id, user_id))
            .map(|membership| membership.role))
    }

    async fn set_member_role(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
        role: OrgRole,
    ) -> Result<Membership, StoreError> {
        let mut state = self.state.write().await;
        state.ensure_user(user_id)?;
        if !state.organizations.contains_key(&organization_id) {
            return Err(StoreError::NotFound);
        }
        let membership = Membership {
            organization_id,
            user_id,
            role,
            granted_at: Utc::now(),
        };
        state
            .memberships
            .insert((organization_id, user_id), membership.clone());
        Ok(membership)
    }

    async fn remove_member(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        Ok(state
            .memberships
            .remove(&(organization_id, user_id))
            .is_some())
    }
}
