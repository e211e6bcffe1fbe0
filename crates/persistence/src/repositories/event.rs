//! Event repository for database operations.
//!
//! Attendance mutations lock the event row for the duration of a
//! transaction, load the event's attendance sets and let the domain model
//! decide the change, so concurrent bookings cannot oversell seats.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::models::{
    Attendance, AttendeeStatus, Change, Event, EventId, EventSummary, NewEvent, UserId,
};
use domain::repositories::{AttendanceUpdate, EventRepository, StoreError};
use sqlx::{PgConnection, PgPool};

use super::map_sqlx_error;
use crate::entities::{AttendeeEntity, AttendeeStatusDb, EventEntity, EventSummaryEntity};
use crate::metrics::QueryTimer;

/// Repository for event-related database operations.
#[derive(Clone)]
pub struct PgEventRepository {
    pool: PgPool,
}

#[derive(Debug, Clone, Copy)]
enum AttendanceOp {
    Register,
    Unregister,
    MarkPresent,
    MarkAbsent,
}

impl AttendanceOp {
    fn query_name(&self) -> &'static str {
        match self {
            AttendanceOp::Register => "attendance_add_registered",
            AttendanceOp::Unregister => "attendance_remove_registered",
            AttendanceOp::MarkPresent => "attendance_add_present",
            AttendanceOp::MarkAbsent => "attendance_remove_present",
        }
    }

    fn apply(
        &self,
        attendance: &mut Attendance,
        event_id: EventId,
        user_id: UserId,
    ) -> Result<Change, StoreError> {
        match self {
            AttendanceOp::Register => attendance
                .add_registered(user_id)
                .map_err(|_| StoreError::CapacityExceeded(event_id)),
            AttendanceOp::Unregister => Ok(attendance.remove_registered(user_id)),
            AttendanceOp::MarkPresent => Ok(attendance.add_present(user_id)),
            AttendanceOp::MarkAbsent => Ok(attendance.remove_present(user_id)),
        }
    }
}

impl PgEventRepository {
    /// Creates a new PgEventRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn mutate_attendance(
        &self,
        event_id: EventId,
        user_id: UserId,
        op: AttendanceOp,
    ) -> Result<AttendanceUpdate, StoreError> {
        let timer = QueryTimer::new(op.query_name());
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let capacity = sqlx::query_scalar::<_, i32>(
            r#"
            SELECT capacity FROM events WHERE id = $1 FOR UPDATE
            "#,
        )
        .bind(event_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx_error)?
        .ok_or(StoreError::NotFound)?;

        let user_exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)
            "#,
        )
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;
        if !user_exists {
            return Err(StoreError::NotFound);
        }

        let mut attendance = load_attendance(&mut tx, event_id, capacity)
            .await
            .map_err(map_sqlx_error)?;
        let change = op.apply(&mut attendance, event_id, user_id)?;

        if change.is_applied() {
            match attendance.status_of(user_id) {
                Some(status) => {
                    sqlx::query(
                        r#"
                        INSERT INTO event_attendees (event_id, user_id, status)
                        VALUES ($1, $2, $3)
                        ON CONFLICT (event_id, user_id)
                        DO UPDATE SET status = EXCLUDED.status, updated_at = NOW()
                        "#,
                    )
                    .bind(event_id)
                    .bind(user_id)
                    .bind(AttendeeStatusDb::from(status))
                    .execute(&mut *tx)
                    .await
                    .map_err(map_sqlx_error)?;
                }
                None => {
                    sqlx::query(
                        r#"
                        DELETE FROM event_attendees WHERE event_id = $1 AND user_id = $2
                        "#,
                    )
                    .bind(event_id)
                    .bind(user_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(map_sqlx_error)?;
                }
            }

            sqlx::query("UPDATE events SET updated_at = NOW() WHERE id = $1")
                .bind(event_id)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        timer.record();
        Ok(AttendanceUpdate { change, attendance })
    }
}

/// Loads the attendance sets of one event.
async fn load_attendance(
    conn: &mut PgConnection,
    event_id: EventId,
    capacity: i32,
) -> Result<Attendance, sqlx::Error> {
    let attendees = sqlx::query_as::<_, AttendeeEntity>(
        r#"
        SELECT user_id, status FROM event_attendees WHERE event_id = $1
        "#,
    )
    .bind(event_id)
    .fetch_all(&mut *conn)
    .await?;

    let organizers = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT user_id FROM event_organizers WHERE event_id = $1
        "#,
    )
    .bind(event_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut attendance = Attendance::new(capacity);
    for attendee in attendees {
        match AttendeeStatus::from(attendee.status) {
            AttendeeStatus::Registered => attendance.registered.insert(attendee.user_id),
            AttendeeStatus::Present => attendance.presents.insert(attendee.user_id),
        };
    }
    attendance.organizers.extend(organizers);
    Ok(attendance)
}

#[async_trait]
impl EventRepository for PgEventRepository {
    async fn find_by_id(&self, id: EventId) -> Result<Option<Event>, StoreError> {
        let timer = QueryTimer::new("find_event_by_id");
        let result = sqlx::query_as::<_, EventEntity>(
            r#"
            SELECT id, organization_id, activity_id, location_id, title, starts_at, ends_at,
                   publish_at, published, capacity, created_at, updated_at
            FROM events
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        Ok(result.map_err(map_sqlx_error)?.map(Into::into))
    }

    async fn create(&self, new_event: NewEvent, creator: UserId) -> Result<Event, StoreError> {
        let timer = QueryTimer::new("create_event");
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let event = sqlx::query_as::<_, EventEntity>(
            r#"
            INSERT INTO events (organization_id, activity_id, location_id, title, starts_at,
                                ends_at, publish_at, capacity)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, organization_id, activity_id, location_id, title, starts_at, ends_at,
                      publish_at, published, capacity, created_at, updated_at
            "#,
        )
        .bind(new_event.organization_id)
        .bind(new_event.activity_id)
        .bind(new_event.location_id)
        .bind(&new_event.title)
        .bind(new_event.starts_at)
        .bind(new_event.ends_at)
        .bind(new_event.publish_at)
        .bind(new_event.capacity)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        sqlx::query(
            r#"
            INSERT INTO event_organizers (event_id, user_id)
            VALUES ($1, $2)
            "#,
        )
        .bind(event.id)
        .bind(creator)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        timer.record();
        Ok(event.into())
    }

    async fn delete(&self, id: EventId) -> Result<bool, StoreError> {
        let timer = QueryTimer::new("delete_event");
        let result = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await;
        timer.record();
        Ok(result.map_err(map_sqlx_error)?.rows_affected() > 0)
    }

    async fn list_upcoming_published(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<EventSummary>, StoreError> {
        let timer = QueryTimer::new("list_upcoming_published_events");
        let result = sqlx::query_as::<_, EventSummaryEntity>(
            r#"
            SELECT e.id, e.organization_id, e.activity_id, e.location_id, e.title, e.starts_at,
                   e.ends_at, e.publish_at, e.published, e.capacity, e.created_at, e.updated_at,
                   COUNT(a.user_id) FILTER (WHERE a.status = 'registered') AS registered_count,
                   COUNT(a.user_id) FILTER (WHERE a.status = 'present') AS present_count
            FROM events e
            LEFT JOIN event_attendees a ON a.event_id = e.id
            WHERE e.published = TRUE AND e.publish_at <= $1 AND e.ends_at >= $1
            GROUP BY e.id
            ORDER BY e.starts_at, e.id
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        Ok(result
            .map_err(map_sqlx_error)?
            .into_iter()
            .map(Into::into)
            .collect())
    }

    async fn publish_due(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let timer = QueryTimer::new("publish_due_events");
        let result = sqlx::query(
            r#"
            UPDATE events
            SET published = TRUE, updated_at = $1
            WHERE published = FALSE AND publish_at <= $1
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await;
        timer.record();
        Ok(result.map_err(map_sqlx_error)?.rows_affected())
    }

    async fn list_starting_before(
        &self,
        now: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Event>, StoreError> {
        let timer = QueryTimer::new("list_events_starting_before");
        let result = sqlx::query_as::<_, EventEntity>(
            r#"
            SELECT id, organization_id, activity_id, location_id, title, starts_at, ends_at,
                   publish_at, published, capacity, created_at, updated_at
            FROM events
            WHERE published = TRUE AND publish_at <= $1 AND ends_at >= $1 AND starts_at <= $2
            ORDER BY starts_at, id
            "#,
        )
        .bind(now)
        .bind(until)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        Ok(result
            .map_err(map_sqlx_error)?
            .into_iter()
            .map(Into::into)
            .collect())
    }

    async fn attendance(&self, event_id: EventId) -> Result<Option<Attendance>, StoreError> {
        let timer = QueryTimer::new("load_event_attendance");
        let mut conn = self.pool.acquire().await.map_err(map_sqlx_error)?;

        let capacity = sqlx::query_scalar::<_, i32>("SELECT capacity FROM events WHERE id = $1")
            .bind(event_id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(map_sqlx_error)?;

        let attendance = match capacity {
            Some(capacity) => Some(
                load_attendance(&mut conn, event_id, capacity)
                    .await
                    .map_err(map_sqlx_error)?,
            ),
            None => None,
        };
        timer.record();
        Ok(attendance)
    }

    async fn add_registered(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> Result<AttendanceUpdate, StoreError> {
        self.mutate_attendance(event_id, user_id, AttendanceOp::Register)
            .await
    }

    async fn remove_registered(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> Result<AttendanceUpdate, StoreError> {
        self.mutate_attendance(event_id, user_id, AttendanceOp::Unregister)
            .await
    }

    async fn add_present(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> Result<AttendanceUpdate, StoreError> {
        self.mutate_attendance(event_id, user_id, AttendanceOp::MarkPresent)
            .await
    }

    async fn remove_present(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> Result<AttendanceUpdate, StoreError> {
        self.mutate_attendance(event_id, user_id, AttendanceOp::MarkAbsent)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_op_maps_capacity_error() {
        let mut attendance = Attendance::new(0);
        let result = AttendanceOp::Register.apply(&mut attendance, 5, 1);
        assert_eq!(result, Err(StoreError::CapacityExceeded(5)));
    }

    #[test]
    fn test_ops_follow_domain_rules() {
        let mut attendance = Attendance::new(2);
        assert_eq!(
            AttendanceOp::Register.apply(&mut attendance, 1, 10),
            Ok(Change::Applied)
        );
        assert_eq!(
            AttendanceOp::MarkPresent.apply(&mut attendance, 1, 10),
            Ok(Change::Applied)
        );
        assert_eq!(attendance.status_of(10), Some(AttendeeStatus::Present));
        assert_eq!(
            AttendanceOp::Unregister.apply(&mut attendance, 1, 10),
            Ok(Change::Unchanged)
        );
        assert_eq!(
            AttendanceOp::MarkAbsent.apply(&mut attendance, 1, 10),
            Ok(Change::Applied)
        );
        assert_eq!(attendance.status_of(10), Some(AttendeeStatus::Registered));
    }

    #[test]
    fn test_query_names_are_distinct() {
        let names = [
            AttendanceOp::Register.query_name(),
            AttendanceOp::Unregister.query_name(),
            AttendanceOp::MarkPresent.query_name(),
            AttendanceOp::MarkAbsent.query_name(),
        ];
        for (i, a) in names.iter().enumerate() {
            for b in &names[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
