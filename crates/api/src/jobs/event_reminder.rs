//! Day-before reminder emails.

use chrono::{DateTime, Duration, NaiveTime, Utc};
use domain::repositories::EventRepository;
use domain::services::AttendanceService;
use std::sync::Arc;
use tracing::{info, warn};

use super::scheduler::{Job, JobError, JobFrequency};
use crate::middleware::metrics::record_reminders_sent;

/// Once a day, reminds registered users of every visible event that starts
/// before the end of tomorrow (UTC).
pub struct EventReminderJob {
    events: Arc<dyn EventRepository>,
    attendance: AttendanceService,
    hour_utc: u32,
}

impl EventReminderJob {
    pub fn new(
        events: Arc<dyn EventRepository>,
        attendance: AttendanceService,
        hour_utc: u32,
    ) -> Self {
        Self {
            events,
            attendance,
            hour_utc,
        }
    }

    /// Sends reminders for events due by the end of the day after `now`.
    /// Returns the number of emails sent.
    pub async fn remind(&self, now: DateTime<Utc>) -> Result<usize, JobError> {
        let events = self
            .events
            .list_starting_before(now, end_of_tomorrow(now))
            .await?;

        let mut sent = 0;
        for event in &events {
            match self.attendance.send_reminders(event).await {
                Ok(count) => sent += count,
                Err(err) => warn!(event_id = event.id, error = %err, "Reminders failed for event"),
            }
        }

        record_reminders_sent(sent);
        info!(events = events.len(), sent, "Event reminders sent");
        Ok(sent)
    }
}

fn end_of_tomorrow(now: DateTime<Utc>) -> DateTime<Utc> {
    let last_second = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or_default();
    (now.date_naive() + Duration::days(1))
        .and_time(last_second)
        .and_utc()
}

#[async_trait::async_trait]
impl Job for EventReminderJob {
    fn name(&self) -> &'static str {
        "event_reminder"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::DailyAt {
            hour: self.hour_utc,
        }
    }

    async fn execute(&self) -> Result<(), JobError> {
        self.remind(Utc::now()).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use domain::models::{Event, NewUser};
    use domain::repositories::{InMemoryStore, UserRepository};
    use domain::services::{MockMailer, RouteResolver};
    use shared::signing::TokenSigner;

    struct NoRoutes;

    impl RouteResolver for NoRoutes {
        fn is_valid_path(&self, _path: &str) -> bool {
            false
        }
    }

    fn event(id: i64, starts_at: DateTime<Utc>) -> Event {
        let created = starts_at - Duration::days(30);
        Event {
            id,
            organization_id: 1,
            activity_id: 1,
            location_id: None,
            title: format!("Repair café #{id}"),
            starts_at,
            ends_at: starts_at + Duration::hours(3),
            publish_at: created,
            published: true,
            capacity: 10,
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn test_end_of_tomorrow() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 8, 0, 0).unwrap();
        assert_eq!(
            end_of_tomorrow(now),
            Utc.with_ymd_and_hms(2024, 3, 10, 23, 59, 59).unwrap()
        );
    }

    #[tokio::test]
    async fn test_reminds_registered_users_of_events_due_tomorrow() {
        let now = Utc::now();
        let store = Arc::new(InMemoryStore::new());
        let tomorrow = store
            .insert_event(event(1, now + Duration::hours(20)))
            .await;
        let next_week = store.insert_event(event(2, now + Duration::days(7))).await;

        let user = UserRepository::create(
            store.as_ref(),
            NewUser {
                email: "jane@example.com".to_string(),
                first_name: "Jane".to_string(),
                last_name: String::new(),
            },
        )
        .await
        .unwrap();
        store.add_registered(tomorrow.id, user.id).await.unwrap();
        store.add_registered(next_week.id, user.id).await.unwrap();

        let mailer = MockMailer::new();
        let attendance = AttendanceService::new(
            store.clone(),
            store.clone(),
            Arc::new(mailer.clone()),
            Arc::new(NoRoutes),
            TokenSigner::new("reminder-test-secret").unwrap(),
            "https://atelier.test",
        );
        let job = EventReminderJob::new(store.clone(), attendance, 8);

        let sent = job.remind(now).await.unwrap();

        assert_eq!(sent, 1);
        let messages = mailer.sent_to("jane@example.com");
        assert_eq!(messages.len(), 1);
        assert!(messages[0].subject.contains("Repair café #1"));
        assert!(messages[0].body_text.contains("https://atelier.test/attendance/cancel/"));
    }

    #[test]
    fn test_runs_daily_at_configured_hour() {
        let store = Arc::new(InMemoryStore::new());
        let attendance = AttendanceService::new(
            store.clone(),
            store.clone(),
            Arc::new(MockMailer::new()),
            Arc::new(NoRoutes),
            TokenSigner::new("reminder-test-secret").unwrap(),
            "https://atelier.test",
        );
        let job = EventReminderJob::new(store, attendance, 7);
        assert_eq!(job.frequency(), JobFrequency::DailyAt { hour: 7 });
    }
}
