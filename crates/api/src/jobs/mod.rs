//! Background job scheduler and job implementations.

mod event_reminder;
mod pool_metrics;
mod publish_events;
mod scheduler;

pub use event_reminder::EventReminderJob;
pub use pool_metrics::PoolMetricsJob;
pub use publish_events::PublishEventsJob;
pub use scheduler::{Job, JobError, JobFrequency, JobScheduler};
