//! Publishes events whose publication time has come.

use chrono::Utc;
use domain::repositories::EventRepository;
use std::sync::Arc;
use tracing::info;

use super::scheduler::{Job, JobError, JobFrequency};

pub struct PublishEventsJob {
    events: Arc<dyn EventRepository>,
    interval_minutes: u64,
}

impl PublishEventsJob {
    pub fn new(events: Arc<dyn EventRepository>, interval_minutes: u64) -> Self {
        Self {
            events,
            interval_minutes: interval_minutes.max(1),
        }
    }
}

#[async_trait::async_trait]
impl Job for PublishEventsJob {
    fn name(&self) -> &'static str {
        "publish_events"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Minutes(self.interval_minutes)
    }

    async fn execute(&self) -> Result<(), JobError> {
        let published = self.events.publish_due(Utc::now()).await?;
        if published > 0 {
            info!(count = published, "Published due events");
        }
        Ok(())
    }
}
