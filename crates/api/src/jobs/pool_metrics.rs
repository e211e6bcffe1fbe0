//! Connection pool gauges, sampled every ten seconds.

use persistence::metrics::record_pool_metrics;
use sqlx::PgPool;
use tracing::warn;

use super::scheduler::{Job, JobError, JobFrequency};

pub struct PoolMetricsJob {
    pool: PgPool,
}

impl PoolMetricsJob {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl Job for PoolMetricsJob {
    fn name(&self) -> &'static str {
        "pool_metrics"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Seconds(10)
    }

    async fn execute(&self) -> Result<(), JobError> {
        let stats = record_pool_metrics(&self.pool);
        if stats.is_saturated() {
            // Attendance links queue behind the row lock when this persists.
            warn!(
                active = stats.active(),
                max = stats.max,
                "Database pool saturated"
            );
        }
        Ok(())
    }
}
