//! Query timing and connection pool gauges.

use metrics::{gauge, histogram};
use sqlx::PgPool;
use std::time::Instant;

pub fn record_query_duration(query_name: &str, duration_secs: f64) {
    histogram!(
        "database_query_duration_seconds",
        "query" => query_name.to_string()
    )
    .record(duration_secs);
}

/// Snapshot of the connection pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub size: u32,
    pub idle: u32,
    pub max: u32,
}

impl PoolStats {
    pub fn of(pool: &PgPool) -> Self {
        Self {
            size: pool.size(),
            idle: pool.num_idle() as u32,
            max: pool.options().get_max_connections(),
        }
    }

    pub fn active(&self) -> u32 {
        self.size.saturating_sub(self.idle)
    }

    /// Every connection the pool may open is checked out.
    pub fn is_saturated(&self) -> bool {
        self.max > 0 && self.active() >= self.max
    }
}

/// Publishes the pool gauges and returns the snapshot they came from.
pub fn record_pool_metrics(pool: &PgPool) -> PoolStats {
    let stats = PoolStats::of(pool);
    gauge!("database_connections_active").set(stats.active() as f64);
    gauge!("database_connections_idle").set(stats.idle as f64);
    gauge!("database_connections_total").set(stats.size as f64);
    stats
}

/// Times one repository operation; transactions count as a single query.
pub struct QueryTimer {
    query_name: &'static str,
    start: Instant,
}

impl QueryTimer {
    pub fn new(query_name: &'static str) -> Self {
        Self {
            query_name,
            start: Instant::now(),
        }
    }

    pub fn record(self) {
        record_query_duration(self.query_name, self.start.elapsed().as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_timer_keeps_name() {
        let timer = QueryTimer::new("find_event_by_id");
        assert_eq!(timer.query_name, "find_event_by_id");
    }

    #[test]
    fn test_record_without_recorder_is_noop() {
        QueryTimer::new("publish_due_events").record();
    }

    #[test]
    fn test_pool_saturation() {
        let busy = PoolStats {
            size: 10,
            idle: 0,
            max: 10,
        };
        assert_eq!(busy.active(), 10);
        assert!(busy.is_saturated());

        let relaxed = PoolStats {
            size: 10,
            idle: 4,
            max: 10,
        };
        assert_eq!(relaxed.active(), 6);
        assert!(!relaxed.is_saturated());

        let empty = PoolStats {
            size: 0,
            idle: 0,
            max: 0,
        };
        assert!(!empty.is_saturated());
    }
}
