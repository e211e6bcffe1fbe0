//! Job scheduler infrastructure for background tasks.

use chrono::{DateTime, Duration as ChronoDuration, NaiveTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use domain::repositories::StoreError;
use domain::services::AttendanceError;

#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Attendance(#[from] AttendanceError),
}

/// When a job runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobFrequency {
    Seconds(u64),
    Minutes(u64),
    /// Once a day at the given UTC hour.
    DailyAt { hour: u32 },
}

impl JobFrequency {
    /// Time between two runs.
    pub fn period(&self) -> Duration {
        match self {
            JobFrequency::Seconds(secs) => Duration::from_secs(*secs),
            JobFrequency::Minutes(mins) => Duration::from_secs(*mins * 60),
            JobFrequency::DailyAt { .. } => Duration::from_secs(86_400),
        }
    }

    /// Delay from `now` until the first run.
    pub fn first_delay(&self, now: DateTime<Utc>) -> Duration {
        match self {
            JobFrequency::DailyAt { hour } => {
                let at = NaiveTime::from_hms_opt(*hour % 24, 0, 0).unwrap_or_default();
                let mut next = now.date_naive().and_time(at).and_utc();
                if next <= now {
                    next += ChronoDuration::days(1);
                }
                (next - now).to_std().unwrap_or_default()
            }
            other => other.period(),
        }
    }
}

/// A background job.
#[async_trait::async_trait]
pub trait Job: Send + Sync {
    fn name(&self) -> &'static str;

    fn frequency(&self) -> JobFrequency;

    async fn execute(&self) -> Result<(), JobError>;
}

/// Runs registered jobs on their own tokio tasks until shutdown.
pub struct JobScheduler {
    jobs: Vec<Arc<dyn Job>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl JobScheduler {
    pub fn new() -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            jobs: Vec::new(),
            shutdown_tx,
            shutdown_rx,
            handles: Vec::new(),
        }
    }

    pub fn register<J: Job + 'static>(&mut self, job: J) {
        self.jobs.push(Arc::new(job));
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn start(&mut self) {
        info!("Starting job scheduler with {} jobs", self.jobs.len());

        for job in &self.jobs {
            let job = Arc::clone(job);
            let mut shutdown_rx = self.shutdown_rx.clone();

            let handle = tokio::spawn(async move {
                let name = job.name();
                let frequency = job.frequency();
                let first = tokio::time::Instant::now() + frequency.first_delay(Utc::now());
                let mut interval = tokio::time::interval_at(first, frequency.period());

                info!(job = name, frequency = ?frequency, "Job scheduled");

                loop {
                    tokio::select! {
                        _ = interval.tick() => run_once(job.as_ref()).await,
                        _ = shutdown_rx.changed() => {
                            if *shutdown_rx.borrow() {
                                info!(job = name, "Job shutting down");
                                break;
                            }
                        }
                    }
                }
            });

            self.handles.push(handle);
        }
    }

    /// Signals every job to stop after its current run.
    pub fn shutdown(&self) {
        info!("Initiating job scheduler shutdown");
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn wait_for_shutdown(self, timeout: Duration) {
        let shutdown_future = async {
            for handle in self.handles {
                if let Err(e) = handle.await {
                    warn!("Job task panicked: {}", e);
                }
            }
        };

        match tokio::time::timeout(timeout, shutdown_future).await {
            Ok(()) => info!("All jobs completed gracefully"),
            Err(_) => warn!("Job shutdown timed out after {:?}", timeout),
        }
    }
}

impl Default for JobScheduler {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_once(job: &dyn Job) {
    let name = job.name();
    let start = std::time::Instant::now();
    match job.execute().await {
        Ok(()) => info!(
            job = name,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Job completed successfully"
        ),
        Err(e) => error!(
            job = name,
            elapsed_ms = start.elapsed().as_millis() as u64,
            error = %e,
            "Job failed"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingJob {
        runs: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl Job for CountingJob {
        fn name(&self) -> &'static str {
            "counting_job"
        }

        fn frequency(&self) -> JobFrequency {
            JobFrequency::Seconds(1)
        }

        async fn execute(&self) -> Result<(), JobError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Backend("still counted".into()).into())
        }
    }

    #[test]
    fn test_job_frequency_period() {
        assert_eq!(JobFrequency::Seconds(30).period(), Duration::from_secs(30));
        assert_eq!(JobFrequency::Minutes(60).period(), Duration::from_secs(3600));
        assert_eq!(
            JobFrequency::DailyAt { hour: 8 }.period(),
            Duration::from_secs(86_400)
        );
    }

    #[test]
    fn test_daily_first_delay() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 6, 30, 0).unwrap();
        assert_eq!(
            JobFrequency::DailyAt { hour: 8 }.first_delay(now),
            Duration::from_secs(90 * 60)
        );

        // Already past today's slot: run tomorrow.
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 8, 0, 0).unwrap();
        assert_eq!(
            JobFrequency::DailyAt { hour: 8 }.first_delay(now),
            Duration::from_secs(86_400)
        );
    }

    #[test]
    fn test_interval_first_delay_is_one_period() {
        let now = Utc::now();
        assert_eq!(
            JobFrequency::Minutes(5).first_delay(now),
            Duration::from_secs(300)
        );
    }

    #[tokio::test]
    async fn test_failed_run_is_logged_not_fatal() {
        let runs = Arc::new(AtomicUsize::new(0));
        let job = CountingJob { runs: runs.clone() };
        run_once(&job).await;
        run_once(&job).await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_scheduler_register_and_shutdown() {
        let mut scheduler = JobScheduler::default();
        assert!(scheduler.is_empty());
        scheduler.register(CountingJob {
            runs: Arc::new(AtomicUsize::new(0)),
        });
        assert_eq!(scheduler.len(), 1);

        scheduler.start();
        tokio::time::sleep(Duration::from_millis(50)).await;
        scheduler.shutdown();
        scheduler.wait_for_shutdown(Duration::from_secs(2)).await;
    }
}
