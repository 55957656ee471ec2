//! Recurring ingestion actions on wall-clock aligned cron triggers.
//!
//! Two independent jobs are registered:
//! - fetch-and-store, every `fetch_interval_hours` (default 2)
//! - expire-and-deactivate, every `expire_interval_hours` (default 1)
//!
//! A failed run is logged and the next trigger fires as usual. A run that is
//! still going when its next trigger fires causes that trigger to be skipped.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::config::IngestionSettings;
use crate::error::{Error, Result};
use crate::services::ingestion_service::IngestionService;

/// Six-field cron (with seconds) firing at the top of every `hours`-th hour, UTC.
///
/// The hour field restarts at midnight, so only divisors of 24 give evenly
/// spaced runs; anything else is rejected.
pub fn cron_every_hours(hours: u32) -> Result<String> {
    match hours {
        1 => Ok("0 0 * * * *".to_string()),
        24 => Ok("0 0 0 * * *".to_string()),
        h if is_day_divisor(h) => Ok(format!("0 0 */{} * * *", h)),
        other => Err(Error::Config(format!(
            "interval must divide 24 hours evenly, got {}",
            other
        ))),
    }
}

/// 1, 2, 3, 4, 6, 8, 12 or 24.
pub fn is_day_divisor(hours: u32) -> bool {
    hours > 0 && 24 % hours == 0
}

/// Skip-if-running guard for one action.
#[derive(Clone, Default)]
pub struct RunGuard {
    running: Arc<AtomicBool>,
}

pub struct RunPermit {
    running: Arc<AtomicBool>,
}

impl RunGuard {
    pub fn try_acquire(&self) -> Option<RunPermit> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunPermit {
                running: self.running.clone(),
            })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

impl Drop for RunPermit {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

/// Runs one action inside its failure boundary. Returns `None` when the action
/// was skipped, failed, or timed out.
async fn run_bounded<T, F>(name: &str, guard: &RunGuard, limit: Duration, action: F) -> Option<T>
where
    F: Future<Output = Result<T>>,
{
    let Some(_permit) = guard.try_acquire() else {
        tracing::warn!(action = name, "Previous run still in progress, skipping");
        return None;
    };

    tracing::info!(action = name, "Scheduled run started");
    match tokio::time::timeout(limit, action).await {
        Ok(Ok(value)) => Some(value),
        Ok(Err(e)) => {
            tracing::error!(action = name, error = %e, "Scheduled run failed, will retry on next trigger");
            None
        }
        Err(_) => {
            tracing::error!(action = name, limit = ?limit, "Scheduled run timed out");
            None
        }
    }
}

#[derive(Clone)]
pub struct IngestionScheduler {
    ingestion: IngestionService,
    settings: IngestionSettings,
    fetch_guard: RunGuard,
    expire_guard: RunGuard,
}

impl IngestionScheduler {
    pub fn new(ingestion: IngestionService, settings: IngestionSettings) -> Self {
        Self {
            ingestion,
            settings,
            fetch_guard: RunGuard::default(),
            expire_guard: RunGuard::default(),
        }
    }

    /// Upper bound for a whole run: the producer call plus per-record writes.
    fn action_timeout(&self) -> Duration {
        self.settings.producer_timeout + Duration::from_secs(300)
    }

    /// One fetch-and-store cycle. Returns how many records were stored, or
    /// `None` if the cycle was skipped because another one is running.
    pub async fn run_fetch(&self) -> Option<usize> {
        let ingestion = self.ingestion.clone();
        run_bounded("fetch_and_store", &self.fetch_guard, self.action_timeout(), async move {
            Ok(ingestion.fetch_and_store().await.len())
        })
        .await
    }

    /// One expire-and-deactivate cycle. Returns how many records were deactivated.
    pub async fn run_expire(&self) -> Option<usize> {
        let ingestion = self.ingestion.clone();
        run_bounded(
            "expire_and_deactivate",
            &self.expire_guard,
            self.action_timeout(),
            async move { ingestion.expire_and_deactivate().await.map(|jobs| jobs.len()) },
        )
        .await
    }

    /// Registers both recurring actions and starts the cron scheduler. The
    /// returned handle must be kept alive; dropping it stops the jobs.
    pub async fn start(&self) -> Result<JobScheduler> {
        let fetch_cron = cron_every_hours(self.settings.fetch_interval_hours)?;
        let expire_cron = cron_every_hours(self.settings.expire_interval_hours)?;
        let scheduler = JobScheduler::new().await?;

        let fetch_self = self.clone();
        let fetch_job = Job::new_async(fetch_cron.as_str(), move |_uuid, _lock| {
            let this = fetch_self.clone();
            Box::pin(async move {
                if let Some(stored) = this.run_fetch().await {
                    tracing::info!(stored, "Scheduled job fetch finished");
                }
            })
        })?;
        scheduler.add(fetch_job).await?;

        let expire_self = self.clone();
        let expire_job = Job::new_async(expire_cron.as_str(), move |_uuid, _lock| {
            let this = expire_self.clone();
            Box::pin(async move {
                if let Some(deactivated) = this.run_expire().await {
                    tracing::info!(deactivated, "Scheduled expiry check finished");
                }
            })
        })?;
        scheduler.add(expire_job).await?;

        scheduler.start().await?;
        tracing::info!(
            fetch_every_hours = self.settings.fetch_interval_hours,
            expire_every_hours = self.settings.expire_interval_hours,
            fetch_cron = %fetch_cron,
            expire_cron = %expire_cron,
            "Job scheduler initialized"
        );
        Ok(scheduler)
    }

    /// Fires one fetch in the background. Startup never waits on it; the result
    /// only shows up in the logs.
    pub fn spawn_startup_fetch(&self) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            tracing::info!("Attempting initial job fetch on startup");
            match this.run_fetch().await {
                Some(stored) if stored > 0 => {
                    tracing::info!(stored, "Initial job fetch completed")
                }
                _ => tracing::warn!(
                    "Initial job fetch stored nothing (non-critical, the scheduler will retry)"
                ),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::job_store::MockJobStore;
    use crate::services::producer_service::MockJobProducer;
    use crate::utils::time::SystemClock;

    #[test]
    fn cron_expressions_align_to_the_hour() {
        assert_eq!(cron_every_hours(1).unwrap(), "0 0 * * * *");
        assert_eq!(cron_every_hours(2).unwrap(), "0 0 */2 * * *");
        assert_eq!(cron_every_hours(8).unwrap(), "0 0 */8 * * *");
        assert_eq!(cron_every_hours(24).unwrap(), "0 0 0 * * *");
        assert!(cron_every_hours(0).is_err());
        assert!(cron_every_hours(25).is_err());
    }

    #[test]
    fn uneven_intervals_are_rejected() {
        for hours in [5, 7, 9, 10, 11, 13, 23] {
            assert!(cron_every_hours(hours).is_err(), "{} hours", hours);
        }
    }

    #[test]
    fn guard_allows_one_holder_at_a_time() {
        let guard = RunGuard::default();
        let permit = guard.try_acquire().expect("first acquire");
        assert!(guard.is_running());
        assert!(guard.try_acquire().is_none());
        drop(permit);
        assert!(!guard.is_running());
        assert!(guard.try_acquire().is_some());
    }

    #[tokio::test]
    async fn overlapping_run_is_skipped() {
        let guard = RunGuard::default();
        let _held = guard.try_acquire().unwrap();
        let ran = run_bounded("test", &guard, Duration::from_secs(1), async { Ok(1) }).await;
        assert_eq!(ran, None);
    }

    #[tokio::test]
    async fn failed_run_releases_the_guard() {
        let guard = RunGuard::default();
        let failed: Option<()> = run_bounded("test", &guard, Duration::from_secs(1), async {
            Err(Error::Internal("boom".into()))
        })
        .await;
        assert_eq!(failed, None);
        assert!(!guard.is_running());
    }

    #[tokio::test]
    async fn slow_run_times_out() {
        let guard = RunGuard::default();
        let ran = run_bounded("test", &guard, Duration::from_millis(20), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert_eq!(ran, None);
        assert!(!guard.is_running());
    }

    #[tokio::test]
    async fn startup_fetch_survives_producer_failure() {
        let mut producer = MockJobProducer::new();
        producer
            .expect_generate()
            .times(2)
            .returning(|_| Err(Error::Config("GEMINI_API_KEY is not set".into())));
        let store = MockJobStore::new();
        let ingestion = IngestionService::new(
            Arc::new(store),
            Arc::new(producer),
            Arc::new(SystemClock),
            10,
            Duration::from_secs(1),
        );
        let scheduler = IngestionScheduler::new(ingestion, IngestionSettings::default());

        scheduler
            .spawn_startup_fetch()
            .await
            .expect("startup task must not panic");
        assert_eq!(scheduler.run_fetch().await, Some(0));
    }
}
