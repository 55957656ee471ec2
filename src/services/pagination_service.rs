use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex as AsyncMutex;
use utoipa::ToSchema;

use crate::error::{Error, Result};
use crate::models::job::JobDraft;
use crate::services::cache_service::FreshnessCache;
use crate::services::job_transform::transform;
use crate::services::producer_service::JobProducer;
use crate::utils::time::Clock;

pub const GENERATED_JOBS_CACHE_KEY: &str = "gemini_jobs";

pub type JobBatch = Arc<Vec<JobDraft>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMeta {
    pub current_page: usize,
    pub page_size: usize,
    pub total_jobs: usize,
    pub has_more: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct JobPage {
    pub jobs: Vec<JobDraft>,
    pub pagination: PaginationMeta,
}

/// `[(page-1)*page_size, page*page_size)` clipped to the batch. Pages past the
/// end come back empty with `has_more = false`.
pub fn slice_page(batch: &[JobDraft], page: usize, page_size: usize) -> JobPage {
    let total = batch.len();
    let start = page.saturating_sub(1).saturating_mul(page_size);
    let end = start.saturating_add(page_size);
    let jobs = if start >= total {
        Vec::new()
    } else {
        batch[start..end.min(total)].to_vec()
    };

    JobPage {
        jobs,
        pagination: PaginationMeta {
            current_page: page,
            page_size,
            total_jobs: total,
            has_more: end < total,
        },
    }
}

/// Serves pages of freshly generated jobs from a read-through cache.
#[derive(Clone)]
pub struct PaginationService {
    producer: Arc<dyn JobProducer>,
    cache: FreshnessCache<JobBatch>,
    clock: Arc<dyn Clock>,
    refresh_lock: Arc<AsyncMutex<()>>,
    /// Bumped after every refill attempt, successful or not.
    refresh_attempts: Arc<AtomicU64>,
    batch_size: usize,
    producer_timeout: Duration,
}

impl PaginationService {
    pub fn new(
        producer: Arc<dyn JobProducer>,
        cache: FreshnessCache<JobBatch>,
        clock: Arc<dyn Clock>,
        batch_size: usize,
        producer_timeout: Duration,
    ) -> Self {
        Self {
            producer,
            cache,
            clock,
            refresh_lock: Arc::new(AsyncMutex::new(())),
            refresh_attempts: Arc::new(AtomicU64::new(0)),
            batch_size,
            producer_timeout,
        }
    }

    pub fn cache(&self) -> &FreshnessCache<JobBatch> {
        &self.cache
    }

    pub async fn page(&self, page: usize, page_size: usize) -> Result<JobPage> {
        if page == 0 || page_size == 0 {
            return Err(Error::BadRequest(
                "page and count must be at least 1".to_string(),
            ));
        }
        let batch = self.batch().await;
        Ok(slice_page(&batch, page, page_size))
    }

    async fn batch(&self) -> JobBatch {
        if let Some(batch) = self.cache.get(GENERATED_JOBS_CACHE_KEY) {
            tracing::debug!(total = batch.len(), "Serving generated jobs from cache");
            return batch;
        }

        let observed = self.refresh_attempts.load(Ordering::Acquire);
        let _refresh = self.refresh_lock.lock().await;
        // Another request may have refilled the cache while this one waited.
        if let Some(batch) = self.cache.get(GENERATED_JOBS_CACHE_KEY) {
            return batch;
        }
        // A refill attempt finished while this request waited and left the cache
        // empty. Share its failure instead of queueing another producer call.
        if self.refresh_attempts.load(Ordering::Acquire) != observed {
            tracing::debug!("Refill failed while waiting, serving an empty batch");
            return Arc::new(Vec::new());
        }

        let outcome = self.fetch_batch().await;
        self.refresh_attempts.fetch_add(1, Ordering::AcqRel);
        match outcome {
            Ok(batch) => {
                tracing::info!(total = batch.len(), "Cached freshly generated jobs");
                self.cache.set(GENERATED_JOBS_CACHE_KEY, batch.clone());
                batch
            }
            Err(e) => {
                tracing::error!(error = %e, "Could not generate jobs for pagination");
                Arc::new(Vec::new())
            }
        }
    }

    async fn fetch_batch(&self) -> Result<JobBatch> {
        let raw_items = tokio::time::timeout(
            self.producer_timeout,
            self.producer.generate(self.batch_size),
        )
        .await
        .map_err(|_| {
            Error::Timeout(format!(
                "job producer did not answer within {:?}",
                self.producer_timeout
            ))
        })??;

        let source = self.producer.source_label();
        let now = self.clock.now();
        let drafts: Vec<JobDraft> = raw_items
            .into_iter()
            .filter_map(|raw| match transform(raw, &source, now) {
                Ok(draft) => Some(draft),
                Err(e) => {
                    tracing::warn!(error = %e, "Dropping invalid generated job from page batch");
                    None
                }
            })
            .collect();
        Ok(Arc::new(drafts))
    }
}
