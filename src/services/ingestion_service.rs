use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::models::job::Job;
use crate::services::job_store::{JobQuery, JobStore};
use crate::services::job_transform::transform;
use crate::services::producer_service::{JobProducer, RawJobItem};
use crate::utils::time::Clock;

#[derive(Clone)]
pub struct IngestionService {
    store: Arc<dyn JobStore>,
    producer: Arc<dyn JobProducer>,
    clock: Arc<dyn Clock>,
    batch_size: usize,
    producer_timeout: Duration,
}

#[derive(Debug, Default)]
struct BatchSummary {
    fetched: usize,
    persisted: usize,
    rejected: usize,
    duplicates: usize,
    failed: usize,
}

impl IngestionService {
    pub fn new(
        store: Arc<dyn JobStore>,
        producer: Arc<dyn JobProducer>,
        clock: Arc<dyn Clock>,
        batch_size: usize,
        producer_timeout: Duration,
    ) -> Self {
        Self {
            store,
            producer,
            clock,
            batch_size,
            producer_timeout,
        }
    }

    async fn request_batch(&self) -> Result<Vec<RawJobItem>> {
        tokio::time::timeout(self.producer_timeout, self.producer.generate(self.batch_size))
            .await
            .map_err(|_| {
                Error::Timeout(format!(
                    "job producer did not answer within {:?}",
                    self.producer_timeout
                ))
            })?
    }

    /// Whether a generated record with this source URL is already stored.
    async fn is_known(&self, source_url: &str) -> Result<bool> {
        let existing = self
            .store
            .find(&JobQuery::generated().source_url(source_url).limit(1))
            .await?;
        Ok(!existing.is_empty())
    }

    /// Pulls one batch from the producer and stores every acceptable item.
    ///
    /// Never fails: producer errors yield an empty result, and a record that
    /// cannot be stored is skipped so the rest of the batch still goes through.
    /// Records are inserted one at a time, in the order the producer returned them.
    pub async fn fetch_and_store(&self) -> Vec<Job> {
        let raw_items = match self.request_batch().await {
            Ok(items) => items,
            Err(e) => {
                tracing::error!(error = %e, transient = e.is_transient(), "Job fetch failed");
                return Vec::new();
            }
        };
        if raw_items.is_empty() {
            tracing::warn!("Job producer returned no items");
            return Vec::new();
        }

        let source = self.producer.source_label();
        let now = self.clock.now();
        let mut summary = BatchSummary {
            fetched: raw_items.len(),
            ..BatchSummary::default()
        };
        let mut seen_urls: HashSet<String> = HashSet::new();
        let mut saved = Vec::with_capacity(raw_items.len());

        for (idx, raw) in raw_items.into_iter().enumerate() {
            let draft = match transform(raw, &source, now) {
                Ok(draft) => draft,
                Err(e) => {
                    tracing::warn!(index = idx, error = %e, "Rejected generated job");
                    summary.rejected += 1;
                    continue;
                }
            };

            if let Some(url) = draft.source_url.as_deref() {
                if !seen_urls.insert(url.to_string()) {
                    summary.duplicates += 1;
                    continue;
                }
                match self.is_known(url).await {
                    Ok(true) => {
                        tracing::debug!(url, "Skipping already stored job");
                        summary.duplicates += 1;
                        continue;
                    }
                    Ok(false) => {}
                    Err(e) => {
                        tracing::error!(index = idx, error = %e, "Duplicate check failed");
                        summary.failed += 1;
                        continue;
                    }
                }
            }

            let title = draft.title.clone();
            match self.store.insert(draft).await {
                Ok(job) => {
                    summary.persisted += 1;
                    saved.push(job);
                }
                Err(e) => {
                    tracing::error!(index = idx, title = %title, error = %e, "Failed to store generated job");
                    summary.failed += 1;
                }
            }
        }

        tracing::info!(
            fetched = summary.fetched,
            persisted = summary.persisted,
            rejected = summary.rejected,
            duplicates = summary.duplicates,
            failed = summary.failed,
            source = %source,
            "Stored generated jobs"
        );
        saved
    }

    /// Deactivates every generated, still-active record whose deadline has passed.
    /// Applicants on a record do not change whether it is deactivated.
    pub async fn expire_and_deactivate(&self) -> Result<Vec<Job>> {
        let now = self.clock.now();
        let expired = self.store.find(&JobQuery::expired_generated(now)).await?;
        if expired.is_empty() {
            tracing::debug!("No expired generated jobs");
            return Ok(Vec::new());
        }

        let total = expired.len();
        let with_applicants = expired.iter().filter(|j| !j.applicants.is_empty()).count();
        let mut deactivated = Vec::with_capacity(total);

        for mut job in expired {
            job.active = false;
            match self.store.save(&job).await {
                Ok(saved) => deactivated.push(saved),
                Err(e) => {
                    tracing::error!(job_id = %job.id, error = %e, "Failed to deactivate expired job");
                }
            }
        }

        tracing::info!(
            expired = total,
            deactivated = deactivated.len(),
            with_applicants,
            "Deactivated expired generated jobs"
        );
        Ok(deactivated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::job::{EmploymentType, JobDraft, SalaryRange, WorkMode};
    use crate::services::job_store::MockJobStore;
    use crate::services::producer_service::MockJobProducer;
    use crate::utils::time::ManualClock;
    use chrono::{DateTime, TimeZone, Utc};
    use mockall::predicate::eq;
    use mockall::Sequence;
    use uuid::Uuid;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 20, 10, 0, 0).unwrap()
    }

    fn item(title: Option<&str>, url: Option<&str>) -> RawJobItem {
        RawJobItem {
            title: title.map(str::to_string),
            company: Some("Acme".into()),
            description: Some("Ship things.".into()),
            location: Some("Austin, USA".into()),
            job_type: Some("Contract".into()),
            url: url.map(str::to_string),
            posted_date: Some("2026-02-19".into()),
            deadline: Some("2026-03-10".into()),
            ..RawJobItem::default()
        }
    }

    fn stored(draft: JobDraft) -> Job {
        Job {
            id: Uuid::new_v4(),
            title: draft.title,
            description: draft.description,
            company: draft.company,
            location: draft.location,
            employment_type: draft.employment_type,
            work_mode: draft.work_mode,
            salary: draft.salary,
            experience: draft.experience,
            skills: draft.skills,
            date_posted: draft.date_posted,
            deadline: draft.deadline,
            applicants: vec![],
            active: true,
            is_generated: draft.is_generated,
            source: draft.source,
            source_url: draft.source_url,
            company_logo: draft.company_logo,
            created_at: Some(now()),
            updated_at: None,
        }
    }

    fn expired_job(applicants: usize) -> Job {
        Job {
            id: Uuid::new_v4(),
            title: "Old posting".into(),
            description: String::new(),
            company: None,
            location: None,
            employment_type: EmploymentType::FullTime,
            work_mode: WorkMode::Onsite,
            salary: SalaryRange::default(),
            experience: None,
            skills: vec![],
            date_posted: now() - chrono::Duration::days(40),
            deadline: Some(now() - chrono::Duration::days(1)),
            applicants: (0..applicants).map(|_| Uuid::new_v4()).collect(),
            active: true,
            is_generated: true,
            source: "Gemini Real Jobs".into(),
            source_url: None,
            company_logo: None,
            created_at: None,
            updated_at: None,
        }
    }

    fn producer_returning(items: Vec<RawJobItem>) -> MockJobProducer {
        let mut producer = MockJobProducer::new();
        producer
            .expect_source_label()
            .return_const("Gemini Real Jobs".to_string());
        producer
            .expect_generate()
            .with(eq(10))
            .times(1)
            .return_once(move |_| Ok(items));
        producer
    }

    fn service(store: MockJobStore, producer: MockJobProducer) -> IngestionService {
        IngestionService::new(
            Arc::new(store),
            Arc::new(producer),
            Arc::new(ManualClock::new(now())),
            10,
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn missing_title_is_still_persisted() {
        let producer = producer_returning(vec![
            item(Some("Rust Engineer"), None),
            item(None, None),
            item(Some("SRE"), None),
        ]);
        let mut store = MockJobStore::new();
        store.expect_find().never();
        store
            .expect_insert()
            .times(3)
            .returning(|draft| Ok(stored(draft)));

        let saved = service(store, producer).fetch_and_store().await;
        assert_eq!(saved.len(), 3);
        assert_eq!(saved[1].title, "");
        assert!(saved
            .iter()
            .all(|j| j.is_generated && j.source == "Gemini Real Jobs"));
    }

    #[tokio::test]
    async fn invalid_items_never_reach_the_store() {
        let mut bad = item(Some("Time traveller"), None);
        bad.deadline = Some("2026-01-01".into());
        let producer = producer_returning(vec![bad, item(Some("QA"), None)]);
        let mut store = MockJobStore::new();
        store
            .expect_insert()
            .withf(|draft: &JobDraft| draft.title == "QA")
            .times(1)
            .returning(|draft| Ok(stored(draft)));

        let saved = service(store, producer).fetch_and_store().await;
        assert_eq!(saved.len(), 1);
    }

    #[tokio::test]
    async fn one_failed_insert_does_not_stop_the_batch() {
        let producer = producer_returning(vec![
            item(Some("A"), None),
            item(Some("B"), None),
            item(Some("C"), None),
        ]);
        let mut store = MockJobStore::new();
        let mut seq = Sequence::new();
        store
            .expect_insert()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|draft| Ok(stored(draft)));
        store
            .expect_insert()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(Error::Internal("connection reset".into())));
        store
            .expect_insert()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|draft| Ok(stored(draft)));

        let saved = service(store, producer).fetch_and_store().await;
        let titles: Vec<_> = saved.iter().map(|j| j.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "C"]);
    }

    #[tokio::test]
    async fn known_and_repeated_urls_are_skipped() {
        let producer = producer_returning(vec![
            item(Some("New"), Some("https://jobs.example.com/new")),
            item(Some("New again"), Some("https://jobs.example.com/new")),
            item(Some("Old"), Some("https://jobs.example.com/old")),
        ]);
        let mut store = MockJobStore::new();
        store.expect_find().times(2).returning(|query| {
            if query.source_url.as_deref() == Some("https://jobs.example.com/old") {
                Ok(vec![expired_job(0)])
            } else {
                Ok(vec![])
            }
        });
        store
            .expect_insert()
            .times(1)
            .returning(|draft| Ok(stored(draft)));

        let saved = service(store, producer).fetch_and_store().await;
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].title, "New");
    }

    #[tokio::test]
    async fn producer_failure_yields_empty_result() {
        let mut producer = MockJobProducer::new();
        producer
            .expect_generate()
            .returning(|_| Err(Error::Producer("quota exceeded".into())));
        let mut store = MockJobStore::new();
        store.expect_insert().never();

        let saved = service(store, producer).fetch_and_store().await;
        assert!(saved.is_empty());
    }

    #[tokio::test]
    async fn expiry_deactivates_records_with_and_without_applicants() {
        let expired: Vec<Job> = vec![
            expired_job(0),
            expired_job(2),
            expired_job(0),
            expired_job(1),
            expired_job(0),
        ];
        let mut store = MockJobStore::new();
        store
            .expect_find()
            .withf(|q: &JobQuery| *q == JobQuery::expired_generated(now()))
            .times(1)
            .return_once(move |_| Ok(expired));
        store
            .expect_save()
            .withf(|job: &Job| !job.active)
            .times(5)
            .returning(|job| Ok(job.clone()));

        let producer = MockJobProducer::new();
        let deactivated = service(store, producer).expire_and_deactivate().await.unwrap();
        assert_eq!(deactivated.len(), 5);
        assert_eq!(
            deactivated.iter().filter(|j| !j.applicants.is_empty()).count(),
            2
        );
    }

    #[tokio::test]
    async fn expiry_continues_past_a_failed_save() {
        let expired = vec![expired_job(0), expired_job(0), expired_job(0)];
        let failing_id = expired[1].id;
        let mut store = MockJobStore::new();
        store.expect_find().return_once(move |_| Ok(expired));
        store.expect_save().times(3).returning(move |job| {
            if job.id == failing_id {
                Err(Error::Internal("deadlock".into()))
            } else {
                Ok(job.clone())
            }
        });

        let producer = MockJobProducer::new();
        let deactivated = service(store, producer).expire_and_deactivate().await.unwrap();
        assert_eq!(deactivated.len(), 2);
    }
}
