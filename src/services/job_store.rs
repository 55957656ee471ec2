use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::error::Result;
use crate::models::job::{Job, JobDraft};

const JOB_COLUMNS: &str = "id, title, description, company, location, employment_type, work_mode, \
    salary_from, salary_to, salary_currency, experience, skills, date_posted, deadline, applicants, \
    active, is_generated, source, source_url, company_logo, created_at, updated_at";

/// Conjunction of optional filters. An unset field matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobQuery {
    pub is_generated: Option<bool>,
    pub active: Option<bool>,
    pub deadline_before: Option<DateTime<Utc>>,
    pub source_url: Option<String>,
    pub limit: Option<i64>,
}

impl JobQuery {
    pub fn generated() -> Self {
        Self {
            is_generated: Some(true),
            ..Self::default()
        }
    }

    pub fn active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }

    pub fn deadline_before(mut self, at: DateTime<Utc>) -> Self {
        self.deadline_before = Some(at);
        self
    }

    pub fn source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Generated, still-active postings whose deadline has passed.
    pub fn expired_generated(now: DateTime<Utc>) -> Self {
        Self::generated().active(true).deadline_before(now)
    }

    /// In-process evaluation of the predicate, equivalent to the SQL built by
    /// [`PgJobStore`]. A job without a deadline never matches `deadline_before`.
    pub fn matches(&self, job: &Job) -> bool {
        if let Some(flag) = self.is_generated {
            if job.is_generated != flag {
                return false;
            }
        }
        if let Some(flag) = self.active {
            if job.active != flag {
                return false;
            }
        }
        if let Some(at) = self.deadline_before {
            if !job.is_expired_at(at) {
                return false;
            }
        }
        if let Some(url) = &self.source_url {
            if job.source_url.as_deref() != Some(url.as_str()) {
                return false;
            }
        }
        true
    }

    fn push_where(&self, builder: &mut QueryBuilder<'_, Postgres>) {
        let mut sep = " WHERE ";
        if let Some(flag) = self.is_generated {
            builder.push(sep).push("is_generated = ").push_bind(flag);
            sep = " AND ";
        }
        if let Some(flag) = self.active {
            builder.push(sep).push("active = ").push_bind(flag);
            sep = " AND ";
        }
        if let Some(at) = self.deadline_before {
            builder.push(sep).push("deadline < ").push_bind(at);
            sep = " AND ";
        }
        if let Some(url) = &self.source_url {
            builder.push(sep).push("source_url = ").push_bind(url.clone());
        }
    }
}

/// Durable persistence for job postings.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn find(&self, query: &JobQuery) -> Result<Vec<Job>>;

    /// Persists a new posting; the store assigns the identifier.
    async fn insert(&self, draft: JobDraft) -> Result<Job>;

    /// Updates an existing posting in place, by identifier.
    async fn save(&self, job: &Job) -> Result<Job>;
}

#[derive(Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn find(&self, query: &JobQuery) -> Result<Vec<Job>> {
        let mut builder = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM jobs", JOB_COLUMNS));
        query.push_where(&mut builder);
        builder.push(" ORDER BY date_posted DESC");
        if let Some(limit) = query.limit {
            builder.push(" LIMIT ").push_bind(limit);
        }

        let jobs = builder
            .build_query_as::<Job>()
            .fetch_all(&self.pool)
            .await?;
        Ok(jobs)
    }

    async fn insert(&self, draft: JobDraft) -> Result<Job> {
        let sql = format!(
            r#"
            INSERT INTO jobs (
                title, description, company, location, employment_type, work_mode,
                salary_from, salary_to, salary_currency, experience, skills,
                date_posted, deadline, is_generated, source, source_url, company_logo
            ) VALUES (
                $1,$2,$3,$4,$5,$6,
                $7,$8,$9,$10,$11,
                $12,$13,$14,$15,$16,$17
            )
            RETURNING {}
            "#,
            JOB_COLUMNS
        );

        let job = sqlx::query_as::<_, Job>(&sql)
            .bind(draft.title)
            .bind(draft.description)
            .bind(draft.company)
            .bind(draft.location)
            .bind(draft.employment_type.as_str())
            .bind(draft.work_mode.as_str())
            .bind(draft.salary.from)
            .bind(draft.salary.to)
            .bind(draft.salary.currency)
            .bind(draft.experience)
            .bind(draft.skills)
            .bind(draft.date_posted)
            .bind(draft.deadline)
            .bind(draft.is_generated)
            .bind(draft.source)
            .bind(draft.source_url)
            .bind(draft.company_logo)
            .fetch_one(&self.pool)
            .await?;

        Ok(job)
    }

    async fn save(&self, job: &Job) -> Result<Job> {
        // `active` can only move from true to false here; reactivation is an
        // administrative action outside this service.
        let sql = format!(
            r#"
            UPDATE jobs
            SET
                title = $2,
                description = $3,
                company = $4,
                location = $5,
                employment_type = $6,
                work_mode = $7,
                salary_from = $8,
                salary_to = $9,
                salary_currency = $10,
                experience = $11,
                skills = $12,
                deadline = $13,
                applicants = $14,
                active = active AND $15,
                source_url = $16,
                company_logo = $17,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            JOB_COLUMNS
        );

        let saved = sqlx::query_as::<_, Job>(&sql)
            .bind(job.id)
            .bind(&job.title)
            .bind(&job.description)
            .bind(&job.company)
            .bind(&job.location)
            .bind(job.employment_type.as_str())
            .bind(job.work_mode.as_str())
            .bind(job.salary.from)
            .bind(job.salary.to)
            .bind(&job.salary.currency)
            .bind(&job.experience)
            .bind(&job.skills)
            .bind(job.deadline)
            .bind(&job.applicants)
            .bind(job.active)
            .bind(&job.source_url)
            .bind(&job.company_logo)
            .fetch_one(&self.pool)
            .await?;

        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::job::{EmploymentType, SalaryRange, WorkMode};
    use chrono::Duration;
    use uuid::Uuid;

    fn job(is_generated: bool, active: bool, deadline: Option<DateTime<Utc>>) -> Job {
        Job {
            id: Uuid::new_v4(),
            title: "Backend Engineer".into(),
            description: "Build APIs".into(),
            company: Some("Acme".into()),
            location: Some("Berlin, Germany".into()),
            employment_type: EmploymentType::FullTime,
            work_mode: WorkMode::Onsite,
            salary: SalaryRange::default(),
            experience: None,
            skills: vec![],
            date_posted: Utc::now() - Duration::days(10),
            deadline,
            applicants: vec![],
            active,
            is_generated,
            source: "Gemini Real Jobs".into(),
            source_url: Some("https://jobs.example.com/1".into()),
            company_logo: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn expired_query_requires_every_condition() {
        let now = Utc::now();
        let past = Some(now - Duration::hours(1));
        let future = Some(now + Duration::hours(1));
        let query = JobQuery::expired_generated(now);

        assert!(query.matches(&job(true, true, past)));
        assert!(!query.matches(&job(false, true, past)));
        assert!(!query.matches(&job(true, false, past)));
        assert!(!query.matches(&job(true, true, future)));
        assert!(!query.matches(&job(true, true, None)));
    }

    #[test]
    fn source_url_filter_is_exact() {
        let j = job(true, true, None);
        assert!(JobQuery::generated()
            .source_url("https://jobs.example.com/1")
            .matches(&j));
        assert!(!JobQuery::generated()
            .source_url("https://jobs.example.com/2")
            .matches(&j));
    }

    #[test]
    fn where_clause_binds_only_set_filters() {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT id FROM jobs");
        JobQuery::expired_generated(Utc::now()).push_where(&mut builder);
        assert_eq!(
            builder.sql(),
            "SELECT id FROM jobs WHERE is_generated = $1 AND active = $2 AND deadline < $3"
        );

        let mut empty = QueryBuilder::<Postgres>::new("SELECT id FROM jobs");
        JobQuery::default().push_where(&mut empty);
        assert_eq!(empty.sql(), "SELECT id FROM jobs");
    }
}
