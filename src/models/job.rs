use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgRow, FromRow, Row};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::utils::validation::validate_job_window;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
pub enum EmploymentType {
    #[default]
    #[serde(rename = "Full-time")]
    FullTime,
    #[serde(rename = "Part-time")]
    PartTime,
    Internship,
    Freelance,
    Contract,
}

impl EmploymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmploymentType::FullTime => "Full-time",
            EmploymentType::PartTime => "Part-time",
            EmploymentType::Internship => "Internship",
            EmploymentType::Freelance => "Freelance",
            EmploymentType::Contract => "Contract",
        }
    }

    /// Lenient match for producer spellings such as "full time", "FULL_TIME" or "Contractor".
    pub fn from_loose(raw: &str) -> Option<Self> {
        let key: String = raw
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "fulltime" | "permanent" => Some(EmploymentType::FullTime),
            "parttime" => Some(EmploymentType::PartTime),
            "internship" | "intern" => Some(EmploymentType::Internship),
            "freelance" | "freelancer" => Some(EmploymentType::Freelance),
            "contract" | "contractor" | "temporary" => Some(EmploymentType::Contract),
            _ => None,
        }
    }
}

impl fmt::Display for EmploymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmploymentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_loose(s).ok_or_else(|| format!("unknown employment type: {}", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
pub enum WorkMode {
    #[default]
    Onsite,
    Hybrid,
    Remote,
}

impl WorkMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkMode::Onsite => "Onsite",
            WorkMode::Hybrid => "Hybrid",
            WorkMode::Remote => "Remote",
        }
    }

    /// The producer carries no work mode, so it is read off the location text.
    pub fn infer_from_location(location: Option<&str>) -> Self {
        let Some(location) = location else {
            return WorkMode::Onsite;
        };
        let lowered = location.to_ascii_lowercase();
        if lowered.contains("remote") {
            WorkMode::Remote
        } else if lowered.contains("hybrid") {
            WorkMode::Hybrid
        } else {
            WorkMode::Onsite
        }
    }
}

impl fmt::Display for WorkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "onsite" | "on-site" => Ok(WorkMode::Onsite),
            "hybrid" => Ok(WorkMode::Hybrid),
            "remote" => Ok(WorkMode::Remote),
            other => Err(format!("unknown work mode: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SalaryRange {
    pub from: Option<Decimal>,
    pub to: Option<Decimal>,
    pub currency: Option<String>,
}

impl SalaryRange {
    pub fn is_ordered(&self) -> bool {
        match (self.from, self.to) {
            (Some(from), Some(to)) => from <= to,
            _ => true,
        }
    }
}

/// A persisted job posting.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub company: Option<String>,
    pub location: Option<String>,
    pub employment_type: EmploymentType,
    pub work_mode: WorkMode,
    pub salary: SalaryRange,
    pub experience: Option<String>,
    pub skills: Vec<String>,
    pub date_posted: DateTime<Utc>,
    pub deadline: Option<DateTime<Utc>>,
    pub applicants: Vec<Uuid>,
    pub active: bool,
    pub is_generated: bool,
    pub source: String,
    pub source_url: Option<String>,
    pub company_logo: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.deadline.map(|d| d < now).unwrap_or(false)
    }
}

impl<'r> FromRow<'r, PgRow> for Job {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        let employment_type: String = row.try_get("employment_type")?;
        let work_mode: String = row.try_get("work_mode")?;
        Ok(Self {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            company: row.try_get("company")?,
            location: row.try_get("location")?,
            employment_type: employment_type.parse().unwrap_or_default(),
            work_mode: work_mode.parse().unwrap_or_default(),
            salary: SalaryRange {
                from: row.try_get("salary_from")?,
                to: row.try_get("salary_to")?,
                currency: row.try_get("salary_currency")?,
            },
            experience: row.try_get("experience")?,
            skills: row.try_get("skills")?,
            date_posted: row.try_get("date_posted")?,
            deadline: row.try_get("deadline")?,
            applicants: row.try_get("applicants")?,
            active: row.try_get("active")?,
            is_generated: row.try_get("is_generated")?,
            source: row.try_get("source")?,
            source_url: row.try_get("source_url")?,
            company_logo: row.try_get("company_logo")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// A transformed, validated job that has not been persisted. This is both the
/// insert payload and the shape served from the read cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_job_window"))]
pub struct JobDraft {
    pub title: String,
    pub description: String,
    pub company: Option<String>,
    pub location: Option<String>,
    pub employment_type: EmploymentType,
    pub work_mode: WorkMode,
    pub salary: SalaryRange,
    pub experience: Option<String>,
    pub skills: Vec<String>,
    pub date_posted: DateTime<Utc>,
    pub deadline: Option<DateTime<Utc>>,
    pub is_generated: bool,
    pub source: String,
    pub source_url: Option<String>,
    pub company_logo: Option<String>,
}
