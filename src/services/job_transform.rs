use std::borrow::Cow;

use chrono::{DateTime, Utc};
use url::Url;
use validator::{ValidationError, ValidationErrors};

use crate::error::{Error, Result};
use crate::models::job::{EmploymentType, JobDraft, SalaryRange, WorkMode};
use crate::services::producer_service::RawJobItem;
use crate::utils::{time, validation};

const LOGO_SERVICE_URL: &str = "https://ui-avatars.com/api/";

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn http_url(value: Option<String>) -> Option<String> {
    let raw = clean(value)?;
    match Url::parse(&raw) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Some(url.to_string()),
        _ => {
            tracing::debug!(url = %raw, "Ignoring non-http source URL");
            None
        }
    }
}

/// A deadline that cannot be read would leave the record active forever, so
/// it rejects the item like any other model violation.
fn unparseable_deadline(text: &str) -> Error {
    let mut err = ValidationError::new("deadline_unparseable");
    err.message = Some(Cow::Owned(format!("deadline {:?} is not a date", text)));
    let mut errors = ValidationErrors::new();
    errors.add("deadline", err);
    Error::Validation(errors)
}

pub fn company_logo_url(company: &str) -> Option<String> {
    Url::parse_with_params(
        LOGO_SERVICE_URL,
        &[
            ("name", company),
            ("background", "random"),
            ("size", "50"),
            ("bold", "true"),
        ],
    )
    .ok()
    .map(|u| u.to_string())
}

/// Maps a producer item onto the canonical model and checks model invariants.
///
/// Missing titles and descriptions become empty strings rather than dropping the
/// item. A posted date in the future, or none at all, is replaced with `now`.
/// A deadline that does not parse or does not fall after the posted date, or an
/// inverted salary range, rejects the item.
pub fn transform(raw: RawJobItem, source_label: &str, now: DateTime<Utc>) -> Result<JobDraft> {
    let company = clean(raw.company);
    let location = clean(raw.location);

    let date_posted = raw
        .posted_date
        .as_deref()
        .and_then(time::parse_loose)
        .filter(|posted| *posted <= now)
        .unwrap_or(now);

    let deadline = match clean(raw.deadline) {
        Some(text) => Some(time::parse_loose(&text).ok_or_else(|| unparseable_deadline(&text))?),
        None => None,
    };

    let salary = raw
        .salary
        .map(|s| SalaryRange {
            from: s.from,
            to: s.to,
            currency: clean(s.currency).map(|c| c.to_ascii_uppercase()),
        })
        .unwrap_or_default();

    let employment_type = raw
        .job_type
        .as_deref()
        .and_then(EmploymentType::from_loose)
        .unwrap_or_default();

    let draft = JobDraft {
        title: clean(raw.title).unwrap_or_default(),
        description: clean(raw.description).unwrap_or_default(),
        company_logo: company.as_deref().and_then(company_logo_url),
        work_mode: WorkMode::infer_from_location(location.as_deref()),
        company,
        location,
        employment_type,
        salary,
        experience: clean(raw.experience),
        skills: raw.skills,
        date_posted,
        deadline,
        is_generated: true,
        source: source_label.to_string(),
        source_url: http_url(raw.url),
    };

    validation::validate(&draft)?;
    Ok(draft)
}
