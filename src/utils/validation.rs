use std::borrow::Cow;

use validator::{Validate, ValidationError};

use crate::models::job::JobDraft;

pub fn validate<T: Validate>(val: &T) -> Result<(), validator::ValidationErrors> {
    val.validate()
}

/// Model invariants that a producer item must satisfy before it may be stored.
pub fn validate_job_window(job: &JobDraft) -> Result<(), ValidationError> {
    if let Some(deadline) = job.deadline {
        if deadline <= job.date_posted {
            let mut err = ValidationError::new("deadline_not_after_date_posted");
            err.message = Some(Cow::Owned(format!(
                "deadline {} is not after date posted {}",
                deadline.to_rfc3339(),
                job.date_posted.to_rfc3339()
            )));
            return Err(err);
        }
    }
    if !job.salary.is_ordered() {
        let mut err = ValidationError::new("salary_range_inverted");
        err.message = Some(Cow::Borrowed("salary lower bound exceeds upper bound"));
        return Err(err);
    }
    Ok(())
}
