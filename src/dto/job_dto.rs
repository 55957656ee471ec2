use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

fn default_count() -> usize {
    10
}

fn default_page() -> usize {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct GeneratedJobsQuery {
    #[serde(default = "default_count")]
    #[validate(range(min = 1))]
    pub count: usize,
    #[serde(default = "default_page")]
    #[validate(range(min = 1))]
    pub page: usize,
}

impl Default for GeneratedJobsQuery {
    fn default() -> Self {
        Self {
            count: default_count(),
            page: default_page(),
        }
    }
}

/// Outcome of an operator-triggered ingestion action.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RunResponse {
    pub action: String,
    /// False when the action was already running, failed or timed out.
    pub completed: bool,
    pub affected: usize,
}

impl RunResponse {
    pub fn from_outcome(action: &str, outcome: Option<usize>) -> Self {
        Self {
            action: action.to_string(),
            completed: outcome.is_some(),
            affected: outcome.unwrap_or(0),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CacheClearedResponse {
    pub cleared: bool,
}
