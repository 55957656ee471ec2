use axum::{response::IntoResponse, Json};
use utoipa::OpenApi;

use crate::dto::job_dto::{CacheClearedResponse, RunResponse};
use crate::models::job::{EmploymentType, JobDraft, SalaryRange, WorkMode};
use crate::services::pagination_service::{JobPage, PaginationMeta};

#[derive(OpenApi)]
#[openapi(
    paths(
        super::jobs::list_generated_jobs,
        super::jobs::trigger_ingest,
        super::jobs::trigger_expire,
        super::jobs::clear_cache,
    ),
    components(schemas(
        JobPage,
        PaginationMeta,
        JobDraft,
        SalaryRange,
        EmploymentType,
        WorkMode,
        RunResponse,
        CacheClearedResponse,
    )),
    tags((name = "gemini-jobs", description = "Generated job listings"))
)]
pub struct ApiDoc;

pub async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}
