use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};

use crate::dto::job_dto::{CacheClearedResponse, GeneratedJobsQuery, RunResponse};
use crate::error::Result;
use crate::services::pagination_service::GENERATED_JOBS_CACHE_KEY;
use crate::utils::validation;
use crate::AppState;

#[utoipa::path(
    get,
    path = "/api/v1/gemini-jobs",
    params(
        ("count" = Option<usize>, Query, description = "Jobs per page, default 10"),
        ("page" = Option<usize>, Query, description = "1-based page number, default 1")
    ),
    responses(
        (status = 200, description = "A page of freshly generated jobs", body = JobPage),
        (status = 400, description = "count or page below 1")
    )
)]
#[axum::debug_handler]
pub async fn list_generated_jobs(
    State(state): State<AppState>,
    Query(query): Query<GeneratedJobsQuery>,
) -> Result<impl IntoResponse> {
    validation::validate(&query)?;
    let page = state.generated_jobs.page(query.page, query.count).await?;
    Ok(Json(page))
}

#[utoipa::path(
    post,
    path = "/api/v1/gemini-jobs/ingest",
    responses(
        (status = 200, description = "Fetch-and-store cycle finished or was skipped", body = RunResponse),
        (status = 401, description = "Missing or wrong admin secret")
    )
)]
#[axum::debug_handler]
pub async fn trigger_ingest(State(state): State<AppState>) -> Result<impl IntoResponse> {
    tracing::info!("Manual fetch-and-store requested");
    let outcome = state.scheduler.run_fetch().await;
    Ok(Json(RunResponse::from_outcome("fetch_and_store", outcome)))
}

#[utoipa::path(
    post,
    path = "/api/v1/gemini-jobs/expire",
    responses(
        (status = 200, description = "Expiry cycle finished or was skipped", body = RunResponse),
        (status = 401, description = "Missing or wrong admin secret")
    )
)]
#[axum::debug_handler]
pub async fn trigger_expire(State(state): State<AppState>) -> Result<impl IntoResponse> {
    tracing::info!("Manual expire-and-deactivate requested");
    let outcome = state.scheduler.run_expire().await;
    Ok(Json(RunResponse::from_outcome("expire_and_deactivate", outcome)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/gemini-jobs/cache",
    responses(
        (status = 200, description = "Generated jobs cache dropped", body = CacheClearedResponse),
        (status = 401, description = "Missing or wrong admin secret")
    )
)]
#[axum::debug_handler]
pub async fn clear_cache(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let cleared = state.generated_jobs.cache().has(GENERATED_JOBS_CACHE_KEY);
    state.generated_jobs.cache().clear(Some(GENERATED_JOBS_CACHE_KEY));
    tracing::info!(cleared, "Generated jobs cache cleared");
    Ok(Json(CacheClearedResponse { cleared }))
}
