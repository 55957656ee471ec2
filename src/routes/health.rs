use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::services::pagination_service::GENERATED_JOBS_CACHE_KEY;
use crate::AppState;

/// Liveness plus whether the read path currently holds a fresh batch.
#[axum::debug_handler]
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let body = json!({
        "status": "ok",
        "generatedJobsCached": state.generated_jobs.cache().has(GENERATED_JOBS_CACHE_KEY),
    });
    (StatusCode::OK, Json(body))
}
