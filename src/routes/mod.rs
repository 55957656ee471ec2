pub mod docs;
pub mod health;
pub mod jobs;

use axum::{
    middleware::from_fn_with_state,
    routing::{delete, get, post},
    Router,
};

use crate::middleware::{auth::require_admin_secret, rate_limit};
use crate::AppState;

/// Public read path behind the rate limiter, operator endpoints behind the
/// admin secret.
pub fn build_router(state: AppState, public_rps: u32) -> Router {
    let base_routes = Router::new()
        .route("/health", get(health::health))
        .route("/api-docs/openapi.json", get(docs::openapi_json));

    let public_api = Router::new()
        .route("/api/v1/gemini-jobs", get(jobs::list_generated_jobs))
        .layer(from_fn_with_state(
            rate_limit::RateLimiter::per_second(public_rps),
            rate_limit::rps_middleware,
        ));

    let admin_api = Router::new()
        .route("/api/v1/gemini-jobs/ingest", post(jobs::trigger_ingest))
        .route("/api/v1/gemini-jobs/expire", post(jobs::trigger_expire))
        .route("/api/v1/gemini-jobs/cache", delete(jobs::clear_cache))
        .layer(from_fn_with_state(state.clone(), require_admin_secret));

    base_routes
        .merge(public_api)
        .merge(admin_api)
        .with_state(state)
}
