use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use subtle::ConstantTimeEq;

use crate::AppState;

pub const ADMIN_SECRET_HEADER: &str = "x-admin-secret";

/// Operator endpoints require `x-admin-secret` to match the configured secret.
/// With no secret configured they are closed entirely.
pub async fn require_admin_secret(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let Some(expected) = state.admin_secret.as_deref() else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error":"admin_endpoints_disabled"})),
        )
            .into_response();
    };
    let Some(provided) = req.headers().get(ADMIN_SECRET_HEADER) else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error":"missing_admin_secret"})),
        )
            .into_response();
    };
    let Ok(provided) = provided.to_str() else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error":"invalid_secret_header"})),
        )
            .into_response();
    };

    if ConstantTimeEq::ct_eq(provided.as_bytes(), expected.as_bytes()).into() {
        next.run(req).await
    } else {
        tracing::warn!("Rejected admin request with wrong secret");
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error":"invalid_admin_secret"})),
        )
            .into_response()
    }
}
