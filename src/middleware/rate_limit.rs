use std::num::NonZeroU32;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Json, Response};
use governor::clock::{Clock as _, DefaultClock};
use governor::{Quota, RateLimiter as GovernorLimiter};
use serde_json::json;

type DirectLimiter = GovernorLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    DefaultClock,
>;

/// Shared quota for every request on the router it guards. A cache miss on
/// the read path costs one large generator call, so the public router sits
/// behind this.
#[derive(Clone)]
pub struct RateLimiter {
    limiter: Arc<DirectLimiter>,
    clock: DefaultClock,
}

impl RateLimiter {
    /// `rps` requests per second with a burst of the same size. Zero is
    /// raised to one.
    pub fn per_second(rps: u32) -> Self {
        let rps = NonZeroU32::new(rps.max(1)).unwrap_or(NonZeroU32::MIN);
        Self {
            limiter: Arc::new(GovernorLimiter::direct(Quota::per_second(rps))),
            clock: DefaultClock::default(),
        }
    }

    /// `Ok` when the request may proceed, otherwise how many whole seconds
    /// to wait before retrying.
    fn check(&self) -> Result<(), u64> {
        self.limiter.check().map_err(|not_until| {
            let wait = not_until.wait_time_from(self.clock.now());
            wait.as_secs() + u64::from(wait.subsec_nanos() > 0)
        })
    }
}

pub async fn rps_middleware(
    State(limiter): State<RateLimiter>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if let Err(retry_after) = limiter.check() {
        tracing::debug!(path = %req.uri().path(), retry_after, "Rate limit exceeded");
        return (
            StatusCode::TOO_MANY_REQUESTS,
            [(header::RETRY_AFTER, retry_after.max(1).to_string())],
            Json(json!({"error":"rate_limit_exceeded"})),
        )
            .into_response();
    }
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_caps_a_burst() {
        let limiter = RateLimiter::per_second(2);
        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_ok());
        let retry_after = limiter.check().unwrap_err();
        assert!(retry_after <= 1);
    }

    #[test]
    fn zero_rps_still_admits_one() {
        let limiter = RateLimiter::per_second(0);
        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_err());
    }

    #[tokio::test]
    async fn rejected_request_gets_429_with_retry_after() {
        use axum::{middleware::from_fn_with_state, routing::get, Router};
        use tower::ServiceExt;

        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(from_fn_with_state(RateLimiter::per_second(1), rps_middleware));

        let first = app
            .clone()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(second.headers()[header::RETRY_AFTER], "1");
    }
}
