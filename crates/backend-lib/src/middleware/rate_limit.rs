// ============================
// crates/backend-lib/src/middleware/rate_limit.rs
// ============================
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::AppError;
use crate::extract::{bearer_token, extract_client_ip};
use crate::quota::{QuotaDecision, RatePolicy};
use crate::AppState;

fn header_value(value: impl std::fmt::Display) -> HeaderValue {
    HeaderValue::try_from(value.to_string()).unwrap_or_else(|_| HeaderValue::from_static("0"))
}

fn insert_headers(headers: &mut HeaderMap, decision: QuotaDecision, policy: &RatePolicy) {
    match decision {
        QuotaDecision::Allowed { limit, remaining } => {
            headers.insert("X-RateLimit-Limit", header_value(limit));
            headers.insert("X-RateLimit-Remaining", header_value(remaining));
        },
        QuotaDecision::Denied { limit } => {
            headers.insert(header::RETRY_AFTER, header_value(policy.window.as_secs()));
            headers.insert("X-RateLimit-Limit", header_value(limit));
            headers.insert("X-RateLimit-Remaining", HeaderValue::from_static("0"));
        },
        QuotaDecision::Indeterminate => {},
    }
}

async fn gate(
    state: &AppState,
    policy: &RatePolicy,
    key: &str,
    denied: AppError,
    req: Request,
    next: Next,
) -> Response {
    let decision = state.quota.check(policy, key).await;
    let mut response = if decision.permits() {
        next.run(req).await
    } else {
        denied.into_response()
    };
    insert_headers(response.headers_mut(), decision, policy);
    response
}

/// Per-access-token quota for the protected API. Requests without a bearer
/// token pass through untouched and are rejected by authentication instead.
pub async fn identity_rate_limit(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let Some(token) = bearer_token(req.headers()).map(str::to_owned) else {
        return next.run(req).await;
    };
    let policy = state.identity_policy;
    gate(&state, &policy, &token, AppError::RateLimitedByIdentity, req, next).await
}

/// Per-client-IP quota for sign-up, sign-in and refresh
pub async fn ip_rate_limit(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let ip = extract_client_ip(&req, state.settings.server.trust_forwarded_headers)
        .unwrap_or_else(|| "unknown".to_string());
    let policy = state.ip_policy;
    gate(&state, &policy, &ip, AppError::RateLimitedByIp, req, next).await
}
