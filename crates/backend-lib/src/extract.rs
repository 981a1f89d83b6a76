// ============================
// crates/backend-lib/src/extract.rs
// ============================
//! Request extractors and header helpers.

use std::net::SocketAddr;

use account_common::IdentityId;
use axum::extract::rejection::JsonRejection;
use axum::extract::{ConnectInfo, FromRequest, FromRequestParts, Request};
use axum::http::request::Parts;
use axum::http::{header, HeaderMap};

use crate::auth::DeviceInfo;
use crate::error::AppError;

/// Optional header naming the caller's device
pub const DEVICE_NAME_HEADER: &str = "x-device-name";

const MAX_DEVICE_FIELD_LEN: usize = 256;

/// JSON body whose rejection is a `ValidationFailed` error
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct JsonBody<T>(pub T);

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::ValidationFailed(rejection.body_text())
    }
}

/// Identity resolved from the access token by `require_identity`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentIdentity(pub IdentityId);

impl<S: Send + Sync> FromRequestParts<S> for CurrentIdentity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentIdentity>()
            .copied()
            .ok_or(AppError::InvalidToken)
    }
}

/// Token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Client IP. With `trust_forwarded` set: first `X-Forwarded-For` entry,
/// then `X-Real-IP`, then the TCP peer. Without it only the TCP peer counts,
/// since any client can put whatever it likes in those headers.
pub fn extract_client_ip(req: &Request, trust_forwarded: bool) -> Option<String> {
    let peer = || {
        req.extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
    };
    if !trust_forwarded {
        return peer();
    }

    let headers = req.headers();
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
        .or_else(peer)
}

fn header_text(headers: &HeaderMap, name: impl header::AsHeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| v.chars().take(MAX_DEVICE_FIELD_LEN).collect())
}

/// Device name from `X-Device-Name`, device info from `User-Agent`
pub fn device_info(headers: &HeaderMap) -> DeviceInfo {
    DeviceInfo {
        name: header_text(headers, DEVICE_NAME_HEADER),
        info: header_text(headers, header::USER_AGENT),
    }
}
