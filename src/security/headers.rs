//! Header names and client identity.
//!
//! # Responsibilities
//! - Name the identity headers injected from verified claims
//! - Remove caller-supplied copies of those headers
//! - Derive the client identity used for admission control
//!
//! # Design Decisions
//! - First `X-Forwarded-For` hop wins, then `X-Real-IP`, then the socket peer
//! - Forwarding headers are always gateway-owned, even on unauthenticated routes

use std::net::SocketAddr;

use axum::http::{HeaderMap, HeaderName};

pub const X_USER_ID: HeaderName = HeaderName::from_static("x-user-id");
pub const X_IS_ADMIN: HeaderName = HeaderName::from_static("x-is-admin");
pub const X_ISSUED_AT: HeaderName = HeaderName::from_static("x-issued-at");
pub const X_SESSION_ID: HeaderName = HeaderName::from_static("x-session-id");
pub const X_CUSTOM_CLAIMS: HeaderName = HeaderName::from_static("x-custom-claims");
pub const X_EXP: HeaderName = HeaderName::from_static("x-exp");

pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
pub const X_REAL_IP: HeaderName = HeaderName::from_static("x-real-ip");
pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");

/// Every header the gateway derives from token claims.
pub const FORWARDING_HEADERS: [HeaderName; 6] = [
    X_USER_ID,
    X_IS_ADMIN,
    X_ISSUED_AT,
    X_SESSION_ID,
    X_CUSTOM_CLAIMS,
    X_EXP,
];

/// Drop inbound copies of the claim headers. Returns how many names were present.
pub fn strip_forwarding_headers(headers: &mut HeaderMap) -> usize {
    FORWARDING_HEADERS
        .iter()
        .filter(|name| headers.remove(*name).is_some())
        .count()
}

/// Client identity for admission keys.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    if let Some(first) = headers
        .get(&X_FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return first.to_string();
    }

    if let Some(real_ip) = headers
        .get(&X_REAL_IP)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return real_ip.to_string();
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
