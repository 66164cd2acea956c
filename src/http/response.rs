//! Gateway error responses.
//!
//! # Responsibilities
//! - Define the terminal failures of the dispatch pipeline
//! - Map each failure to one status code and a short plain-text body
//!
//! # Design Decisions
//! - Upstream responses are never rewritten; only gateway failures pass here
//! - Upstream connect failures and timeouts are both 502
//! - Authentication errors echo their message to the caller

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::security::headers::X_RATELIMIT_LIMIT;
use crate::security::AuthError;

/// A request the gateway answers itself.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("no route for path")]
    RouteNotFound,

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("method not allowed")]
    MethodNotAllowed,

    #[error("rate limit exceeded")]
    RateLimitDenied,

    #[error("upstream request failed: {0}")]
    UpstreamUnreachable(String),

    #[error("upstream timed out")]
    UpstreamTimeout,

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::RouteNotFound => StatusCode::NOT_FOUND,
            GatewayError::Auth(_) => StatusCode::UNAUTHORIZED,
            GatewayError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            GatewayError::RateLimitDenied => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::UpstreamUnreachable(_) | GatewayError::UpstreamTimeout => {
                StatusCode::BAD_GATEWAY
            }
            GatewayError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Label used for the `reason` dimension of failure metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            GatewayError::RouteNotFound => "route_not_found",
            GatewayError::Auth(_) => "unauthorized",
            GatewayError::MethodNotAllowed => "method_not_allowed",
            GatewayError::RateLimitDenied => "rate_limited",
            GatewayError::UpstreamUnreachable(_) => "upstream_unreachable",
            GatewayError::UpstreamTimeout => "upstream_timeout",
            GatewayError::Configuration(_) => "configuration",
        }
    }

    fn body(&self) -> String {
        match self {
            GatewayError::RouteNotFound => "404 page not found".to_string(),
            GatewayError::Auth(e) => e.to_string(),
            GatewayError::MethodNotAllowed => "Method not allowed".to_string(),
            GatewayError::RateLimitDenied => "Rate limit exceeded".to_string(),
            GatewayError::UpstreamUnreachable(e) => format!("Error forwarding request: {}", e),
            GatewayError::UpstreamTimeout => "Error forwarding request: timed out".to_string(),
            GatewayError::Configuration(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let mut response = (self.status(), self.body()).into_response();

        if matches!(self, GatewayError::RateLimitDenied) {
            let headers = response.headers_mut();
            headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from_static("Exceeded"));
            headers.insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
        }
        response
    }
}
