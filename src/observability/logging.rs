//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber
//! - Log one access line per request, plus an error line for failures
//! - Record per-request metrics alongside the access line
//!
//! # Design Decisions
//! - `RUST_LOG` overrides the configured level
//! - JSON format for production, pretty format for development
//! - Request ID comes from the request-id layer; a fresh one is made if absent

use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, Request},
    middleware::Next,
    response::Response,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::http::request::request_id;
use crate::observability::metrics::GatewayMetrics;
use crate::security::headers::client_ip;

/// Install the global subscriber. `format` is "json" or "pretty".
pub fn init(level: &str, format: &str) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},tower_http=info", level)));
    let registry = tracing_subscriber::registry().with(filter);

    if format.eq_ignore_ascii_case("json") {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(false))
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    }
}

/// Access log and request metrics middleware.
pub async fn access_log(
    State(metrics): State<GatewayMetrics>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let start = Instant::now();
    let _in_flight = metrics.in_flight();

    let request_id = request_id(request.headers())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client_ip = client_ip(request.headers(), peer);
    let user_agent = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %path,
        client_ip = %client_ip,
        "Incoming request"
    );

    let response = next.run(request).await;

    let status = response.status();
    let duration = start.elapsed();
    metrics.record_request(method.as_str(), &path, status.as_u16(), start);

    tracing::info!(
        request_id = %request_id,
        method = %method,
        path = %path,
        status = status.as_u16(),
        duration_ms = duration.as_secs_f64() * 1000.0,
        client_ip = %client_ip,
        user_agent = %user_agent,
        "HTTP request"
    );

    if status.as_u16() >= 400 {
        tracing::error!(
            request_id = %request_id,
            status = status.as_u16(),
            path = %path,
            duration_ms = duration.as_secs_f64() * 1000.0,
            client_ip = %client_ip,
            "Request failed"
        );
    }

    response
}
