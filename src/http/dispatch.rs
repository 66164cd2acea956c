//! Request dispatch pipeline.
//!
//! # Data Flow
//! ```text
//! Received
//!     → AdmissionChecked (client_ip:path; store errors fail open)
//!     → RouteResolved    (most specific service, else 404)
//!     → Authenticated    (bearer token unless skip_auth, else 401)
//!     → MethodValidated  (allow-list, else 405)
//!     → Forwarded        (rewrite URI, copy headers + claims, bounded wait)
//!     → Completed        (status, headers and body streamed back verbatim)
//! ```
//!
//! # Design Decisions
//! - Each stage failure is terminal; nothing is retried
//! - Bodies are streamed both ways, never buffered
//! - Dropping the handler future (client disconnect) drops the upstream call

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    http::Request,
    response::{IntoResponse, Response},
};
use http_body_util::BodyExt;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::http::request::{forwarded_headers, request_id, upstream_uri};
use crate::http::response::GatewayError;
use crate::observability::metrics::GatewayMetrics;
use crate::routing::{Router, ServiceRoute};
use crate::security::headers::client_ip;
use crate::security::rate_limit::{admission_key, AdmissionController};
use crate::security::Authenticator;

/// Pipeline position of a request, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    AdmissionChecked,
    RouteResolved,
    Authenticated,
    MethodValidated,
    Forwarded,
    Completed,
}

/// Runs the admission, routing, auth and forwarding pipeline.
pub struct Dispatcher {
    router: Arc<Router>,
    admission: AdmissionController,
    authenticator: Authenticator,
    client: Client<HttpConnector, Body>,
    upstream_timeout: Duration,
    metrics: GatewayMetrics,
}

impl Dispatcher {
    pub fn new(
        router: Arc<Router>,
        admission: AdmissionController,
        authenticator: Authenticator,
        upstream_timeout: Duration,
        metrics: GatewayMetrics,
    ) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        Self {
            router,
            admission,
            authenticator,
            client,
            upstream_timeout,
            metrics,
        }
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn admission(&self) -> &AdmissionController {
        &self.admission
    }

    /// Handle one request. Always produces a response.
    pub async fn dispatch(&self, request: Request<Body>, peer: Option<SocketAddr>) -> Response {
        let request_id = request_id(request.headers())
            .unwrap_or("unknown")
            .to_string();
        let method = request.method().clone();
        let path = request.uri().path().to_string();

        let mut stage = Stage::Received;
        match self.run(request, peer, &request_id, &mut stage).await {
            Ok(response) => response,
            Err(err) => {
                match &err {
                    GatewayError::UpstreamUnreachable(_)
                    | GatewayError::UpstreamTimeout
                    | GatewayError::Configuration(_) => tracing::error!(
                        request_id = %request_id,
                        method = %method,
                        path = %path,
                        stage = ?stage,
                        error = %err,
                        "Request failed"
                    ),
                    _ => tracing::warn!(
                        request_id = %request_id,
                        method = %method,
                        path = %path,
                        stage = ?stage,
                        reason = err.reason(),
                        error = %err,
                        "Request rejected"
                    ),
                }
                err.into_response()
            }
        }
    }

    async fn run(
        &self,
        request: Request<Body>,
        peer: Option<SocketAddr>,
        request_id: &str,
        stage: &mut Stage,
    ) -> Result<Response, GatewayError> {
        let path = request.uri().path().to_string();

        // 1. Admission
        let client = client_ip(request.headers(), peer);
        match self.admission.allow(&admission_key(&client, &path)).await {
            Ok(true) => {}
            Ok(false) => {
                self.metrics.record_rate_limit_hit(&path);
                return Err(GatewayError::RateLimitDenied);
            }
            Err(e) => {
                self.metrics.record_rate_limiter_error(self.admission.strategy());
                tracing::error!(
                    request_id = %request_id,
                    client_ip = %client,
                    strategy = self.admission.strategy(),
                    error = %e,
                    "Rate limiter error, admitting request"
                );
            }
        }
        *stage = Stage::AdmissionChecked;

        // 2. Route
        let route = self.router.resolve(&path).ok_or(GatewayError::RouteNotFound)?;
        *stage = Stage::RouteResolved;

        // 3. Authentication
        let claims = self
            .authenticator
            .authenticate(request.headers(), route)
            .inspect_err(|e| self.metrics.record_auth_failure(e.reason()))?;
        *stage = Stage::Authenticated;

        // 4. Method
        if !route.allows_method(request.method()) {
            return Err(GatewayError::MethodNotAllowed);
        }
        *stage = Stage::MethodValidated;

        tracing::debug!(
            request_id = %request_id,
            service = %route.name,
            priority = route.priority,
            target = %route.target,
            "Routing request"
        );

        // 5. Forward
        let (parts, body) = request.into_parts();
        let mut upstream = Request::new(body);
        *upstream.method_mut() = parts.method;
        *upstream.uri_mut() = upstream_uri(&route.target, &parts.uri)?;
        *upstream.headers_mut() = forwarded_headers(&parts.headers);
        claims.apply(upstream.headers_mut());

        let started = Instant::now();
        let response = tokio::time::timeout(self.upstream_timeout, self.client.request(upstream))
            .await
            .map_err(|_| GatewayError::UpstreamTimeout)?
            .map_err(|e| GatewayError::UpstreamUnreachable(e.to_string()))?;
        *stage = Stage::Forwarded;

        // 6. Stream back
        let status = response.status();
        self.metrics
            .record_backend_request(&route.name, status.as_u16(), started.elapsed());
        *stage = Stage::Completed;

        Ok(stream_back(response, route, request_id))
    }
}

/// Pass the upstream response through, logging body errors after headers are sent.
fn stream_back(
    response: Response<hyper::body::Incoming>,
    route: &ServiceRoute,
    request_id: &str,
) -> Response {
    let service = route.name.clone();
    let request_id = request_id.to_string();

    response.map(|body| {
        Body::new(body.map_err(move |e| {
            tracing::error!(
                request_id = %request_id,
                service = %service,
                error = %e,
                "Error copying response body"
            );
            e
        }))
    })
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("routes", &self.router.len())
            .field("admission", &self.admission.strategy())
            .field("upstream_timeout", &self.upstream_timeout)
            .finish()
    }
}
