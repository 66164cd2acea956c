//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define gateway metrics (requests, latency, admission, auth, backends)
//! - Own the Prometheus recorder and serve its text rendering
//!
//! # Metrics
//! - `http_requests_total` (counter): requests by method, path, status
//! - `http_request_duration_seconds` (histogram): end-to-end latency
//! - `http_requests_in_flight` (gauge): requests currently being served
//! - `rate_limit_hits_total` (counter): denials by path
//! - `rate_limiter_errors_total` (counter): store failures by strategy
//! - `authentication_failures_total` (counter): failures by reason
//! - `backend_requests_total` (counter): forwarded requests by backend, status
//! - `backend_request_duration_seconds` (histogram): upstream latency
//!
//! # Design Decisions
//! - Each `GatewayMetrics` owns its recorder; updates are routed to it with
//!   a local recorder scope, never through the process-global one
//! - A disabled instance owns nothing and records nothing
//! - Path labels are truncated to bound cardinality

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{extract::State, routing::get, Router};
use metrics_exporter_prometheus::{
    BuildError, Matcher, PrometheusBuilder, PrometheusHandle, PrometheusRecorder,
};
use tokio::net::TcpListener;

use crate::lifecycle::Shutdown;

const LATENCY_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];
const MAX_PATH_LABEL: usize = 50;
const UPKEEP_INTERVAL: Duration = Duration::from_secs(5);

/// The gateway's metrics registry.
///
/// Clones share one registry.
#[derive(Clone, Default)]
pub struct GatewayMetrics {
    recorder: Option<Arc<PrometheusRecorder>>,
}

impl GatewayMetrics {
    /// Metrics that record nothing.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// A fresh Prometheus registry owned by this handle.
    pub fn prometheus() -> Result<Self, BuildError> {
        let recorder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                LATENCY_BUCKETS,
            )?
            .build_recorder();
        Ok(Self {
            recorder: Some(Arc::new(recorder)),
        })
    }

    /// Prometheus text exposition, if enabled.
    pub fn render(&self) -> Option<String> {
        self.handle().map(|handle| handle.render())
    }

    fn handle(&self) -> Option<PrometheusHandle> {
        self.recorder.as_ref().map(|recorder| recorder.handle())
    }

    fn record(&self, update: impl FnOnce()) {
        if let Some(recorder) = &self.recorder {
            metrics::with_local_recorder(&**recorder, update);
        }
    }

    pub fn record_request(&self, method: &str, path: &str, status: u16, start: Instant) {
        let labels = [
            ("method", method.to_string()),
            ("path", path_label(path)),
            ("status", status.to_string()),
        ];
        self.record(|| {
            metrics::counter!("http_requests_total", &labels).increment(1);
            metrics::histogram!("http_request_duration_seconds", &labels)
                .record(start.elapsed().as_secs_f64());
        });
    }

    /// Count a request as in flight until the guard is dropped.
    pub fn in_flight(&self) -> InFlightGuard {
        self.record(|| metrics::gauge!("http_requests_in_flight").increment(1.0));
        InFlightGuard {
            metrics: self.clone(),
        }
    }

    pub fn record_rate_limit_hit(&self, path: &str) {
        let path = path_label(path);
        self.record(|| metrics::counter!("rate_limit_hits_total", "path" => path).increment(1));
    }

    pub fn record_rate_limiter_error(&self, strategy: &'static str) {
        self.record(|| {
            metrics::counter!("rate_limiter_errors_total", "strategy" => strategy).increment(1)
        });
    }

    pub fn record_auth_failure(&self, reason: &'static str) {
        self.record(|| {
            metrics::counter!("authentication_failures_total", "reason" => reason).increment(1)
        });
    }

    pub fn record_backend_request(&self, backend: &str, status: u16, duration: Duration) {
        let labels = [
            ("backend", backend.to_string()),
            ("status", status.to_string()),
        ];
        self.record(|| {
            metrics::counter!("backend_requests_total", &labels).increment(1);
            metrics::histogram!("backend_request_duration_seconds", &labels)
                .record(duration.as_secs_f64());
        });
    }
}

impl std::fmt::Debug for GatewayMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayMetrics")
            .field("enabled", &self.recorder.is_some())
            .finish()
    }
}

/// Decrements `http_requests_in_flight` on drop.
pub struct InFlightGuard {
    metrics: GatewayMetrics,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.metrics
            .record(|| metrics::gauge!("http_requests_in_flight").decrement(1.0));
    }
}

fn path_label(path: &str) -> String {
    match path.char_indices().nth(MAX_PATH_LABEL) {
        Some((cut, _)) => format!("{}...", &path[..cut]),
        None => path.to_string(),
    }
}

/// Serve `/metrics` on `addr` until shutdown.
///
/// Also runs recorder upkeep so histograms do not grow without bound.
pub async fn serve_metrics(
    metrics: GatewayMetrics,
    addr: SocketAddr,
    shutdown: Shutdown,
) -> std::io::Result<()> {
    let Some(handle) = metrics.handle() else {
        return Ok(());
    };

    let listener = TcpListener::bind(addr).await?;
    tracing::info!(address = %listener.local_addr()?, "Metrics endpoint listening");

    let upkeep_handle = handle.clone();
    let upkeep_shutdown = shutdown.signalled();
    tokio::spawn(async move {
        tokio::pin!(upkeep_shutdown);
        let mut ticker = tokio::time::interval(UPKEEP_INTERVAL);
        loop {
            tokio::select! {
                _ = ticker.tick() => upkeep_handle.run_upkeep(),
                _ = &mut upkeep_shutdown => break,
            }
        }
    });

    let app = Router::new()
        .route("/metrics", get(render_metrics))
        .with_state(handle);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.signalled())
        .await?;

    tracing::info!("Metrics endpoint stopped");
    Ok(())
}

async fn render_metrics(State(handle): State<PrometheusHandle>) -> String {
    handle.render()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_label_truncates_long_paths() {
        assert_eq!(path_label("/api/users"), "/api/users");

        let long = format!("/{}", "a".repeat(80));
        let label = path_label(&long);
        assert_eq!(label.len(), MAX_PATH_LABEL + 3);
        assert!(label.ends_with("..."));
    }

    #[test]
    fn test_disabled_metrics_record_nothing() {
        let enabled = GatewayMetrics::prometheus().unwrap();
        let disabled = GatewayMetrics::disabled();

        let _guard = disabled.in_flight();
        disabled.record_request("GET", "/api", 200, Instant::now());
        disabled.record_rate_limit_hit("/api");
        disabled.record_auth_failure("missing_credential");
        disabled.record_backend_request("users", 201, Duration::from_millis(3));

        assert!(disabled.render().is_none());
        assert!(!enabled.render().unwrap().contains("rate_limit_hits_total"));
    }

    #[test]
    fn test_registries_are_independent() {
        let first = GatewayMetrics::prometheus().unwrap();
        let second = GatewayMetrics::prometheus().unwrap();

        first.record_rate_limit_hit("/api/users");
        first.record_rate_limit_hit("/api/users");
        second.record_rate_limit_hit("/api/users");
        second.record_auth_failure("expired");

        let first = first.render().unwrap();
        let second = second.render().unwrap();
        assert!(first.contains(r#"rate_limit_hits_total{path="/api/users"} 2"#));
        assert!(second.contains(r#"rate_limit_hits_total{path="/api/users"} 1"#));
        assert!(!first.contains("authentication_failures_total"));
        assert!(second.contains(r#"authentication_failures_total{reason="expired"} 1"#));
    }

    #[test]
    fn test_clones_share_a_registry() {
        let metrics = GatewayMetrics::prometheus().unwrap();
        let clone = metrics.clone();

        {
            let _guard = clone.in_flight();
            assert!(metrics.render().unwrap().contains("http_requests_in_flight 1"));
        }
        metrics.record_backend_request("users", 201, Duration::from_millis(3));

        let text = metrics.render().unwrap();
        assert!(text.contains("http_requests_in_flight 0"));
        assert!(text.contains(r#"backend_requests_total{backend="users",status="201"} 1"#));
    }
}
