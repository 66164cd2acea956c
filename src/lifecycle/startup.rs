//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize subsystems in dependency order from a validated config
//! - Select the admission strategy (shared store, falling back to local)
//! - Start background tasks (signals, metrics endpoint)
//! - Bind the listener and serve until shutdown
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal, except an unreachable store
//! - Listeners start last (traffic only when ready)
//! - After the server drains, shutdown is triggered for every other task

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::GatewayConfig;
use crate::http::{Dispatcher, GatewayServer};
use crate::lifecycle::{signals, Shutdown};
use crate::observability::metrics::{serve_metrics, GatewayMetrics};
use crate::routing::{RegistrationError, Router};
use crate::security::rate_limit::{AdmissionController, SlidingWindowLimiter, TokenBucketLimiter};
use crate::security::{Authenticator, TokenError};

/// Fatal startup failure.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("route registration failed: {0}")]
    Registration(#[from] RegistrationError),

    #[error("invalid auth public key: {0}")]
    AuthKey(#[from] TokenError),

    #[error("metrics recorder: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("invalid metrics address '{0}'")]
    MetricsAddress(String),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Pick the admission strategy for this process.
///
/// A configured store that cannot be reached is logged and replaced by the
/// local token bucket.
pub async fn build_admission_controller(
    config: &GatewayConfig,
    shutdown: &Shutdown,
) -> AdmissionController {
    if config.redis.is_configured() {
        match SlidingWindowLimiter::connect(&config.redis, &config.rate_limit).await {
            Ok(limiter) => return AdmissionController::Distributed(limiter),
            Err(e) => {
                tracing::error!(
                    host = %config.redis.host,
                    port = config.redis.port,
                    error = %e,
                    "Failed to connect to rate limit store, using local limiter"
                );
            }
        }
    }

    AdmissionController::Local(TokenBucketLimiter::start(&config.rate_limit, shutdown))
}

/// Build the router, limiter and authenticator, and wrap them in a server.
pub async fn build_gateway(
    config: &GatewayConfig,
    shutdown: &Shutdown,
    metrics: GatewayMetrics,
) -> Result<GatewayServer, StartupError> {
    let router = Router::from_services(&config.services)?;
    for service in &config.services {
        tracing::info!(
            name = %service.name,
            base_path = %service.base_path,
            target = %service.target,
            skip_auth = service.skip_auth,
            "Registered service"
        );
    }

    let authenticator = Authenticator::from_config(&config.auth)?;
    let admission = build_admission_controller(config, shutdown).await;
    tracing::info!(rate_limiter = admission.strategy(), "Gateway initialized");

    let dispatcher = Dispatcher::new(
        Arc::new(router),
        admission,
        authenticator,
        config.server.upstream_timeout(),
        metrics.clone(),
    );
    Ok(GatewayServer::new(dispatcher, metrics, config.server.cors_enabled))
}

/// Run the gateway until SIGINT/SIGTERM.
pub async fn run(config: GatewayConfig) -> Result<(), StartupError> {
    let shutdown = Shutdown::new();
    signals::spawn_signal_listener(shutdown.clone());

    let metrics = if config.observability.metrics_enabled {
        let addr: SocketAddr = config
            .observability
            .metrics_address
            .parse()
            .map_err(|_| StartupError::MetricsAddress(config.observability.metrics_address.clone()))?;
        let metrics = GatewayMetrics::prometheus()?;

        let exporter = metrics.clone();
        let exporter_shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = serve_metrics(exporter, addr, exporter_shutdown).await {
                tracing::error!(address = %addr, error = %e, "Metrics endpoint failed");
            }
        });
        metrics
    } else {
        GatewayMetrics::disabled()
    };

    let server = build_gateway(&config, &shutdown, metrics).await?;

    let address = config.server.listen_address();
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| StartupError::Bind {
            address: address.clone(),
            source,
        })?;
    tracing::info!(
        address = %address,
        services = config.services.len(),
        timeout_secs = config.server.upstream_timeout().as_secs(),
        "Gateway starting"
    );

    let result = server.run(listener, shutdown.subscribe()).await;
    shutdown.trigger();
    result.map_err(StartupError::Serve)
}
