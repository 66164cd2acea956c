//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router: health check plus the catch-all gateway handler
//! - Wire up middleware (request ID, access log, CORS)
//! - Bind server to listener and drain on shutdown

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, Request, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{any, get},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
};

use crate::http::dispatch::Dispatcher;
use crate::observability::logging::access_log;
use crate::observability::metrics::GatewayMetrics;

const HEALTH_BODY: &str = r#"{"status":"healthy","service":"api-gateway"}"#;

/// The gateway's HTTP front end.
pub struct GatewayServer {
    app: Router,
    dispatcher: Arc<Dispatcher>,
}

impl GatewayServer {
    pub fn new(dispatcher: Dispatcher, metrics: GatewayMetrics, cors_enabled: bool) -> Self {
        let dispatcher = Arc::new(dispatcher);
        let app = Self::build_router(dispatcher.clone(), metrics, cors_enabled);
        Self { app, dispatcher }
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// `/health` sits outside the gateway middleware so probes are neither
    /// rate limited nor access logged.
    fn build_router(dispatcher: Arc<Dispatcher>, metrics: GatewayMetrics, cors_enabled: bool) -> Router {
        let mut gateway = Router::new()
            .route("/{*path}", any(gateway_handler))
            .route("/", any(gateway_handler))
            .with_state(dispatcher);

        if cors_enabled {
            gateway = gateway.layer(CorsLayer::permissive());
        }

        let gateway = gateway
            .layer(middleware::from_fn_with_state(metrics, access_log))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid));

        Router::new().route("/health", get(health)).merge(gateway)
    }

    /// Run the server, accepting connections on the given listener until a
    /// shutdown signal arrives. In-flight requests are drained.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            routes = self.dispatcher.router().len(),
            rate_limiter = self.dispatcher.admission().strategy(),
            "Gateway listening"
        );

        let app = self.app.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Gateway draining connections");
            })
            .await?;

        tracing::info!("Gateway stopped");
        Ok(())
    }
}

/// Catch-all handler feeding the dispatch pipeline.
async fn gateway_handler(State(dispatcher): State<Arc<Dispatcher>>, request: Request<Body>) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    dispatcher.dispatch(request, peer).await
}

async fn health() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        HEALTH_BODY,
    )
}
