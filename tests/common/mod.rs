//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{HeaderMap, Method, Request, StatusCode},
    response::IntoResponse,
    Router,
};
use serde_json::Value;
use tokio::net::TcpListener;

use edge_gateway::config::{GatewayConfig, ServiceConfig};
use edge_gateway::http::{Dispatcher, GatewayServer};
use edge_gateway::lifecycle::startup::build_gateway;
use edge_gateway::observability::GatewayMetrics;
use edge_gateway::security::SecretKey;
use edge_gateway::Shutdown;

/// RFC 8032 test vector 1.
pub const SECRET_KEY: &str = "9d61b19deffd5a60ba844af492ec2cc44449c5697b326919703bac031cae7f60";
pub const PUBLIC_KEY: &str = "d75a980182b10ab7d54bfed3c964073a0ee172f3daa62325af021a68f707511a";

/// A request as seen by a mock backend.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub uri: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Backend answering every request with 201, `X-Custom: v` and `{"ok":true}`.
pub struct MockBackend {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl MockBackend {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last(&self) -> Recorded {
        self.requests().pop().expect("backend saw no request")
    }
}

/// Start a recording mock backend on an ephemeral port.
pub async fn start_mock_backend() -> MockBackend {
    start_backend_with_delay(Duration::ZERO).await
}

/// Like [`start_mock_backend`], but waits `delay` before answering.
pub async fn start_backend_with_delay(delay: Duration) -> MockBackend {
    let requests = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new()
        .fallback(record)
        .with_state((requests.clone(), delay));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    MockBackend { addr, requests }
}

async fn record(
    State((requests, delay)): State<(Arc<Mutex<Vec<Recorded>>>, Duration)>,
    request: Request<Body>,
) -> impl IntoResponse {
    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, usize::MAX).await.unwrap_or_default();

    requests.lock().unwrap().push(Recorded {
        method: parts.method,
        uri: parts.uri.to_string(),
        headers: parts.headers,
        body,
    });

    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    (
        StatusCode::CREATED,
        [("x-custom", "v"), ("content-type", "application/json")],
        r#"{"ok":true}"#,
    )
}

/// An address nothing listens on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

pub fn service(name: &str, base_path: &str, target: &str) -> ServiceConfig {
    ServiceConfig {
        name: name.into(),
        base_path: base_path.into(),
        target: target.into(),
        methods: Vec::new(),
        skip_auth: false,
    }
}

/// Config with the test public key and the given services.
pub fn config(services: Vec<ServiceConfig>) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.auth.public_key_hex = PUBLIC_KEY.into();
    config.server.timeout_secs = 2;
    config.services = services;
    config
}

/// A running gateway.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Build a gateway from `config` and serve it on an ephemeral port.
pub async fn spawn_gateway(config: GatewayConfig) -> TestGateway {
    let shutdown = Shutdown::new();
    let server = build_gateway(&config, &shutdown, GatewayMetrics::disabled())
        .await
        .expect("gateway should build");
    serve(server, shutdown).await
}

/// Serve a hand-assembled dispatcher.
pub async fn spawn_dispatcher(dispatcher: Dispatcher) -> TestGateway {
    let server = GatewayServer::new(dispatcher, GatewayMetrics::disabled(), false);
    serve(server, Shutdown::new()).await
}

async fn serve(server: GatewayServer, shutdown: Shutdown) -> TestGateway {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });
    TestGateway { addr, shutdown }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// Sign `claims` with the test key.
pub fn mint(claims: Value) -> String {
    SecretKey::from_hex(SECRET_KEY)
        .unwrap()
        .sign(claims.to_string().as_bytes(), b"")
}

/// An RFC 3339 time `secs` from now.
pub fn expires_in(secs: i64) -> String {
    (chrono::Utc::now() + chrono::Duration::seconds(secs)).to_rfc3339()
}
