//! End-to-end tests: client → gateway → mock backend.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use edge_gateway::config::RateLimitConfig;
use edge_gateway::http::Dispatcher;
use edge_gateway::observability::GatewayMetrics;
use edge_gateway::routing::{Router, ServiceRoute};
use edge_gateway::security::rate_limit::{AdmissionController, SlidingWindowLimiter};
use edge_gateway::security::{Authenticator, PublicKey};

mod common;
use common::{client, config, expires_in, mint, service};

fn valid_token() -> String {
    mint(json!({ "userId": "u-1", "exp": expires_in(3600) }))
}

#[tokio::test]
async fn test_round_trip_is_transparent() {
    let backend = common::start_mock_backend().await;
    let mut users = service("users", "/api/users", &backend.url());
    users.methods = vec!["GET".into(), "POST".into()];
    let gateway = common::spawn_gateway(config(vec![users])).await;

    let res = client()
        .post(gateway.url("/api/users?page=2&sort=asc"))
        .bearer_auth(valid_token())
        .header("x-trace", "t-1")
        .body("hello")
        .send()
        .await
        .expect("gateway unreachable");

    assert_eq!(res.status(), 201);
    assert_eq!(res.headers()["x-custom"], "v");
    assert!(res.headers().contains_key("x-request-id"));
    assert_eq!(res.text().await.unwrap(), r#"{"ok":true}"#);

    let seen = backend.last();
    assert_eq!(seen.method, "POST");
    assert_eq!(seen.uri, "/api/users?page=2&sort=asc");
    assert_eq!(&seen.body[..], b"hello");
    assert_eq!(seen.headers["x-trace"], "t-1");
    assert_eq!(seen.headers["host"], backend.addr.to_string());
    assert!(seen.headers.contains_key("x-request-id"));
    assert!(seen.headers.contains_key("authorization"));
}

#[tokio::test]
async fn test_claims_become_forwarding_headers() {
    let backend = common::start_mock_backend().await;
    let gateway = common::spawn_gateway(config(vec![service("users", "/api/users", &backend.url())])).await;

    let exp = expires_in(600);
    let token = mint(json!({
        "userId": "u-42",
        "isAdmin": true,
        "iat": "2026-01-01T00:00:00Z",
        "sessionId": "s-9",
        "customClaims": {"tier": "gold"},
        "exp": exp.clone(),
    }));

    let res = client()
        .get(gateway.url("/api/users/42"))
        .bearer_auth(token)
        .header("x-user-id", "spoofed")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 201);

    let headers = backend.last().headers;
    assert_eq!(headers["x-user-id"], "u-42");
    assert_eq!(headers.get_all("x-user-id").iter().count(), 1);
    assert_eq!(headers["x-is-admin"], "true");
    assert_eq!(headers["x-issued-at"], "2026-01-01T00:00:00Z");
    assert_eq!(headers["x-session-id"], "s-9");
    assert_eq!(headers["x-custom-claims"], r#"{"tier":"gold"}"#);
    assert_eq!(headers["x-exp"], exp.as_str());
}

#[tokio::test]
async fn test_unknown_path_is_404() {
    let backend = common::start_mock_backend().await;
    let gateway = common::spawn_gateway(config(vec![service("users", "/api/users", &backend.url())])).await;

    let res = client().get(gateway.url("/unregistered")).send().await.unwrap();

    assert_eq!(res.status(), 404);
    assert!(backend.requests().is_empty());
}

#[tokio::test]
async fn test_most_specific_service_wins() {
    let list = common::start_mock_backend().await;
    let detail = common::start_mock_backend().await;
    let catalog = common::start_mock_backend().await;

    let mut catalog_service = service("catalog", "/api/*", &catalog.url());
    catalog_service.skip_auth = true;
    let gateway = common::spawn_gateway(config(vec![
        service("users", "/api/users", &list.url()),
        service("user-detail", "/api/users/:id", &detail.url()),
        catalog_service,
    ]))
    .await;

    let client = client();
    for path in ["/api/users/7", "/api/users/7/orders"] {
        let res = client
            .get(gateway.url(path))
            .bearer_auth(valid_token())
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 201);
    }
    let res = client
        .get(gateway.url("/api/users"))
        .bearer_auth(valid_token())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 201);
    let res = client.get(gateway.url("/api/products")).send().await.unwrap();
    assert_eq!(res.status(), 201);

    assert_eq!(detail.requests().len(), 2);
    assert_eq!(list.requests().len(), 1);
    assert_eq!(catalog.requests().len(), 1);
}

#[tokio::test]
async fn test_method_not_in_allow_list_is_405() {
    let backend = common::start_mock_backend().await;
    let mut users = service("users", "/api/users", &backend.url());
    users.methods = vec!["get".into()];
    let gateway = common::spawn_gateway(config(vec![users])).await;

    let res = client()
        .delete(gateway.url("/api/users/1"))
        .bearer_auth(valid_token())
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 405);
    assert!(backend.requests().is_empty());
}

#[tokio::test]
async fn test_missing_token_is_401() {
    let backend = common::start_mock_backend().await;
    let gateway = common::spawn_gateway(config(vec![service("users", "/api/users", &backend.url())])).await;

    let res = client().get(gateway.url("/api/users")).send().await.unwrap();

    assert_eq!(res.status(), 401);
    assert_eq!(res.text().await.unwrap(), "authorization header is required");
    assert!(backend.requests().is_empty());
}

#[tokio::test]
async fn test_expired_or_forged_token_is_401() {
    let backend = common::start_mock_backend().await;
    let gateway = common::spawn_gateway(config(vec![service("users", "/api/users", &backend.url())])).await;
    let client = client();

    let expired = mint(json!({ "userId": "u-1", "exp": expires_in(-60) }));
    let res = client
        .get(gateway.url("/api/users"))
        .bearer_auth(expired)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 401);

    let res = client
        .get(gateway.url("/api/users"))
        .bearer_auth("v4.public.AAAA")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 401);
    assert!(backend.requests().is_empty());
}

#[tokio::test]
async fn test_skip_auth_route_forwards_without_identity() {
    let backend = common::start_mock_backend().await;
    let mut public = service("public", "/public", &backend.url());
    public.skip_auth = true;
    let gateway = common::spawn_gateway(config(vec![public])).await;

    let res = client()
        .get(gateway.url("/public/docs"))
        .header("x-user-id", "spoofed")
        .header("x-is-admin", "true")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 201);
    let headers = backend.last().headers;
    assert!(headers.get("x-user-id").is_none());
    assert!(headers.get("x-is-admin").is_none());
}

#[tokio::test]
async fn test_rate_limit_denial_is_429() {
    let backend = common::start_mock_backend().await;
    let mut public = service("public", "/public", &backend.url());
    public.skip_auth = true;
    let mut config = config(vec![public]);
    config.rate_limit = RateLimitConfig {
        requests_per_second: 1,
        burst: 2,
        ..RateLimitConfig::default()
    };
    let gateway = common::spawn_gateway(config).await;
    let client = client();

    for _ in 0..2 {
        let res = client
            .get(gateway.url("/public"))
            .header("x-forwarded-for", "203.0.113.5")
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 201);
    }

    let res = client
        .get(gateway.url("/public"))
        .header("x-forwarded-for", "203.0.113.5")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 429);
    assert_eq!(res.headers()["x-ratelimit-limit"], "Exceeded");
    assert_eq!(res.headers()["retry-after"], "1");
    assert_eq!(res.text().await.unwrap(), "Rate limit exceeded");

    // Another client and another path each have their own budget.
    let res = client
        .get(gateway.url("/public"))
        .header("x-forwarded-for", "203.0.113.6")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 201);
    let res = client
        .get(gateway.url("/public/other"))
        .header("x-forwarded-for", "203.0.113.5")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 201);

    assert_eq!(backend.requests().len(), 4);
}

#[tokio::test]
async fn test_limiter_failure_fails_open() {
    let backend = common::start_mock_backend().await;

    let mut router = Router::new();
    router
        .register("/public", ServiceRoute::new("public", backend.url()).skip_auth(true))
        .unwrap();
    let store = redis::Client::open("redis://127.0.0.1:1").unwrap();
    let admission = AdmissionController::Distributed(SlidingWindowLimiter::new(
        store,
        "rate_limit",
        1,
        Duration::from_secs(1),
        Duration::from_millis(200),
    ));
    let dispatcher = Dispatcher::new(
        Arc::new(router),
        admission,
        Authenticator::new(Some(PublicKey::from_hex(common::PUBLIC_KEY).unwrap()), true),
        Duration::from_secs(2),
        GatewayMetrics::disabled(),
    );
    let gateway = common::spawn_dispatcher(dispatcher).await;
    let client = client();

    for _ in 0..3 {
        let res = client.get(gateway.url("/public")).send().await.unwrap();
        assert_eq!(res.status(), 201);
    }
    assert_eq!(backend.requests().len(), 3);
}

#[tokio::test]
async fn test_unreachable_backend_is_502() {
    let dead = common::closed_port().await;
    let mut down = service("down", "/down", &format!("http://{}", dead));
    down.skip_auth = true;
    let gateway = common::spawn_gateway(config(vec![down])).await;

    let res = client().get(gateway.url("/down")).send().await.unwrap();
    assert_eq!(res.status(), 502);
}

#[tokio::test]
async fn test_slow_backend_times_out_with_502() {
    let slow = common::start_backend_with_delay(Duration::from_secs(5)).await;
    let mut service = service("slow", "/slow", &slow.url());
    service.skip_auth = true;
    let mut config = config(vec![service]);
    config.server.timeout_secs = 1;
    let gateway = common::spawn_gateway(config).await;

    let started = std::time::Instant::now();
    let res = client().get(gateway.url("/slow")).send().await.unwrap();

    assert_eq!(res.status(), 502);
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[tokio::test]
async fn test_malformed_target_is_500() {
    let mut broken = service("broken", "/broken", "/relative/only");
    broken.skip_auth = true;
    let gateway = common::spawn_gateway(config(vec![broken])).await;

    let res = client().get(gateway.url("/broken")).send().await.unwrap();
    assert_eq!(res.status(), 500);
}

#[tokio::test]
async fn test_health_endpoint() {
    let gateway = common::spawn_gateway(config(Vec::new())).await;

    let res = client().get(gateway.url("/health")).send().await.unwrap();

    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["content-type"], "application/json");
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body, json!({"status": "healthy", "service": "api-gateway"}));
}
