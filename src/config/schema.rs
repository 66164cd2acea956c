//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Upstream timeout used when `server.timeout_secs` is left at zero.
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 30;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener and upstream timeout settings.
    pub server: ServerConfig,

    /// Admission control settings shared by both limiter strategies.
    pub rate_limit: RateLimitConfig,

    /// Shared store for the distributed limiter. Empty host = local limiter.
    pub redis: RedisConfig,

    /// Bearer token verification.
    pub auth: AuthConfig,

    /// Service registry, one entry per backend.
    pub services: Vec<ServiceConfig>,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind (e.g., "0.0.0.0").
    pub bind_address: String,

    /// Listen port.
    pub port: u16,

    /// Upstream request timeout in seconds (0 = default).
    pub timeout_secs: u64,

    /// Attach a permissive CORS layer.
    pub cors_enabled: bool,
}

impl ServerConfig {
    /// Socket address string the listener binds to.
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    /// Timeout applied to every forwarded request.
    pub fn upstream_timeout(&self) -> Duration {
        match self.timeout_secs {
            0 => Duration::from_secs(DEFAULT_UPSTREAM_TIMEOUT_SECS),
            secs => Duration::from_secs(secs),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8080,
            timeout_secs: DEFAULT_UPSTREAM_TIMEOUT_SECS,
            cors_enabled: true,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Token refill rate for the local limiter; request limit per window
    /// for the distributed one.
    pub requests_per_second: u32,

    /// Bucket capacity for the local limiter.
    pub burst: u32,

    /// Sliding window length in milliseconds.
    pub window_ms: u64,

    /// How often idle buckets are swept, in seconds.
    pub cleanup_interval_secs: u64,

    /// Buckets untouched for longer than this are dropped.
    pub idle_ttl_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 100,
            burst: 50,
            window_ms: 1_000,
            cleanup_interval_secs: 30 * 60,
            idle_ttl_secs: 60 * 60,
        }
    }
}

/// Connection settings for the Redis-compatible store.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub password: String,
    pub db: i64,

    /// Namespace for sliding window keys.
    pub key_prefix: String,

    /// Bound on every limiter round trip, in milliseconds.
    pub call_timeout_ms: u64,

    /// Bound on the startup connection attempt, in seconds.
    pub connect_timeout_secs: u64,
}

impl RedisConfig {
    pub fn is_configured(&self) -> bool {
        !self.host.trim().is_empty()
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 6379,
            password: String::new(),
            db: 0,
            key_prefix: "rate_limit".to_string(),
            call_timeout_ms: 1_000,
            connect_timeout_secs: 5,
        }
    }
}

/// Token verification settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Hex-encoded Ed25519 public key (32 bytes).
    pub public_key_hex: String,

    /// Reject tokens that carry no `exp` claim.
    pub require_expiration: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            public_key_hex: String::new(),
            require_expiration: true,
        }
    }
}

/// A backend service registered under a path prefix.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    /// Service identifier for logging/metrics.
    pub name: String,

    /// Path the service is registered under (e.g., "/api/users/:id").
    pub base_path: String,

    /// Base URL requests are forwarded to (e.g., "http://127.0.0.1:3000").
    pub target: String,

    /// Allowed methods; empty allows every method.
    #[serde(default)]
    pub methods: Vec<String>,

    /// Forward without verifying a bearer token.
    #[serde(default)]
    pub skip_auth: bool,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// "pretty" or "json".
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
