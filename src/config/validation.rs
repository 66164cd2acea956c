//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (ports, intervals, burst)
//! - Check service targets and methods
//! - Detect conflicting registrations
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use axum::http::Method;
use thiserror::Error;
use url::Url;

use crate::config::schema::GatewayConfig;
use crate::routing::Router;
use crate::security::token::PublicKey;

/// A single semantic problem found in a configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("server.port must be non-zero")]
    ZeroPort,

    #[error("rate_limit.burst must be at least 1")]
    ZeroBurst,

    #[error("rate_limit.cleanup_interval_secs must be non-zero")]
    ZeroCleanupInterval,

    #[error("redis.call_timeout_ms must be non-zero")]
    ZeroCallTimeout,

    #[error("service #{index} has an empty name")]
    EmptyServiceName { index: usize },

    #[error("service '{service}' has an invalid target '{target}': {reason}")]
    InvalidTarget {
        service: String,
        target: String,
        reason: String,
    },

    #[error("service '{service}' lists an invalid method '{method}'")]
    InvalidMethod { service: String, method: String },

    #[error("{0}")]
    Registration(String),

    #[error("auth.public_key_hex is invalid: {0}")]
    InvalidPublicKey(String),

    #[error("services {services:?} require authentication but auth.public_key_hex is empty")]
    MissingPublicKey { services: Vec<String> },

    #[error("observability.log_format must be 'pretty' or 'json', got '{0}'")]
    InvalidLogFormat(String),

    #[error("observability.metrics_address '{0}' is not a socket address")]
    InvalidMetricsAddress(String),
}

/// Check a parsed configuration for semantic errors.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.port == 0 {
        errors.push(ValidationError::ZeroPort);
    }
    if config.rate_limit.burst == 0 {
        errors.push(ValidationError::ZeroBurst);
    }
    if config.rate_limit.cleanup_interval_secs == 0 {
        errors.push(ValidationError::ZeroCleanupInterval);
    }
    if config.redis.is_configured() && config.redis.call_timeout_ms == 0 {
        errors.push(ValidationError::ZeroCallTimeout);
    }

    for (index, service) in config.services.iter().enumerate() {
        if service.name.trim().is_empty() {
            errors.push(ValidationError::EmptyServiceName { index });
        }
        if let Err(reason) = check_target(&service.target) {
            errors.push(ValidationError::InvalidTarget {
                service: service.name.clone(),
                target: service.target.clone(),
                reason,
            });
        }
        for method in &service.methods {
            if Method::from_bytes(method.as_bytes()).is_err() {
                errors.push(ValidationError::InvalidMethod {
                    service: service.name.clone(),
                    method: method.clone(),
                });
            }
        }
    }

    // Duplicate registrations surface the same way they would at startup.
    if let Err(e) = Router::from_services(&config.services) {
        errors.push(ValidationError::Registration(e.to_string()));
    }

    if config.auth.public_key_hex.trim().is_empty() {
        let services: Vec<String> = config
            .services
            .iter()
            .filter(|s| !s.skip_auth)
            .map(|s| s.name.clone())
            .collect();
        if !services.is_empty() {
            errors.push(ValidationError::MissingPublicKey { services });
        }
    } else if let Err(e) = PublicKey::from_hex(&config.auth.public_key_hex) {
        errors.push(ValidationError::InvalidPublicKey(e.to_string()));
    }

    match config.observability.log_format.as_str() {
        "pretty" | "json" => {}
        other => errors.push(ValidationError::InvalidLogFormat(other.to_string())),
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_target(target: &str) -> Result<(), String> {
    let url = Url::parse(target).map_err(|e| e.to_string())?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("unsupported scheme '{}'", url.scheme()));
    }
    if url.host_str().is_none() {
        return Err("missing host".to_string());
    }
    Ok(())
}
