//! Admission control.
//!
//! # Responsibilities
//! - Decide whether a request keyed by `client_ip:path` may proceed
//! - Offer an in-process and a shared-store strategy behind one call
//!
//! # Design Decisions
//! - Strategy is chosen once at startup and never swapped
//! - Errors are reported, not swallowed; the dispatcher decides to fail open
//! - Closed set of strategies, so an enum rather than a trait object

pub mod sliding_window;
pub mod token_bucket;

use std::time::Duration;

use thiserror::Error;

pub use sliding_window::SlidingWindowLimiter;
pub use token_bucket::TokenBucketLimiter;

/// Failure to reach an admission decision.
#[derive(Debug, Error)]
pub enum RateLimiterError {
    #[error("rate limit key cannot be empty")]
    EmptyKey,

    #[error("rate limit store error: {0}")]
    Backend(#[from] redis::RedisError),

    #[error("rate limit store did not answer within {0:?}")]
    Timeout(Duration),

    #[error("invalid rate limit store configuration: {0}")]
    Config(String),
}

/// The selected admission strategy.
#[derive(Debug)]
pub enum AdmissionController {
    Local(TokenBucketLimiter),
    Distributed(SlidingWindowLimiter),
}

impl AdmissionController {
    /// Decide whether one more request for `key` is admitted.
    pub async fn allow(&self, key: &str) -> Result<bool, RateLimiterError> {
        match self {
            AdmissionController::Local(limiter) => limiter.allow(key),
            AdmissionController::Distributed(limiter) => limiter.allow(key).await,
        }
    }

    /// Strategy name for logs and metrics labels.
    pub fn strategy(&self) -> &'static str {
        match self {
            AdmissionController::Local(_) => "local",
            AdmissionController::Distributed(_) => "distributed",
        }
    }
}

/// Admission key for a request: `client_ip:path`.
pub fn admission_key(client_ip: &str, path: &str) -> String {
    format!("{}:{}", client_ip, path)
}
