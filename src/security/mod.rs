//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → headers.rs (client identity from X-Forwarded-For / X-Real-IP / peer)
//!     → rate_limit/ (admission decision for client_ip:path)
//!     → [routing resolves the service]
//!     → auth.rs (verify bearer token unless the route skips auth)
//!     → token.rs (v4.public signature check)
//!     → headers.rs (replace forwarding headers with verified claims)
//! ```
//!
//! # Design Decisions
//! - Admission control fails open on store errors, authentication fails closed
//! - No trust in caller-supplied identity headers

pub mod auth;
pub mod headers;
pub mod rate_limit;
pub mod token;

pub use auth::{AuthError, Authenticator, Claims};
pub use rate_limit::{AdmissionController, RateLimiterError};
pub use token::{PublicKey, SecretKey, TokenError};
