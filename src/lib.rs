//! Edge API gateway library.
//!
//! Resolves inbound paths to registered backend services, applies
//! per-client admission control, verifies bearer tokens and forwards the
//! request, streaming the backend's response back unchanged.

// Core subsystems
pub mod config;
pub mod http;
pub mod routing;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::GatewayConfig;
pub use http::{Dispatcher, GatewayError, GatewayServer};
pub use lifecycle::Shutdown;
