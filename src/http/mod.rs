//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, access log, CORS)
//!     → dispatch.rs (admission → route → auth → method → forward)
//!     → request.rs (rewrite URI, prepare forwarded headers)
//!     → response.rs (gateway errors → status + body)
//!     → Send to client
//! ```

pub mod dispatch;
pub mod request;
pub mod response;
pub mod server;

pub use dispatch::{Dispatcher, Stage};
pub use request::X_REQUEST_ID;
pub use response::GatewayError;
pub use server::GatewayServer;
