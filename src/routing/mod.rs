//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (path)
//!     → matcher.rs (split into segments)
//!     → router.rs (trie descent, collect candidates)
//!     → Return: highest-priority ServiceRoute or no match
//!
//! Route Compilation (at startup):
//!     ServiceConfig[]
//!     → split base paths, priority = depth
//!     → insert into segment trie (wildcards share one branch)
//!     → Freeze as immutable Router
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (segment lookups only)
//! - Deterministic: same input always matches same route
//! - Most specific match wins; exact beats wildcard at equal depth

pub mod matcher;
pub mod router;

pub use matcher::MethodFilter;
pub use router::{RegistrationError, Router, ServiceRoute};
