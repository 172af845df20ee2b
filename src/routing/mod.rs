//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, path)
//!     → router.rs (scan services, then routes, in declaration order)
//!     → matcher.rs (evaluate compiled path template)
//!     → Return: matched service + route, or None
//!
//! Route Compilation (at config load):
//!     RouteConfig.paths[0]
//!     → PathMatcher::compile
//!     → Frozen inside the immutable Configuration
//! ```
//!
//! # Design Decisions
//! - Routes compiled at load time, immutable at runtime
//! - Deterministic: same input always matches same route
//! - First match wins (declaration order, services before routes)

pub mod matcher;
pub mod router;

pub use matcher::{InvalidPatternError, PathMatcher};
pub use router::{find_route, RouteMatch};
