//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, path)
//!     → router.rs (route lookup)
//!     → pattern.rs (segment-wise match, bind placeholders)
//!     → Return: Found { handler, params } | MethodNotAllowed | NotFound
//!
//! Route Compilation (at startup):
//!     (method, pattern, handler)[]
//!     → Parse patterns
//!     → Reject duplicate method + pattern shape
//!     → Freeze as immutable Router
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (segment comparison only)
//! - Deterministic: a literal segment beats a placeholder regardless of registration order
//! - Registration conflicts fail fast, never at request time

pub mod pattern;
pub mod router;

pub use pattern::{PathParams, PathPattern, PatternError};
pub use router::{MatchedRoute, RouteError, RouteMatch, Router, RouterBuilder};
