//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route table construction (at startup):
//!     (method, template, handler)
//!     → matcher.rs (compile template into parts)
//!     → router.rs (append in registration order)
//!
//! Incoming Request (method, path)
//!     → router.rs (first route whose method and pattern accept)
//!     → handler(request, context, params) → Reply
//!     → reply.rs (normalize Reply into a response)
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex: templates compile to a small backtracking matcher
//! - Deterministic: same input always matches same route
//! - First match wins (registration order)

pub mod matcher;
pub mod reply;
pub mod router;

pub use matcher::{Params, PathPattern, PatternError, WILDCARD_KEY};
pub use reply::Reply;
pub use router::{HandlerFuture, MethodFilter, Route, RouteError, RouteMatch, Router};
