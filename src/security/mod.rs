//! Data-plane-side request policy enforcement.
//!
//! # Data Flow
//! ```text
//! Matched route:
//!     → rate_limit.rs (local token bucket per route)
//!     → headers.rs (render header value tokens from request context)
//!     → Forward decision
//! ```
//!
//! # Design Decisions
//! - Fail closed: an exhausted bucket rejects with 429
//! - Limits are local to one instance, never coordinated cluster-wide
//! - Token syntax is shared with the resolver; evaluation happens only here

pub mod headers;
pub mod rate_limit;
