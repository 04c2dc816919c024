//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (sni, host, path, headers)
//!     → matcher.rs (virtual host lookup, SNI binding)
//!     → route table precedence (Exact, longest Prefix, traversal order)
//!     → router.rs (health, rate limit, header rendering)
//!     → Return: Forward or an explicit rejection
//! ```
//!
//! # Design Decisions
//! - Route tables are resolved ahead of time, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always matches same route

pub mod matcher;
pub mod router;

pub use router::{Dispatch, DispatchRequest, Dispatcher, Forward, ProbeError, RenderedHeaders};
