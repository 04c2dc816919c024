//! Declarative configuration model.
//!
//! # Data Flow
//! ```text
//! Object store snapshot
//!     → fragment.rs (roots, children, routes, includes, services)
//!     → condition.rs (Prefix / Exact path conditions)
//!     → policy.rs (rate limit, health check, header policies)
//! ```
//!
//! # Design Decisions
//! - Declared objects are immutable; resolution never writes back into them
//! - Raw declarations keep unvalidated strings where a bad value must be
//!   reported rather than rejected at parse time

pub mod condition;
pub mod fragment;
pub mod policy;

pub use condition::Condition;
pub use fragment::{Fragment, Include, ObjectKey, Route, ServiceRef, TlsSpec, VirtualHost};
pub use policy::{
    HeaderPolicy, HeaderScope, HeaderValue, HealthCheckPolicy, RateLimitPolicy, RateLimitSpec,
    RateLimitUnit,
};
