//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! External prober (probe path from the route's HealthCheckPolicy)
//!     → POST /api/probes
//!     → state.rs (threshold state machine per route)
//!     → dispatcher rejects Unhealthy routes with 503
//! ```
//!
//! # Design Decisions
//! - Probing is owned by an external collaborator; only policy and state live here
//! - State transitions require consecutive successes/failures
//! - Health state is per route, not per backend

pub mod state;

pub use state::{HealthRegistry, HealthState};
