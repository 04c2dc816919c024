//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Load snapshot → Resolve → Start watcher,
//!     controller and admin API
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop watcher and controller → Drain admin API → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then the initial resolution, then listeners
//! - The admin API only starts once a resolution is published

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::shutdown_on_signal;
