//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → EngineConfig (validated, immutable)
//!
//! On snapshot change:
//!     watcher.rs detects change
//!     → store loader parses the new snapshot
//!     → controller debounces and resolves
//!     → atomic swap of the published Resolution
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; only the snapshot hot-reloads
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::{AdminConfig, EngineConfig, LogFormat, ObservabilityConfig, ResolverConfig, WatchConfig};
pub use watcher::SnapshotWatcher;
