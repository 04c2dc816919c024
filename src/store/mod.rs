//! Fragment store view.
//!
//! # Responsibilities
//! - Hold a consistent, immutable snapshot of fragments, services and secrets
//! - Load snapshots from disk (TOML or JSON)
//! - Validate TLS secret material
//!
//! # Design Decisions
//! - The store owns change delivery and retries; this module only reads
//! - Objects are index-addressed by (namespace, name), never linked by reference

pub mod loader;
pub mod secret;
pub mod snapshot;

pub use loader::{load_snapshot, SnapshotError};
pub use snapshot::{SecretObject, ServiceObject, SnapshotDocument, StoreSnapshot};
