//! Reconciliation controller.
//!
//! # Data Flow
//! ```text
//! SnapshotWatcher (notify)
//!     → mpsc channel of StoreSnapshot
//!     → debounce (quiet period, latest snapshot wins, capped by max wait)
//!     → Resolver::resolve
//!     → Publisher::publish (arc-swap, generation bump on change)
//! ```
//!
//! # Design Decisions
//! - Every pass is a full recompute over an immutable snapshot
//! - A burst of changes yields one resolution
//! - A burst never delays publication past `max_wait` from its first change
//! - Shutdown stops the loop without publishing a partial result

pub mod publisher;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;

use crate::resolver::Resolver;
use crate::store::StoreSnapshot;

pub use publisher::{Published, Publisher};

/// Multiple of the debounce window used as the default maximum wait.
const DEFAULT_MAX_WAIT_FACTOR: u32 = 8;

pub struct Controller {
    resolver: Resolver,
    publisher: Arc<Publisher>,
    debounce: Duration,
    max_wait: Duration,
}

impl Controller {
    pub fn new(resolver: Resolver, publisher: Arc<Publisher>, debounce: Duration) -> Self {
        Self {
            resolver,
            publisher,
            debounce,
            max_wait: debounce.saturating_mul(DEFAULT_MAX_WAIT_FACTOR),
        }
    }

    /// Cap how long a burst of updates is coalesced. Never below the
    /// debounce window.
    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait.max(self.debounce);
        self
    }

    /// Resolve `snapshot` and publish the result. Returns true if published.
    pub fn apply(&self, snapshot: &StoreSnapshot) -> bool {
        let resolution = self.resolver.resolve(snapshot);
        self.publisher.publish(resolution)
    }

    /// Consume snapshot updates until the channel closes or shutdown fires.
    pub async fn run(
        self,
        mut updates: mpsc::UnboundedReceiver<StoreSnapshot>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        tracing::info!(
            debounce_ms = self.debounce.as_millis() as u64,
            max_wait_ms = self.max_wait.as_millis() as u64,
            "Controller started"
        );
        loop {
            let mut latest = tokio::select! {
                Some(snapshot) = updates.recv() => snapshot,
                _ = shutdown.recv() => {
                    tracing::info!("Controller stopping");
                    return;
                }
                else => return,
            };

            let deadline = Instant::now() + self.max_wait;
            let mut coalesced = 1usize;
            loop {
                let now = Instant::now();
                if now >= deadline {
                    break;
                }
                let quiet_until = (now + self.debounce).min(deadline);
                match tokio::time::timeout_at(quiet_until, updates.recv()).await {
                    Ok(Some(snapshot)) => {
                        latest = snapshot;
                        coalesced += 1;
                    }
                    Ok(None) => {
                        self.apply(&latest);
                        return;
                    }
                    Err(_) => break,
                }
            }

            tracing::debug!(coalesced, "Applying snapshot");
            self.apply(&latest);
        }
    }
}
