//! Atomic publication of resolutions.

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::health::HealthRegistry;
use crate::resolver::Resolution;
use crate::security::rate_limit::LocalRateLimiter;

/// A resolution together with the generation it was published under.
#[derive(Debug, Default)]
pub struct Published {
    pub generation: u64,
    pub resolution: Arc<Resolution>,
}

/// Holds the current resolution and the per-route runtime state tied to it.
///
/// Readers call [`Publisher::load`] once per request and keep the returned
/// `Arc` for its duration. There is a single writer: the controller.
#[derive(Debug, Default)]
pub struct Publisher {
    current: ArcSwap<Published>,
    limiter: Arc<LocalRateLimiter>,
    health: Arc<HealthRegistry>,
}

impl Publisher {
    pub fn new(limiter: Arc<LocalRateLimiter>, health: Arc<HealthRegistry>) -> Self {
        Self {
            current: ArcSwap::from_pointee(Published::default()),
            limiter,
            health,
        }
    }

    pub fn load(&self) -> Arc<Published> {
        self.current.load_full()
    }

    pub fn generation(&self) -> u64 {
        self.current.load().generation
    }

    pub fn limiter(&self) -> Arc<LocalRateLimiter> {
        self.limiter.clone()
    }

    pub fn health(&self) -> Arc<HealthRegistry> {
        self.health.clone()
    }

    /// Publish `resolution`. Returns false, and keeps the generation, when it
    /// equals the current one.
    pub fn publish(&self, resolution: Resolution) -> bool {
        let current = self.current.load_full();
        if *current.resolution == resolution {
            tracing::debug!(generation = current.generation, "Resolution unchanged");
            return false;
        }

        let live = resolution.route_ids();
        let generation = current.generation + 1;
        self.current.store(Arc::new(Published {
            generation,
            resolution: Arc::new(resolution),
        }));

        // Prune after the swap so a dispatch still holding the old table
        // cannot recreate state for a removed route behind the prune.
        self.limiter.retain_routes(&live);
        self.health.retain_routes(&live);
        tracing::info!(generation, routes = live.len(), "Resolution published");
        true
    }
}
