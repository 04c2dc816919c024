//! Route health state machine.
//!
//! # States
//! - Unknown: no probe reported yet, traffic allowed
//! - Healthy: traffic allowed
//! - Unhealthy: all traffic to the route rejected with 503
//!
//! # State Transitions
//! ```text
//! Healthy/Unknown → Unhealthy: consecutive failures >= unhealthy_threshold
//! Unhealthy/Unknown → Healthy: consecutive successes >= healthy_threshold
//! ```
//!
//! Probing itself is done by an external prober that reports outcomes here.
//! State is keyed by route id and probe path, so changing a route's probe
//! path starts from Unknown without a restart.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

use dashmap::DashMap;
use serde::Serialize;

use crate::model::HealthCheckPolicy;

/// Health State enum.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Unknown = 0,
    Healthy = 1,
    Unhealthy = 2,
}

impl From<u8> for HealthState {
    fn from(val: u8) -> Self {
        match val {
            1 => HealthState::Healthy,
            2 => HealthState::Unhealthy,
            _ => HealthState::Unknown,
        }
    }
}

#[derive(Debug, Default)]
struct RouteHealth {
    state: AtomicU8,
    consecutive_failures: AtomicUsize,
    consecutive_successes: AtomicUsize,
}

impl RouteHealth {
    fn state(&self) -> HealthState {
        HealthState::from(self.state.load(Ordering::Relaxed))
    }

    fn mark_success(&self, healthy_threshold: usize) -> HealthState {
        self.consecutive_failures.store(0, Ordering::Relaxed);
        if self.state() == HealthState::Healthy {
            return HealthState::Healthy;
        }

        let successes = self.consecutive_successes.fetch_add(1, Ordering::Relaxed) + 1;
        if successes >= healthy_threshold {
            self.state.store(HealthState::Healthy as u8, Ordering::Relaxed);
            self.consecutive_successes.store(0, Ordering::Relaxed);
        }
        self.state()
    }

    fn mark_failure(&self, unhealthy_threshold: usize) -> HealthState {
        self.consecutive_successes.store(0, Ordering::Relaxed);
        if self.state() == HealthState::Unhealthy {
            return HealthState::Unhealthy;
        }

        let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        if failures >= unhealthy_threshold {
            self.state.store(HealthState::Unhealthy as u8, Ordering::Relaxed);
            self.consecutive_failures.store(0, Ordering::Relaxed);
        }
        self.state()
    }
}

/// Health state for every route with a health-check policy.
#[derive(Debug, Default)]
pub struct HealthRegistry {
    routes: DashMap<(String, String), RouteHealth>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one probe outcome for a route under its current policy.
    pub fn report(&self, route_id: &str, policy: &HealthCheckPolicy, healthy: bool) -> HealthState {
        let entry = self
            .routes
            .entry((route_id.to_string(), policy.path.clone()))
            .or_default();

        let before = entry.state();
        let after = if healthy {
            entry.mark_success(policy.healthy_threshold as usize)
        } else {
            entry.mark_failure(policy.unhealthy_threshold as usize)
        };

        if before != after {
            tracing::info!(
                route = %route_id,
                probe_path = %policy.path,
                from = ?before,
                to = ?after,
                "Route health changed"
            );
        }
        after
    }

    pub fn state(&self, route_id: &str, policy: &HealthCheckPolicy) -> HealthState {
        self.routes
            .get(&(route_id.to_string(), policy.path.clone()))
            .map(|h| h.state())
            .unwrap_or(HealthState::Unknown)
    }

    /// Unknown counts as healthy.
    pub fn is_healthy(&self, route_id: &str, policy: &HealthCheckPolicy) -> bool {
        self.state(route_id, policy) != HealthState::Unhealthy
    }

    /// Drop state for routes no longer present in the published tables.
    pub fn retain_routes(&self, live: &BTreeSet<String>) {
        self.routes.retain(|(id, _), _| live.contains(id));
    }
}
