//! Per-route and per-virtual-host policy declarations.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Local rate limit as declared. The unit is kept as a string so an
/// unrecognized value can be reported instead of failing deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RateLimitSpec {
    pub requests: u32,
    pub unit: String,
}

/// Window unit for a local rate limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RateLimitUnit {
    Second,
    Minute,
    Hour,
}

impl RateLimitUnit {
    pub fn parse(unit: &str) -> Option<Self> {
        match unit {
            "second" => Some(RateLimitUnit::Second),
            "minute" => Some(RateLimitUnit::Minute),
            "hour" => Some(RateLimitUnit::Hour),
            _ => None,
        }
    }

    pub fn as_secs(&self) -> u64 {
        match self {
            RateLimitUnit::Second => 1,
            RateLimitUnit::Minute => 60,
            RateLimitUnit::Hour => 3600,
        }
    }
}

impl fmt::Display for RateLimitUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RateLimitUnit::Second => "second",
            RateLimitUnit::Minute => "minute",
            RateLimitUnit::Hour => "hour",
        };
        f.write_str(s)
    }
}

/// Validated local rate limit, scoped to one data-plane instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct RateLimitPolicy {
    pub requests: u32,
    pub unit: RateLimitUnit,
}

/// Active health check policy for the upstreams of a route.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct HealthCheckPolicy {
    /// Path the external prober requests.
    pub path: String,

    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Consecutive failures before the route is marked unhealthy.
    #[serde(default = "default_unhealthy_threshold")]
    pub unhealthy_threshold: u32,

    /// Consecutive successes before the route is marked healthy again.
    #[serde(default = "default_healthy_threshold")]
    pub healthy_threshold: u32,
}

fn default_interval_secs() -> u64 {
    5
}

fn default_timeout_secs() -> u64 {
    2
}

fn default_unhealthy_threshold() -> u32 {
    3
}

fn default_healthy_threshold() -> u32 {
    2
}

impl HealthCheckPolicy {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            interval_secs: default_interval_secs(),
            timeout_secs: default_timeout_secs(),
            unhealthy_threshold: default_unhealthy_threshold(),
            healthy_threshold: default_healthy_threshold(),
        }
    }
}

/// A single header `set` operation. The value may carry dynamic tokens.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct HeaderValue {
    pub name: String,
    pub value: String,
}

/// Ordered header set/remove operations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct HeaderPolicy {
    #[serde(default)]
    pub set: Vec<HeaderValue>,

    #[serde(default)]
    pub remove: Vec<String>,
}

impl HeaderPolicy {
    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.remove.is_empty()
    }
}

/// Where a header policy applies. Response policies may not rewrite `Host`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderScope {
    Request,
    Response,
}

impl fmt::Display for HeaderScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderScope::Request => f.write_str("request"),
            HeaderScope::Response => f.write_str("response"),
        }
    }
}
