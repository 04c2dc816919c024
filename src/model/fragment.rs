//! Configuration fragments as supplied by the object store.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::condition::Condition;
use crate::model::policy::{HealthCheckPolicy, HeaderPolicy, RateLimitSpec};

/// Identity of any store object: (namespace, name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// A configuration fragment. Roots carry a virtual host; children do not.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Fragment {
    pub namespace: String,
    pub name: String,

    /// Creation sequence; lower wins duplicate FQDN claims.
    #[serde(default)]
    pub created: u64,

    #[serde(default)]
    pub virtual_host: Option<VirtualHost>,

    #[serde(default)]
    pub routes: Vec<Route>,

    #[serde(default)]
    pub includes: Vec<Include>,
}

impl Fragment {
    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(&self.namespace, &self.name)
    }

    pub fn is_root(&self) -> bool {
        self.virtual_host.is_some()
    }
}

/// Externally addressable host served by a root fragment.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct VirtualHost {
    pub fqdn: String,

    #[serde(default)]
    pub tls: Option<TlsSpec>,

    #[serde(default)]
    pub rate_limit: Option<RateLimitSpec>,

    #[serde(default)]
    pub health_check: Option<HealthCheckPolicy>,

    #[serde(default)]
    pub request_headers: Option<HeaderPolicy>,

    #[serde(default)]
    pub response_headers: Option<HeaderPolicy>,
}

/// TLS identity for a virtual host. The secret lives in the root's namespace.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TlsSpec {
    pub secret_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Route {
    #[serde(default)]
    pub conditions: Vec<Condition>,

    #[serde(default)]
    pub services: Vec<ServiceRef>,

    #[serde(default)]
    pub rate_limit: Option<RateLimitSpec>,

    #[serde(default)]
    pub health_check: Option<HealthCheckPolicy>,

    #[serde(default)]
    pub request_headers: Option<HeaderPolicy>,

    #[serde(default)]
    pub response_headers: Option<HeaderPolicy>,
}

/// Delegation of a condition-scoped slice of the path space to a child.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Include {
    /// Defaults to the including fragment's namespace.
    #[serde(default)]
    pub namespace: Option<String>,

    pub name: String,

    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl Include {
    /// Resolve the include target relative to the parent's namespace.
    pub fn target(&self, parent_namespace: &str) -> ObjectKey {
        ObjectKey::new(
            self.namespace.as_deref().unwrap_or(parent_namespace),
            &self.name,
        )
    }
}

/// Weighted reference to an upstream service in the fragment's namespace.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ServiceRef {
    pub name: String,
    pub port: u16,

    #[serde(default = "default_weight")]
    pub weight: u32,

    #[serde(default)]
    pub request_headers: Option<HeaderPolicy>,

    #[serde(default)]
    pub response_headers: Option<HeaderPolicy>,
}

fn default_weight() -> u32 {
    1
}
