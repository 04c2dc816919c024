//! Request dispatch against the published resolution.
//!
//! # Responsibilities
//! - Match virtual host, then route, for one request
//! - Apply route health and local rate limits
//! - Render request and response header policies
//!
//! # Design Decisions
//! - Reads one `Arc<Resolution>` per request; never sees a mixed state
//! - Explicit outcomes rather than silent defaults (fail closed)
//! - Check order: SNI binding, route match, health, rate limit

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::controller::Publisher;
use crate::health::{HealthRegistry, HealthState};
use crate::model::{Condition, HeaderPolicy, HeaderValue};
use crate::observability::metrics;
use crate::resolver::UpstreamService;
use crate::routing::matcher::{match_virtual_host, HostMatch};
use crate::security::headers::{render, RequestContext};
use crate::security::rate_limit::LocalRateLimiter;

/// Everything the data plane knows about one request.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct DispatchRequest {
    pub host: String,
    pub path: String,
    /// TLS server name; `None` for plaintext connections.
    pub sni: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub remote_addr: Option<String>,
    pub protocol: Option<String>,
}

/// Header operations with tokens rendered for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RenderedHeaders {
    pub set: Vec<HeaderValue>,
    pub remove: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Forward {
    pub fqdn: String,
    pub route_id: String,
    pub condition: Condition,
    pub services: Vec<UpstreamService>,
    pub request_headers: RenderedHeaders,
    pub response_headers: RenderedHeaders,
}

/// Routing decision for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Dispatch {
    Forward(Forward),
    Redirect { location: String },
    NotFound,
    Misdirected { reason: String },
    RateLimited { route_id: String },
    Unavailable { route_id: String },
}

impl Dispatch {
    pub fn status_code(&self) -> u16 {
        match self {
            Dispatch::Forward(_) => 200,
            Dispatch::Redirect { .. } => 301,
            Dispatch::NotFound => 404,
            Dispatch::Misdirected { .. } => 421,
            Dispatch::RateLimited { .. } => 429,
            Dispatch::Unavailable { .. } => 503,
        }
    }

    pub fn outcome(&self) -> &'static str {
        match self {
            Dispatch::Forward(_) => "forward",
            Dispatch::Redirect { .. } => "redirect",
            Dispatch::NotFound => "not_found",
            Dispatch::Misdirected { .. } => "misdirected",
            Dispatch::RateLimited { .. } => "rate_limited",
            Dispatch::Unavailable { .. } => "unavailable",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    #[error("route {0:?} is not served")]
    UnknownRoute(String),

    #[error("route {0:?} has no health check")]
    NoHealthCheck(String),
}

/// Routes requests against whatever resolution is currently published.
#[derive(Clone)]
pub struct Dispatcher {
    publisher: Arc<Publisher>,
    limiter: Arc<LocalRateLimiter>,
    health: Arc<HealthRegistry>,
}

impl Dispatcher {
    pub fn new(publisher: Arc<Publisher>) -> Self {
        Self {
            limiter: publisher.limiter(),
            health: publisher.health(),
            publisher,
        }
    }

    pub fn dispatch(&self, request: &DispatchRequest) -> Dispatch {
        let published = self.publisher.load();
        let decision = self.decide(&published.resolution, request);
        tracing::debug!(
            host = %request.host,
            path = %request.path,
            generation = published.generation,
            outcome = decision.outcome(),
            "Dispatch"
        );
        metrics::record_dispatch(decision.outcome());
        decision
    }

    fn decide(&self, resolution: &crate::resolver::Resolution, request: &DispatchRequest) -> Dispatch {
        let table = match match_virtual_host(resolution, &request.host, request.sni.as_deref(), &request.path) {
            HostMatch::Matched(table) => table,
            HostMatch::Redirect(location) => return Dispatch::Redirect { location },
            HostMatch::NotFound => return Dispatch::NotFound,
            HostMatch::Misdirected(reason) => return Dispatch::Misdirected { reason },
        };

        let Some(route) = table.select(&request.path) else {
            return Dispatch::NotFound;
        };

        if let Some(check) = &route.policy.health_check {
            if !self.health.is_healthy(&route.id, check) {
                return Dispatch::Unavailable {
                    route_id: route.id.clone(),
                };
            }
        }

        if let Some(limit) = &route.policy.rate_limit {
            if !self.limiter.check(&route.id, limit) {
                tracing::debug!(route = %route.id, "Rate limit exceeded");
                return Dispatch::RateLimited {
                    route_id: route.id.clone(),
                };
            }
        }

        let ctx = RequestContext {
            headers: request
                .headers
                .iter()
                .map(|(k, v)| (k.to_ascii_lowercase(), v.clone()))
                .collect(),
            host: request.host.clone(),
            sni: request.sni.clone(),
            remote_addr: request.remote_addr.clone(),
            protocol: request.protocol.clone(),
        };

        Dispatch::Forward(Forward {
            fqdn: table.fqdn.clone(),
            route_id: route.id.clone(),
            condition: route.condition.clone(),
            services: route.services.clone(),
            request_headers: render_policy(route.policy.request_headers.as_ref(), &ctx),
            response_headers: render_policy(route.policy.response_headers.as_ref(), &ctx),
        })
    }

    /// Record an active probe result for a served route.
    pub fn report_probe(&self, route_id: &str, healthy: bool) -> Result<HealthState, ProbeError> {
        let published = self.publisher.load();
        let route = published
            .resolution
            .tables
            .values()
            .flat_map(|t| t.routes.iter())
            .find(|r| r.id == route_id)
            .ok_or_else(|| ProbeError::UnknownRoute(route_id.to_string()))?;
        let check = route
            .policy
            .health_check
            .as_ref()
            .ok_or_else(|| ProbeError::NoHealthCheck(route_id.to_string()))?;
        Ok(self.health.report(route_id, check, healthy))
    }
}

fn render_policy(policy: Option<&HeaderPolicy>, ctx: &RequestContext) -> RenderedHeaders {
    let Some(policy) = policy else {
        return RenderedHeaders::default();
    };
    RenderedHeaders {
        set: policy
            .set
            .iter()
            .map(|h| HeaderValue {
                name: h.name.clone(),
                value: render(&h.value, ctx),
            })
            .collect(),
        remove: policy.remove.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{HealthCheckPolicy, ObjectKey, RateLimitPolicy, RateLimitUnit};
    use crate::resolver::{EffectivePolicy, Resolution, RouteEntry, RouteTable};

    fn route(fqdn: &str, path: &str, policy: EffectivePolicy) -> RouteEntry {
        let condition = Condition::Prefix(path.into());
        RouteEntry {
            id: format!("{}|{}", fqdn, condition),
            condition,
            source: ObjectKey::new("ns", "a"),
            services: vec![],
            policy,
        }
    }

    fn dispatcher(routes: Vec<RouteEntry>) -> Dispatcher {
        let table = RouteTable {
            fqdn: "app.example.com".into(),
            root: ObjectKey::new("ns", "root"),
            tls: None,
            routes,
        };
        let mut resolution = Resolution::default();
        resolution.tables.insert(table.fqdn.clone(), table);

        let publisher = Arc::new(Publisher::default());
        publisher.publish(resolution);
        Dispatcher::new(publisher)
    }

    fn request(path: &str) -> DispatchRequest {
        DispatchRequest {
            host: "app.example.com".into(),
            path: path.into(),
            ..DispatchRequest::default()
        }
    }

    #[test]
    fn test_rate_limit_per_route() {
        let limited = EffectivePolicy {
            rate_limit: Some(RateLimitPolicy { requests: 1, unit: RateLimitUnit::Hour }),
            ..EffectivePolicy::default()
        };
        let dispatcher = dispatcher(vec![
            route("app.example.com", "/limited", limited),
            route("app.example.com", "/", EffectivePolicy::default()),
        ]);

        assert_eq!(dispatcher.dispatch(&request("/limited")).status_code(), 200);
        assert_eq!(dispatcher.dispatch(&request("/limited")).status_code(), 429);
        assert_eq!(dispatcher.dispatch(&request("/other")).status_code(), 200);
    }

    #[test]
    fn test_health_toggle() {
        let checked = EffectivePolicy {
            health_check: Some(HealthCheckPolicy {
                unhealthy_threshold: 1,
                healthy_threshold: 1,
                ..HealthCheckPolicy::new("/healthz")
            }),
            ..EffectivePolicy::default()
        };
        let dispatcher = dispatcher(vec![route("app.example.com", "/", checked)]);
        let id = "app.example.com|prefix:/";

        assert_eq!(dispatcher.dispatch(&request("/")).status_code(), 200);
        assert_eq!(dispatcher.report_probe(id, false), Ok(HealthState::Unhealthy));
        assert_eq!(dispatcher.dispatch(&request("/")).status_code(), 503);
        assert_eq!(dispatcher.report_probe(id, true), Ok(HealthState::Healthy));
        assert_eq!(dispatcher.dispatch(&request("/")).status_code(), 200);
    }

    #[test]
    fn test_probe_errors() {
        let dispatcher = dispatcher(vec![route("app.example.com", "/", EffectivePolicy::default())]);
        assert!(matches!(
            dispatcher.report_probe("app.example.com|prefix:/", true),
            Err(ProbeError::NoHealthCheck(_))
        ));
        assert!(matches!(
            dispatcher.report_probe("nope", true),
            Err(ProbeError::UnknownRoute(_))
        ));
    }

    #[test]
    fn test_headers_rendered() {
        let headers = EffectivePolicy {
            request_headers: Some(HeaderPolicy {
                set: vec![HeaderValue {
                    name: "x-forwarded-host".into(),
                    value: "%HOSTNAME% via %REQ(X-Missing)%!".into(),
                }],
                remove: vec!["x-debug".into()],
            }),
            ..EffectivePolicy::default()
        };
        let dispatcher = dispatcher(vec![route("app.example.com", "/", headers)]);

        let Dispatch::Forward(forward) = dispatcher.dispatch(&request("/x")) else {
            panic!("expected forward");
        };
        assert_eq!(forward.request_headers.set[0].value, "app.example.com via !");
        assert_eq!(forward.request_headers.remove, vec!["x-debug"]);
        assert!(forward.response_headers.set.is_empty());
    }

    #[test]
    fn test_unknown_host_not_found() {
        let dispatcher = dispatcher(vec![]);
        let mut req = request("/");
        req.host = "nobody.example.com".into();
        assert_eq!(dispatcher.dispatch(&req), Dispatch::NotFound);
    }
}
