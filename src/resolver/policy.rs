//! Policy merging.
//!
//! # Responsibilities
//! - Validate rate-limit, health-check and header policy values
//! - Normalize header policies (ordered set with last-wins per name, deduped removes)
//! - Merge virtual-host policy down to routes with full override semantics
//!
//! # Design Decisions
//! - A route-level policy replaces the virtual-host policy of the same kind;
//!   it is never merged field by field
//! - Header value tokens are checked for syntax only and passed through verbatim

use axum::http::HeaderName;
use serde::Serialize;

use crate::model::{
    HeaderPolicy, HeaderScope, HeaderValue, HealthCheckPolicy, RateLimitPolicy, RateLimitSpec,
    RateLimitUnit, Route, ServiceRef, VirtualHost,
};
use crate::resolver::error::ResolveError;
use crate::security::headers::parse_tokens;

/// Policies in effect for one emitted route.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EffectivePolicy {
    pub rate_limit: Option<RateLimitPolicy>,
    pub health_check: Option<HealthCheckPolicy>,
    pub request_headers: Option<HeaderPolicy>,
    pub response_headers: Option<HeaderPolicy>,
}

pub fn resolve_rate_limit(spec: &RateLimitSpec) -> Result<RateLimitPolicy, ResolveError> {
    let unit = RateLimitUnit::parse(&spec.unit).ok_or_else(|| {
        ResolveError::Policy(format!(
            "rate limit unit {:?} is not one of second, minute, hour",
            spec.unit
        ))
    })?;
    if spec.requests == 0 {
        return Err(ResolveError::Policy(
            "rate limit requests must be greater than zero".to_string(),
        ));
    }
    Ok(RateLimitPolicy {
        requests: spec.requests,
        unit,
    })
}

pub fn check_health_check(policy: &HealthCheckPolicy) -> Result<(), ResolveError> {
    if policy.path.is_empty() {
        return Err(ResolveError::Policy("health check path is empty".to_string()));
    }
    if !policy.path.starts_with('/') {
        return Err(ResolveError::Policy(format!(
            "health check path {:?} must start with '/'",
            policy.path
        )));
    }
    if policy.unhealthy_threshold == 0 || policy.healthy_threshold == 0 {
        return Err(ResolveError::Policy(
            "health check thresholds must be greater than zero".to_string(),
        ));
    }
    if policy.interval_secs == 0 || policy.timeout_secs == 0 {
        return Err(ResolveError::Policy(
            "health check interval and timeout must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

/// Validate and normalize a header policy.
///
/// `set` keeps first-declaration position but the value of the last entry for
/// each (case-insensitive) name; `remove` keeps the first occurrence of each name.
pub fn normalize_headers(
    policy: &HeaderPolicy,
    scope: HeaderScope,
) -> Result<HeaderPolicy, ResolveError> {
    let mut set: Vec<HeaderValue> = Vec::with_capacity(policy.set.len());
    for header in &policy.set {
        let name = check_header_name(&header.name, scope)?;
        if scope == HeaderScope::Response && name == "host" {
            return Err(ResolveError::Policy(
                "rewriting the Host header is not supported on response headers".to_string(),
            ));
        }
        parse_tokens(&header.value).map_err(|e| {
            ResolveError::Policy(format!(
                "{} header {:?} value {:?}: {}",
                scope, header.name, header.value, e
            ))
        })?;

        match set.iter_mut().find(|h| h.name.eq_ignore_ascii_case(&name)) {
            Some(existing) => existing.value = header.value.clone(),
            None => set.push(HeaderValue {
                name,
                value: header.value.clone(),
            }),
        }
    }

    let mut remove: Vec<String> = Vec::with_capacity(policy.remove.len());
    for header in &policy.remove {
        let name = check_header_name(header, scope)?;
        if !remove.contains(&name) {
            remove.push(name);
        }
    }

    Ok(HeaderPolicy { set, remove })
}

fn check_header_name(name: &str, scope: HeaderScope) -> Result<String, ResolveError> {
    HeaderName::from_bytes(name.as_bytes())
        .map(|n| n.as_str().to_string())
        .map_err(|_| ResolveError::Policy(format!("invalid {} header name {:?}", scope, name)))
}

fn normalize_optional(
    policy: Option<&HeaderPolicy>,
    scope: HeaderScope,
) -> Result<Option<HeaderPolicy>, ResolveError> {
    policy.map(|p| normalize_headers(p, scope)).transpose()
}

/// Every policy error on a virtual host.
pub fn validate_virtual_host_policies(vhost: &VirtualHost) -> Vec<ResolveError> {
    let mut errors = Vec::new();
    if let Some(spec) = &vhost.rate_limit {
        errors.extend(resolve_rate_limit(spec).err());
    }
    if let Some(hc) = &vhost.health_check {
        errors.extend(check_health_check(hc).err());
    }
    errors.extend(normalize_optional(vhost.request_headers.as_ref(), HeaderScope::Request).err());
    errors.extend(normalize_optional(vhost.response_headers.as_ref(), HeaderScope::Response).err());
    errors
}

/// Every policy error on a route and its services.
pub fn validate_route_policies(route: &Route) -> Vec<ResolveError> {
    let mut errors = Vec::new();
    if let Some(spec) = &route.rate_limit {
        errors.extend(resolve_rate_limit(spec).err());
    }
    if let Some(hc) = &route.health_check {
        errors.extend(check_health_check(hc).err());
    }
    errors.extend(normalize_optional(route.request_headers.as_ref(), HeaderScope::Request).err());
    errors.extend(normalize_optional(route.response_headers.as_ref(), HeaderScope::Response).err());
    for service in &route.services {
        errors.extend(service_headers(service).err());
    }
    errors
}

/// Normalized (request, response) header policies for one service.
pub fn service_headers(
    service: &ServiceRef,
) -> Result<(Option<HeaderPolicy>, Option<HeaderPolicy>), ResolveError> {
    Ok((
        normalize_optional(service.request_headers.as_ref(), HeaderScope::Request)?,
        normalize_optional(service.response_headers.as_ref(), HeaderScope::Response)?,
    ))
}

/// Merges virtual-host policy down onto the routes of one tree.
#[derive(Debug, Clone, Default)]
pub struct PolicyMerger {
    defaults: EffectivePolicy,
}

impl PolicyMerger {
    pub fn for_virtual_host(vhost: &VirtualHost) -> Result<Self, ResolveError> {
        Ok(Self {
            defaults: EffectivePolicy {
                rate_limit: vhost.rate_limit.as_ref().map(resolve_rate_limit).transpose()?,
                health_check: vhost.health_check.clone(),
                request_headers: normalize_optional(
                    vhost.request_headers.as_ref(),
                    HeaderScope::Request,
                )?,
                response_headers: normalize_optional(
                    vhost.response_headers.as_ref(),
                    HeaderScope::Response,
                )?,
            },
        })
    }

    /// Route-level policy overrides the virtual-host policy of the same kind.
    pub fn merge(&self, route: &Route) -> Result<EffectivePolicy, ResolveError> {
        let rate_limit = match &route.rate_limit {
            Some(spec) => Some(resolve_rate_limit(spec)?),
            None => self.defaults.rate_limit,
        };
        let health_check = match &route.health_check {
            Some(hc) => Some(hc.clone()),
            None => self.defaults.health_check.clone(),
        };
        let request_headers = match &route.request_headers {
            Some(p) => Some(normalize_headers(p, HeaderScope::Request)?),
            None => self.defaults.request_headers.clone(),
        };
        let response_headers = match &route.response_headers {
            Some(p) => Some(normalize_headers(p, HeaderScope::Response)?),
            None => self.defaults.response_headers.clone(),
        };

        Ok(EffectivePolicy {
            rate_limit,
            health_check,
            request_headers,
            response_headers,
        })
    }
}
