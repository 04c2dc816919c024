//! Structural and policy validation.
//!
//! # Responsibilities
//! - Per-fragment checks: root namespace, FQDN, TLS secret, conditions,
//!   services, includes, policy values
//! - Duplicate FQDN arbitration between otherwise valid roots
//! - Orphan detection by set subtraction against referenced fragments
//!
//! # Design Decisions
//! - Returns every error, not just the first
//! - Checks are pure functions of the snapshot

use std::collections::{BTreeMap, BTreeSet};

use crate::model::{Condition, Fragment, Include, ObjectKey, Route, VirtualHost};
use crate::resolver::error::ResolveError;
use crate::resolver::policy::{validate_route_policies, validate_virtual_host_policies};
use crate::store::secret::validate_tls_secret;
use crate::store::StoreSnapshot;

pub struct Validator<'a> {
    snapshot: &'a StoreSnapshot,
    root_namespaces: &'a [String],
}

impl<'a> Validator<'a> {
    /// An empty `root_namespaces` allows roots in every namespace.
    pub fn new(snapshot: &'a StoreSnapshot, root_namespaces: &'a [String]) -> Self {
        Self {
            snapshot,
            root_namespaces,
        }
    }

    /// All errors intrinsic to one fragment.
    pub fn validate_fragment(&self, fragment: &Fragment) -> Vec<ResolveError> {
        let mut errors = Vec::new();

        if let Some(vhost) = &fragment.virtual_host {
            errors.extend(self.validate_virtual_host(fragment, vhost));
        }
        for (index, route) in fragment.routes.iter().enumerate() {
            errors.extend(self.validate_route(fragment, index, route));
        }
        errors.extend(self.validate_includes(fragment));

        errors
    }

    pub fn root_namespace_allowed(&self, namespace: &str) -> bool {
        self.root_namespaces.is_empty() || self.root_namespaces.iter().any(|ns| ns == namespace)
    }

    fn validate_virtual_host(&self, fragment: &Fragment, vhost: &VirtualHost) -> Vec<ResolveError> {
        let mut errors = Vec::new();

        if !self.root_namespace_allowed(&fragment.namespace) {
            errors.push(ResolveError::RootNamespace {
                namespace: fragment.namespace.clone(),
            });
        }

        if let Err(msg) = check_fqdn(&vhost.fqdn) {
            errors.push(ResolveError::VirtualHost(msg));
        }

        if let Some(tls) = &vhost.tls {
            if tls.secret_name.contains('/') {
                errors.push(ResolveError::Tls(format!(
                    "TLS secret {:?} must be in the fragment's namespace",
                    tls.secret_name
                )));
            } else {
                let key = ObjectKey::new(&fragment.namespace, &tls.secret_name);
                match self.snapshot.secret(&key) {
                    None => errors.push(ResolveError::Tls(format!("TLS secret {} not found", key))),
                    Some(secret) => {
                        if let Err(msg) = validate_tls_secret(secret) {
                            errors.push(ResolveError::Tls(format!(
                                "TLS secret {} is invalid: {}",
                                key, msg
                            )));
                        }
                    }
                }
            }
        }

        errors.extend(validate_virtual_host_policies(vhost));
        errors
    }

    fn validate_route(&self, fragment: &Fragment, index: usize, route: &Route) -> Vec<ResolveError> {
        let mut errors = Vec::new();

        for condition in &route.conditions {
            if let Err(msg) = condition.validate() {
                errors.push(ResolveError::Condition(format!("route {}: {}", index, msg)));
            }
        }

        if route.services.is_empty() {
            errors.push(ResolveError::Service(format!(
                "route {}: at least one service is required",
                index
            )));
        }
        for service in &route.services {
            let key = ObjectKey::new(&fragment.namespace, &service.name);
            match self.snapshot.service(&key) {
                None => errors.push(ResolveError::Service(format!(
                    "route {}: service {} not found",
                    index, key
                ))),
                Some(svc) if !svc.ports.contains(&service.port) => {
                    errors.push(ResolveError::Service(format!(
                        "route {}: service {} has no port {}",
                        index, key, service.port
                    )))
                }
                Some(_) => {}
            }
        }

        for err in validate_route_policies(route) {
            errors.push(match err {
                ResolveError::Policy(msg) => ResolveError::Policy(format!("route {}: {}", index, msg)),
                other => other,
            });
        }
        errors
    }

    fn validate_includes(&self, fragment: &Fragment) -> Vec<ResolveError> {
        let mut errors = Vec::new();
        let mut seen: BTreeMap<Condition, &Include> = BTreeMap::new();

        for include in &fragment.includes {
            for condition in &include.conditions {
                if let Err(msg) = condition.validate() {
                    errors.push(ResolveError::Condition(format!(
                        "include {}: {}",
                        include.name, msg
                    )));
                }
            }

            let target = include.target(&fragment.namespace);
            if self.snapshot.fragment(&target).is_some_and(Fragment::is_root) {
                errors.push(ResolveError::Include(format!(
                    "include {} refers to a root fragment",
                    target
                )));
            }

            let scope = Condition::root().concat_all(&include.conditions);
            if let Some(previous) = seen.get(&scope) {
                errors.push(ResolveError::Include(format!(
                    "includes {} and {} declare duplicate conditions {}",
                    previous.target(&fragment.namespace),
                    target,
                    scope
                )));
            } else {
                seen.insert(scope, include);
            }
        }
        errors
    }
}

/// Lowercase an FQDN and drop a trailing dot.
pub fn normalize_fqdn(fqdn: &str) -> String {
    fqdn.trim().trim_end_matches('.').to_ascii_lowercase()
}

fn check_fqdn(fqdn: &str) -> Result<(), String> {
    let normalized = normalize_fqdn(fqdn);
    if normalized.is_empty() {
        return Err("virtual host fqdn is empty".to_string());
    }
    if normalized.contains('*') {
        return Err(format!("wildcard fqdn {:?} is not supported", fqdn));
    }
    let labels_ok = normalized.split('.').all(|label| {
        !label.is_empty()
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    });
    if !labels_ok {
        return Err(format!("fqdn {:?} is not a valid DNS name", fqdn));
    }
    Ok(())
}

/// Arbitrate FQDN claims. Earliest `created`, then (namespace, name), wins.
///
/// Returns the winner per FQDN and a `DuplicateFqdn` error per loser.
pub fn claim_fqdns<'f, I>(roots: I) -> (BTreeMap<String, ObjectKey>, BTreeMap<ObjectKey, ResolveError>)
where
    I: IntoIterator<Item = &'f Fragment>,
{
    let mut claims: BTreeMap<String, Vec<&Fragment>> = BTreeMap::new();
    for fragment in roots {
        if let Some(vhost) = &fragment.virtual_host {
            claims
                .entry(normalize_fqdn(&vhost.fqdn))
                .or_default()
                .push(fragment);
        }
    }

    let mut winners = BTreeMap::new();
    let mut losers = BTreeMap::new();
    for (fqdn, mut claimants) in claims {
        claimants.sort_by(|a, b| {
            a.created
                .cmp(&b.created)
                .then_with(|| a.key().cmp(&b.key()))
        });
        let owner = claimants[0].key();
        for loser in &claimants[1..] {
            tracing::warn!(fqdn = %fqdn, owner = %owner, rejected = %loser.key(), "Duplicate FQDN claim");
            losers.insert(
                loser.key(),
                ResolveError::DuplicateFqdn {
                    fqdn: fqdn.clone(),
                    owner: owner.clone(),
                },
            );
        }
        winners.insert(fqdn, owner);
    }
    (winners, losers)
}

/// Non-root fragments that no valid tree references.
pub fn find_orphans(snapshot: &StoreSnapshot, referenced: &BTreeSet<ObjectKey>) -> Vec<ObjectKey> {
    snapshot
        .fragments()
        .filter(|(key, fragment)| !fragment.is_root() && !referenced.contains(*key))
        .map(|(key, _)| key.clone())
        .collect()
}
