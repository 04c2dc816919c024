//! Route table emission.
//!
//! Assembles the ordered, per-virtual-host route table handed to the data
//! plane, including the SNI binding for TLS virtual hosts.

use serde::Serialize;

use crate::model::{Condition, HeaderPolicy, ObjectKey, VirtualHost};
use crate::resolver::builder::ResolutionTree;
use crate::resolver::conditions::{enumerate_leaves, partition_shadowed, rank, select};
use crate::resolver::error::ResolveError;
use crate::resolver::policy::{service_headers, EffectivePolicy, PolicyMerger};
use crate::resolver::validator::normalize_fqdn;
use crate::store::StoreSnapshot;

/// Resolved routing table for one virtual host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteTable {
    pub fqdn: String,
    /// Root fragment that owns the FQDN.
    pub root: ObjectKey,
    pub tls: Option<TlsBinding>,
    /// Routes in precedence order.
    pub routes: Vec<RouteEntry>,
}

/// Certificate binding. With `enforce_sni`, a TLS connection may only be
/// matched against the virtual host whose FQDN equals its SNI value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TlsBinding {
    pub secret: ObjectKey,
    pub enforce_sni: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteEntry {
    /// Stable identity: FQDN plus effective condition.
    pub id: String,
    pub condition: Condition,
    /// Fragment that declared the route.
    pub source: ObjectKey,
    pub services: Vec<UpstreamService>,
    #[serde(flatten)]
    pub policy: EffectivePolicy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpstreamService {
    pub namespace: String,
    pub name: String,
    pub port: u16,
    pub weight: u32,
    pub request_headers: Option<HeaderPolicy>,
    pub response_headers: Option<HeaderPolicy>,
}

impl RouteTable {
    /// Highest-precedence route matching `path`.
    pub fn select(&self, path: &str) -> Option<&RouteEntry> {
        select(self.routes.iter().map(|r| (&r.condition, r)), path)
    }
}

pub fn route_id(fqdn: &str, condition: &Condition) -> String {
    format!("{}|{}", fqdn, condition)
}

pub struct RouteTableEmitter<'a> {
    snapshot: &'a StoreSnapshot,
}

impl<'a> RouteTableEmitter<'a> {
    pub fn new(snapshot: &'a StoreSnapshot) -> Self {
        Self { snapshot }
    }

    /// Emit the table for a valid tree whose root declares `vhost`.
    pub fn emit(&self, tree: &ResolutionTree, vhost: &VirtualHost) -> Result<RouteTable, ResolveError> {
        let fqdn = normalize_fqdn(&vhost.fqdn);
        let merger = PolicyMerger::for_virtual_host(vhost)?;

        let mut leaves = enumerate_leaves(tree, self.snapshot);
        rank(&mut leaves);
        let (live, shadowed) = partition_shadowed(leaves);
        for leaf in &shadowed {
            tracing::debug!(
                fqdn = %fqdn,
                condition = %leaf.condition,
                source = %leaf.source,
                "Route shadowed by an earlier identical condition"
            );
        }

        let mut routes = Vec::with_capacity(live.len());
        for leaf in live {
            let policy = merger.merge(leaf.route)?;
            let mut services = Vec::with_capacity(leaf.route.services.len());
            for service in &leaf.route.services {
                let (request_headers, response_headers) = service_headers(service)?;
                services.push(UpstreamService {
                    namespace: leaf.source.namespace.clone(),
                    name: service.name.clone(),
                    port: service.port,
                    weight: service.weight,
                    request_headers,
                    response_headers,
                });
            }
            routes.push(RouteEntry {
                id: route_id(&fqdn, &leaf.condition),
                condition: leaf.condition,
                source: leaf.source,
                services,
                policy,
            });
        }

        let tls = vhost.tls.as_ref().map(|tls| TlsBinding {
            secret: ObjectKey::new(&tree.root.namespace, &tls.secret_name),
            enforce_sni: true,
        });

        Ok(RouteTable {
            fqdn,
            root: tree.root.clone(),
            tls,
            routes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Fragment, Include, RateLimitSpec, Route, ServiceRef, TlsSpec};
    use crate::resolver::builder::GraphBuilder;
    use std::collections::BTreeSet;

    fn service(name: &str) -> ServiceRef {
        ServiceRef {
            name: name.into(),
            port: 80,
            weight: 3,
            request_headers: None,
            response_headers: None,
        }
    }

    #[test]
    fn test_emit_ordered_table_with_tls() {
        let vhost = VirtualHost {
            fqdn: "Shop.Example.com".into(),
            tls: Some(TlsSpec { secret_name: "shop-cert".into() }),
            rate_limit: Some(RateLimitSpec { requests: 50, unit: "second".into() }),
            health_check: None,
            request_headers: None,
            response_headers: None,
        };
        let root = Fragment {
            namespace: "roots".into(),
            name: "shop".into(),
            created: 0,
            virtual_host: Some(vhost.clone()),
            routes: vec![Route {
                services: vec![service("web")],
                ..Route::default()
            }],
            includes: vec![Include {
                namespace: Some("cart".into()),
                name: "cart".into(),
                conditions: vec![Condition::Prefix("/cart".into())],
            }],
        };
        let cart = Fragment {
            namespace: "cart".into(),
            name: "cart".into(),
            created: 0,
            virtual_host: None,
            routes: vec![Route {
                services: vec![service("cart")],
                rate_limit: Some(RateLimitSpec { requests: 1, unit: "hour".into() }),
                ..Route::default()
            }],
            includes: vec![],
        };
        let snapshot = StoreSnapshot::new().with_fragment(root).with_fragment(cart);
        let build = GraphBuilder::new(&snapshot).build(&ObjectKey::new("roots", "shop"), &BTreeSet::new());

        let table = RouteTableEmitter::new(&snapshot).emit(&build.tree, &vhost).unwrap();
        assert_eq!(table.fqdn, "shop.example.com");
        assert_eq!(
            table.tls,
            Some(TlsBinding { secret: ObjectKey::new("roots", "shop-cert"), enforce_sni: true })
        );

        assert_eq!(table.routes.len(), 2);
        assert_eq!(table.routes[0].id, "shop.example.com|prefix:/cart");
        assert_eq!(table.routes[0].services[0].namespace, "cart");
        assert_eq!(table.routes[0].policy.rate_limit.unwrap().requests, 1);
        assert_eq!(table.routes[1].condition, Condition::root());
        assert_eq!(table.routes[1].policy.rate_limit.unwrap().requests, 50);

        assert_eq!(table.select("/cart/items").unwrap().source.name, "cart");
        assert_eq!(table.select("/cartography").unwrap().source.name, "shop");
    }
}
