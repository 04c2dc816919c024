//! Route resolution subsystem.
//!
//! # Data Flow
//! ```text
//! StoreSnapshot (immutable)
//!     → validator.rs (intrinsic checks per fragment)
//!     → validator.rs (FQDN arbitration between valid roots)
//!     → builder.rs (cycle detection, one tree per owning root)
//!     → conditions.rs (effective conditions, precedence)
//!     → policy.rs (route policy over virtual host policy)
//!     → emitter.rs (ordered route table per FQDN)
//!     → status.rs (per-fragment conditions)
//!     → Resolution
//! ```
//!
//! # Design Decisions
//! - Resolution is a pure function of the snapshot and the root namespace list
//! - Every error is local to the fragment that caused it; the pass never fails
//! - Fail closed: a fragment that is not Valid contributes no routes

pub mod builder;
pub mod conditions;
pub mod emitter;
pub mod error;
pub mod policy;
pub mod status;
pub mod validator;

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use serde::Serialize;

use crate::config::ResolverConfig;
use crate::model::ObjectKey;
use crate::observability::metrics;
use crate::store::StoreSnapshot;

pub use emitter::{RouteEntry, RouteTable, TlsBinding, UpstreamService};
pub use error::{ErrorClass, Reason, ResolveError, ResolveWarning};
pub use policy::EffectivePolicy;
pub use status::{FragmentState, FragmentStatus, StatusCondition};

use builder::GraphBuilder;
use emitter::RouteTableEmitter;
use status::StatusReporter;
use validator::{claim_fqdns, find_orphans, Validator};

/// Output of one resolution pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Resolution {
    /// Route tables keyed by normalized FQDN.
    pub tables: BTreeMap<String, RouteTable>,
    /// One status per fragment, in (namespace, name) order.
    pub statuses: Vec<FragmentStatus>,
}

impl Resolution {
    pub fn table(&self, fqdn: &str) -> Option<&RouteTable> {
        self.tables.get(&validator::normalize_fqdn(fqdn))
    }

    pub fn status(&self, key: &ObjectKey) -> Option<&FragmentStatus> {
        self.statuses
            .binary_search_by(|s| {
                (s.namespace.as_str(), s.name.as_str()).cmp(&(key.namespace.as_str(), key.name.as_str()))
            })
            .ok()
            .map(|i| &self.statuses[i])
    }

    /// Ids of every served route.
    pub fn route_ids(&self) -> BTreeSet<String> {
        self.tables
            .values()
            .flat_map(|t| t.routes.iter().map(|r| r.id.clone()))
            .collect()
    }

    pub fn count_by_state(&self, state: FragmentState) -> usize {
        self.statuses.iter().filter(|s| s.state == state).count()
    }
}

/// Resolves a snapshot into route tables and fragment statuses.
#[derive(Debug, Clone, Default)]
pub struct Resolver {
    root_namespaces: Vec<String>,
}

impl Resolver {
    pub fn new(config: &ResolverConfig) -> Self {
        Self {
            root_namespaces: config.root_namespaces.clone(),
        }
    }

    pub fn resolve(&self, snapshot: &StoreSnapshot) -> Resolution {
        let start = Instant::now();
        let mut reporter = StatusReporter::new();
        let mut invalid: BTreeSet<ObjectKey> = BTreeSet::new();

        // Intrinsic checks
        let validator = Validator::new(snapshot, &self.root_namespaces);
        for (key, fragment) in snapshot.fragments() {
            for err in validator.validate_fragment(fragment) {
                invalid.insert(key.clone());
                reporter.error(key, err);
            }
        }

        // FQDN ownership among otherwise valid roots
        let candidates = snapshot
            .fragments()
            .filter(|(key, fragment)| fragment.is_root() && !invalid.contains(*key))
            .map(|(_, fragment)| fragment);
        let (owners, losers) = claim_fqdns(candidates);
        for (key, err) in losers {
            invalid.insert(key.clone());
            reporter.error(&key, err);
        }

        // Cycles reachable from owning roots
        let graph = GraphBuilder::new(snapshot);
        let roots: Vec<ObjectKey> = owners.values().cloned().collect();
        for (key, path) in graph.find_cycles(&roots, &invalid) {
            invalid.insert(key.clone());
            reporter.error(&key, ResolveError::IncludeCycle { path });
        }

        // Trees and tables
        let emitter = RouteTableEmitter::new(snapshot);
        let mut referenced = BTreeSet::new();
        let mut tables = BTreeMap::new();
        for root in &roots {
            let build = graph.build(root, &invalid);
            referenced.extend(build.referenced);
            for (parent, target) in build.missing {
                reporter.warning(&parent, ResolveWarning::IncludeNotFound { target });
            }

            let Some(vhost) = snapshot.fragment(root).and_then(|f| f.virtual_host.as_ref()) else {
                continue;
            };
            match emitter.emit(&build.tree, vhost) {
                Ok(table) => {
                    tables.insert(table.fqdn.clone(), table);
                }
                Err(err) => {
                    tracing::warn!(root = %root, error = %err, "Route table emission failed");
                    reporter.error(root, err);
                }
            }
        }

        // Orphans
        for key in find_orphans(snapshot, &referenced) {
            if !reporter.has_errors(&key) {
                reporter.error(&key, ResolveError::Orphaned);
            }
        }

        let keys: Vec<&ObjectKey> = snapshot.fragments().map(|(key, _)| key).collect();
        let statuses = reporter.finish(keys);
        for status in statuses.iter().filter(|s| !s.is_valid()) {
            tracing::warn!(
                fragment = %status.key(),
                state = ?status.state,
                reasons = ?status.reasons(),
                "Fragment not served"
            );
        }

        let resolution = Resolution { tables, statuses };
        let elapsed = start.elapsed();
        tracing::info!(
            fragments = snapshot.fragment_count(),
            virtual_hosts = resolution.tables.len(),
            routes = resolution.route_ids().len(),
            invalid = resolution.count_by_state(FragmentState::Invalid),
            orphaned = resolution.count_by_state(FragmentState::Orphaned),
            elapsed_ms = elapsed.as_millis() as u64,
            "Resolution complete"
        );
        metrics::record_resolution(&resolution, elapsed);
        resolution
    }
}
