//! Condition resolution and precedence.
//!
//! # Responsibilities
//! - Enumerate the leaf routes of a resolution tree in stable traversal order
//! - Compute each leaf's effective condition (include prefixes, then the
//!   route's own conditions)
//! - Rank leaves by match precedence
//!
//! # Precedence
//! 1. `Exact` on the full path
//! 2. `Prefix`, longest matched prefix first
//! 3. Equal kind and length: earlier in traversal order (include declaration
//!    order, depth-first, a fragment's own routes before its includes)

use std::cmp::Reverse;
use std::collections::BTreeSet;

use crate::model::{Condition, ObjectKey, Route};
use crate::resolver::builder::ResolutionTree;
use crate::store::StoreSnapshot;

/// A declared route placed in a tree with its effective condition.
#[derive(Debug, Clone)]
pub struct ResolvedLeaf<'s> {
    /// Position in stable traversal order.
    pub order: usize,
    pub condition: Condition,
    /// Fragment that declared the route.
    pub source: ObjectKey,
    pub route: &'s Route,
}

/// Effective condition of a route placed under `prefix`.
pub fn effective_condition(prefix: &Condition, route: &Route) -> Condition {
    prefix.concat_all(&route.conditions)
}

/// Leaves of `tree` in traversal order.
///
/// Tree nodes are stored in preorder, so walking them and emitting each
/// node's routes yields routes before the routes of included fragments.
pub fn enumerate_leaves<'s>(tree: &ResolutionTree, snapshot: &'s StoreSnapshot) -> Vec<ResolvedLeaf<'s>> {
    let mut leaves = Vec::new();
    for node in &tree.nodes {
        let Some(fragment) = snapshot.fragment(&node.fragment) else {
            continue;
        };
        for route in &fragment.routes {
            leaves.push(ResolvedLeaf {
                order: leaves.len(),
                condition: effective_condition(&node.prefix, route),
                source: node.fragment.clone(),
                route,
            });
        }
    }
    leaves
}

/// Sort leaves into precedence order. Stable with respect to traversal order.
pub fn rank(leaves: &mut [ResolvedLeaf<'_>]) {
    leaves.sort_by_key(|leaf| (Reverse(leaf.condition.specificity()), leaf.order));
}

/// Split ranked leaves into those that can match and those shadowed by an
/// earlier leaf with the identical effective condition.
pub fn partition_shadowed<'s>(leaves: Vec<ResolvedLeaf<'s>>) -> (Vec<ResolvedLeaf<'s>>, Vec<ResolvedLeaf<'s>>) {
    let mut seen: BTreeSet<Condition> = BTreeSet::new();
    let mut live: Vec<ResolvedLeaf<'s>> = Vec::with_capacity(leaves.len());
    let mut shadowed = Vec::new();
    for leaf in leaves {
        if seen.insert(leaf.condition.clone()) {
            live.push(leaf);
        } else {
            shadowed.push(leaf);
        }
    }
    (live, shadowed)
}

/// Pick the highest-precedence candidate matching `path`.
///
/// Ties on specificity go to the earliest candidate, so callers pass
/// candidates in traversal (or already ranked) order.
pub fn select<'c, T>(
    candidates: impl IntoIterator<Item = (&'c Condition, T)>,
    path: &str,
) -> Option<T> {
    let mut best: Option<(&Condition, T)> = None;
    for (condition, item) in candidates {
        if !condition.matches(path) {
            continue;
        }
        let better = match &best {
            Some((current, _)) => condition.specificity() > current.specificity(),
            None => true,
        };
        if better {
            best = Some((condition, item));
        }
    }
    best.map(|(_, item)| item)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Fragment, Include, ServiceRef, VirtualHost};
    use crate::resolver::builder::GraphBuilder;

    fn prefix(p: &str) -> Condition {
        Condition::Prefix(p.into())
    }

    fn exact(p: &str) -> Condition {
        Condition::Exact(p.into())
    }

    fn route(conditions: Vec<Condition>, service: &str) -> Route {
        Route {
            conditions,
            services: vec![ServiceRef {
                name: service.into(),
                port: 80,
                weight: 1,
                request_headers: None,
                response_headers: None,
            }],
            ..Route::default()
        }
    }

    fn include(name: &str, condition: Condition) -> Include {
        Include {
            namespace: None,
            name: name.into(),
            conditions: vec![condition],
        }
    }

    fn child(name: &str, routes: Vec<Route>) -> Fragment {
        Fragment {
            namespace: "ns".into(),
            name: name.into(),
            created: 0,
            virtual_host: None,
            routes,
            includes: vec![],
        }
    }

    fn snapshot() -> StoreSnapshot {
        let root = Fragment {
            namespace: "ns".into(),
            name: "root".into(),
            created: 0,
            virtual_host: Some(VirtualHost {
                fqdn: "r.example.com".into(),
                tls: None,
                rate_limit: None,
                health_check: None,
                request_headers: None,
                response_headers: None,
            }),
            routes: vec![],
            includes: vec![
                include("a", prefix("/app")),
                include("b", exact("/app/admin")),
                include("b", prefix("/admin")),
                include("a", prefix("/")),
            ],
        };
        StoreSnapshot::new()
            .with_fragment(root)
            .with_fragment(child("a", vec![route(vec![], "a")]))
            .with_fragment(child("b", vec![route(vec![prefix("/")], "b")]))
    }

    fn resolved(snapshot: &StoreSnapshot) -> Vec<ResolvedLeaf<'_>> {
        let build = GraphBuilder::new(snapshot).build(&ObjectKey::new("ns", "root"), &BTreeSet::new());
        let mut leaves = enumerate_leaves(&build.tree, snapshot);
        rank(&mut leaves);
        leaves
    }

    #[test]
    fn test_effective_conditions() {
        let snapshot = snapshot();
        let leaves = resolved(&snapshot);
        let conditions: Vec<_> = leaves.iter().map(|l| l.condition.clone()).collect();
        assert_eq!(
            conditions,
            vec![exact("/app/admin"), prefix("/admin"), prefix("/app"), prefix("/")]
        );
    }

    #[test]
    fn test_precedence_selection() {
        let snapshot = snapshot();
        let leaves = resolved(&snapshot);
        let pick = |path: &str| {
            select(leaves.iter().map(|l| (&l.condition, l.source.name.as_str())), path)
        };

        assert_eq!(pick("/app/admin"), Some("b"));
        assert_eq!(pick("/app/adminfoo"), Some("a"));
        assert_eq!(pick("/admin/app"), Some("b"));
        assert_eq!(pick("/admin-app"), Some("a"));
        assert_eq!(pick("/app"), Some("a"));
    }

    #[test]
    fn test_tie_goes_to_traversal_order() {
        let first = prefix("/same");
        let second = prefix("/same");
        let candidates = vec![(&first, 1), (&second, 2)];
        assert_eq!(select(candidates, "/same/x"), Some(1));
    }

    #[test]
    fn test_shadowed_duplicates() {
        let r = Route::default();
        let leaves = vec![
            ResolvedLeaf { order: 0, condition: prefix("/x"), source: ObjectKey::new("ns", "a"), route: &r },
            ResolvedLeaf { order: 1, condition: prefix("/x"), source: ObjectKey::new("ns", "b"), route: &r },
        ];
        let (live, shadowed) = partition_shadowed(leaves);
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].source.name, "a");
        assert_eq!(shadowed[0].source.name, "b");
    }

    #[test]
    fn test_shadowing_scales_with_leaf_count() {
        let r = Route::default();
        let leaves: Vec<_> = (0..40_000)
            .map(|i| ResolvedLeaf {
                order: i,
                condition: prefix(&format!("/p{}", i % 20_000)),
                source: ObjectKey::new("ns", "a"),
                route: &r,
            })
            .collect();
        let (live, shadowed) = partition_shadowed(leaves);
        assert_eq!(live.len(), 20_000);
        assert_eq!(shadowed.len(), 20_000);
        assert!(shadowed.iter().all(|leaf| leaf.order >= 20_000));
    }
}
