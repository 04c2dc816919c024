//! Inclusion graph construction.
//!
//! # Responsibilities
//! - Detect include cycles in one pass over the include graph (strongly
//!   connected components)
//! - Build one resolution tree per valid root, one node per
//!   (fragment, inherited condition prefix)
//! - Record unresolved include targets and every fragment referenced
//!   from a valid root
//!
//! # Design Decisions
//! - Fragments are addressed by key in the snapshot; edges are followed by
//!   lookup, so cyclic input never produces cyclic data
//! - Invalid fragments are recorded as referenced but never expanded; their
//!   descendants are only reachable through other paths

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::model::{Condition, Fragment, ObjectKey};
use crate::store::StoreSnapshot;

/// One occurrence of a fragment in a resolution tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    pub fragment: ObjectKey,
    /// Accumulated include condition from the root down to this node.
    pub prefix: Condition,
    pub depth: usize,
    pub parent: Option<usize>,
}

/// Nodes of one root's tree in depth-first preorder; index 0 is the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionTree {
    pub root: ObjectKey,
    pub nodes: Vec<TreeNode>,
}

/// Result of building one tree.
#[derive(Debug, Clone)]
pub struct TreeBuild {
    pub tree: ResolutionTree,
    /// Every fragment reached from the root, including invalid ones.
    pub referenced: BTreeSet<ObjectKey>,
    /// (parent, missing target) pairs.
    pub missing: BTreeSet<(ObjectKey, ObjectKey)>,
}

/// Bookkeeping for one strongly-connected-components pass.
#[derive(Default)]
struct CycleSearch {
    next: usize,
    index: BTreeMap<ObjectKey, usize>,
    low: BTreeMap<ObjectKey, usize>,
    stack: Vec<ObjectKey>,
    on_stack: BTreeSet<ObjectKey>,
    cycles: BTreeMap<ObjectKey, String>,
}

impl CycleSearch {
    fn lower(&mut self, key: &ObjectKey, value: usize) {
        if let Some(low) = self.low.get_mut(key) {
            *low = (*low).min(value);
        }
    }
}

pub struct GraphBuilder<'a> {
    snapshot: &'a StoreSnapshot,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(snapshot: &'a StoreSnapshot) -> Self {
        Self { snapshot }
    }

    /// Find every fragment on an include cycle reachable from `roots`.
    ///
    /// Fragments in `blocked` are not traversed. Each fragment is visited
    /// once (Tarjan's strongly connected components); a fragment is on a
    /// cycle when its component has more than one member or it includes
    /// itself. The value renders a shortest cycle through the fragment.
    pub fn find_cycles(
        &self,
        roots: &[ObjectKey],
        blocked: &BTreeSet<ObjectKey>,
    ) -> BTreeMap<ObjectKey, String> {
        let mut search = CycleSearch::default();
        for root in roots {
            if !search.index.contains_key(root) {
                self.connect(root, blocked, &mut search);
            }
        }
        search.cycles
    }

    /// Existing, unblocked include targets of `fragment`, in declaration order.
    fn successors(&self, fragment: &Fragment, blocked: &BTreeSet<ObjectKey>) -> Vec<ObjectKey> {
        fragment
            .includes
            .iter()
            .map(|include| include.target(&fragment.namespace))
            .filter(|target| !blocked.contains(target) && self.snapshot.fragment(target).is_some())
            .collect()
    }

    fn connect(&self, key: &ObjectKey, blocked: &BTreeSet<ObjectKey>, search: &mut CycleSearch) {
        let Some(fragment) = self.snapshot.fragment(key) else {
            return;
        };

        let index = search.next;
        search.next += 1;
        search.index.insert(key.clone(), index);
        search.low.insert(key.clone(), index);
        search.stack.push(key.clone());
        search.on_stack.insert(key.clone());

        let mut includes_itself = false;
        for target in self.successors(fragment, blocked) {
            includes_itself |= target == *key;
            match search.index.get(&target).copied() {
                None => {
                    self.connect(&target, blocked, search);
                    let reached = search.low.get(&target).copied().unwrap_or(index);
                    search.lower(key, reached);
                }
                Some(target_index) if search.on_stack.contains(&target) => {
                    search.lower(key, target_index);
                }
                Some(_) => {}
            }
        }

        if search.low.get(key) != Some(&index) {
            return;
        }

        let mut members = BTreeSet::new();
        while let Some(member) = search.stack.pop() {
            search.on_stack.remove(&member);
            let done = member == *key;
            members.insert(member);
            if done {
                break;
            }
        }
        if members.len() > 1 || includes_itself {
            for member in &members {
                let rendered = self.shortest_cycle(member, &members, blocked);
                tracing::debug!(fragment = %member, cycle = %rendered, "Include cycle detected");
                search.cycles.insert(member.clone(), rendered);
            }
        }
    }

    /// Breadth-first search from `start` back to itself within `members`.
    fn shortest_cycle(
        &self,
        start: &ObjectKey,
        members: &BTreeSet<ObjectKey>,
        blocked: &BTreeSet<ObjectKey>,
    ) -> String {
        let mut previous: BTreeMap<ObjectKey, ObjectKey> = BTreeMap::new();
        let mut queue = VecDeque::from([start.clone()]);

        while let Some(current) = queue.pop_front() {
            let Some(fragment) = self.snapshot.fragment(&current) else {
                continue;
            };
            for target in self.successors(fragment, blocked) {
                if !members.contains(&target) {
                    continue;
                }
                if target == *start {
                    let mut chain = vec![current.clone()];
                    while let Some(prev) = chain.last().and_then(|k| previous.get(k)) {
                        chain.push(prev.clone());
                    }
                    chain.reverse();
                    chain.push(start.clone());
                    return chain.iter().map(ObjectKey::to_string).collect::<Vec<_>>().join(" -> ");
                }
                if !previous.contains_key(&target) {
                    previous.insert(target.clone(), current.clone());
                    queue.push_back(target);
                }
            }
        }
        format!("{} -> {}", start, start)
    }

    /// Build the resolution tree rooted at `root`, never expanding `invalid` fragments.
    pub fn build(&self, root: &ObjectKey, invalid: &BTreeSet<ObjectKey>) -> TreeBuild {
        let mut out = TreeBuild {
            tree: ResolutionTree {
                root: root.clone(),
                nodes: Vec::new(),
            },
            referenced: BTreeSet::new(),
            missing: BTreeSet::new(),
        };
        let mut path = Vec::new();
        self.expand(root, Condition::root(), None, 0, &mut path, invalid, &mut out);
        out
    }

    #[allow(clippy::too_many_arguments)]
    fn expand(
        &self,
        key: &ObjectKey,
        prefix: Condition,
        parent: Option<usize>,
        depth: usize,
        path: &mut Vec<ObjectKey>,
        invalid: &BTreeSet<ObjectKey>,
        out: &mut TreeBuild,
    ) {
        out.referenced.insert(key.clone());
        if invalid.contains(key) || path.contains(key) {
            return;
        }
        let Some(fragment) = self.snapshot.fragment(key) else {
            return;
        };

        let index = out.tree.nodes.len();
        tracing::debug!(
            root = %out.tree.root,
            fragment = %key,
            prefix = %prefix,
            depth,
            "Tree node"
        );
        out.tree.nodes.push(TreeNode {
            fragment: key.clone(),
            prefix: prefix.clone(),
            depth,
            parent,
        });

        path.push(key.clone());
        for include in &fragment.includes {
            let target = include.target(&fragment.namespace);
            if self.snapshot.fragment(&target).is_none() {
                out.missing.insert((key.clone(), target));
                continue;
            }
            let child_prefix = prefix.concat_all(&include.conditions);
            self.expand(&target, child_prefix, Some(index), depth + 1, path, invalid, out);
        }
        path.pop();
    }
}
