//! Forward/reverse reference adjacency over entity ids.
//!
//! Tracks "A depends on B" edges so the packed cache can find every entity
//! whose encoded reference index goes stale when its target changes slot.
//! Both directions are kept in lockstep and updated incrementally by
//! symmetric difference rather than rebuilt per pack.
//!
//! ## Architecture
//!
//! ```text
//!   forward: id -> ids it references      reverse: id -> ids referencing it
//!   ┌──────┬────────────┐                 ┌──────┬────────────┐
//!   │ "e0" │ { "e1" }   │                 │ "e1" │ { "e0" }   │
//!   │ "e2" │ { "e0",    │                 │ "e0" │ { "e2" }   │
//!   │      │   "e1" }   │                 │ "e1" │ { "e0",    │
//!   └──────┴────────────┘                 │      │   "e2" }   │
//!                                         └──────┴────────────┘
//! ```
//!
//! Cycles are permitted (A may reference B while B references A, and an
//! entity may reference itself); the structure is plain adjacency, not a
//! tree.
//!
//! `debug_validate_invariants()` is available in debug/test builds.
use rustc_hash::{FxHashMap, FxHashSet};

use crate::ds::id_gen::EntityId;

#[derive(Debug, Default)]
/// Incrementally maintained forward/reverse adjacency sets.
pub struct RefGraph {
    forward: FxHashMap<EntityId, FxHashSet<EntityId>>,
    reverse: FxHashMap<EntityId, FxHashSet<EntityId>>,
}

impl RefGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if no edges are tracked.
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty() && self.reverse.is_empty()
    }

    /// Returns the total number of tracked edges.
    pub fn edge_count(&self) -> usize {
        self.forward.values().map(FxHashSet::len).sum()
    }

    /// Returns the set of ids that `id` currently references.
    #[inline]
    pub fn references(&self, id: &EntityId) -> Option<&FxHashSet<EntityId>> {
        self.forward.get(id)
    }

    /// Returns the set of ids that currently reference `id`.
    #[inline]
    pub fn dependents(&self, id: &EntityId) -> Option<&FxHashSet<EntityId>> {
        self.reverse.get(id)
    }

    /// Replaces `id`'s outgoing reference set.
    ///
    /// Back-links are adjusted by symmetric difference: only edges that
    /// actually changed are touched. Recording an identical set is a no-op;
    /// recording an empty set drops the entry entirely.
    pub fn record(&mut self, id: &EntityId, new_refs: FxHashSet<EntityId>) {
        let old_refs = self.forward.get(id).cloned().unwrap_or_default();
        if old_refs == new_refs {
            return;
        }

        for stale in old_refs.difference(&new_refs) {
            let emptied = self
                .reverse
                .get_mut(stale)
                .is_some_and(|back| {
                    back.remove(id);
                    back.is_empty()
                });
            if emptied {
                self.reverse.remove(stale);
            }
        }
        for fresh in new_refs.difference(&old_refs) {
            self.reverse
                .entry(fresh.clone())
                .or_default()
                .insert(id.clone());
        }

        if new_refs.is_empty() {
            self.forward.remove(id);
        } else {
            self.forward.insert(id.clone(), new_refs);
        }
    }

    /// Drops every edge touching `id`, in both directions.
    pub fn sever(&mut self, id: &EntityId) {
        if let Some(refs) = self.forward.remove(id) {
            for target in refs {
                let emptied = self
                    .reverse
                    .get_mut(&target)
                    .is_some_and(|back| {
                        back.remove(id);
                        back.is_empty()
                    });
                if emptied {
                    self.reverse.remove(&target);
                }
            }
        }
        if let Some(deps) = self.reverse.remove(id) {
            for dependent in deps {
                let emptied = self
                    .forward
                    .get_mut(&dependent)
                    .is_some_and(|out| {
                        out.remove(id);
                        out.is_empty()
                    });
                if emptied {
                    self.forward.remove(&dependent);
                }
            }
        }
    }

    /// Drops all edges.
    pub fn clear(&mut self) {
        self.forward.clear();
        self.reverse.clear();
    }

    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self) {
        for (id, refs) in &self.forward {
            assert!(!refs.is_empty(), "empty forward set retained for {id}");
            for target in refs {
                assert!(
                    self.reverse
                        .get(target)
                        .is_some_and(|back| back.contains(id)),
                    "forward edge {id} -> {target} has no back-link"
                );
            }
        }
        for (id, deps) in &self.reverse {
            assert!(!deps.is_empty(), "empty reverse set retained for {id}");
            for dependent in deps {
                assert!(
                    self.forward
                        .get(dependent)
                        .is_some_and(|out| out.contains(id)),
                    "reverse edge {id} <- {dependent} has no forward edge"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: &str) -> EntityId {
        EntityId::from(raw)
    }

    fn set(raw: &[&str]) -> FxHashSet<EntityId> {
        raw.iter().map(|s| id(s)).collect()
    }

    #[test]
    fn record_creates_both_directions() {
        let mut graph = RefGraph::new();
        graph.record(&id("a"), set(&["b", "c"]));

        assert_eq!(graph.references(&id("a")), Some(&set(&["b", "c"])));
        assert_eq!(graph.dependents(&id("b")), Some(&set(&["a"])));
        assert_eq!(graph.dependents(&id("c")), Some(&set(&["a"])));
        assert_eq!(graph.edge_count(), 2);
        graph.debug_validate_invariants();
    }

    #[test]
    fn record_applies_symmetric_difference() {
        let mut graph = RefGraph::new();
        graph.record(&id("a"), set(&["b", "c"]));
        graph.record(&id("a"), set(&["c", "d"]));

        assert_eq!(graph.dependents(&id("b")), None);
        assert_eq!(graph.dependents(&id("c")), Some(&set(&["a"])));
        assert_eq!(graph.dependents(&id("d")), Some(&set(&["a"])));
        graph.debug_validate_invariants();
    }

    #[test]
    fn recording_empty_set_drops_the_entry() {
        let mut graph = RefGraph::new();
        graph.record(&id("a"), set(&["b"]));
        graph.record(&id("a"), set(&[]));

        assert!(graph.is_empty());
        assert_eq!(graph.references(&id("a")), None);
        assert_eq!(graph.dependents(&id("b")), None);
        graph.debug_validate_invariants();
    }

    #[test]
    fn sever_removes_both_directions() {
        let mut graph = RefGraph::new();
        graph.record(&id("a"), set(&["b"]));
        graph.record(&id("c"), set(&["a"]));

        graph.sever(&id("a"));

        assert!(graph.is_empty());
        graph.debug_validate_invariants();
    }

    #[test]
    fn cycles_are_tracked_and_severed() {
        let mut graph = RefGraph::new();
        graph.record(&id("a"), set(&["b"]));
        graph.record(&id("b"), set(&["a"]));
        graph.record(&id("s"), set(&["s"]));

        assert_eq!(graph.dependents(&id("a")), Some(&set(&["b"])));
        assert_eq!(graph.dependents(&id("s")), Some(&set(&["s"])));
        graph.debug_validate_invariants();

        graph.sever(&id("s"));
        assert_eq!(graph.references(&id("s")), None);
        graph.sever(&id("a"));
        assert_eq!(graph.references(&id("b")), None);
        assert!(graph.is_empty());
        graph.debug_validate_invariants();
    }
}
