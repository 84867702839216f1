//! Bidirectional id ↔ slot bijection.
//!
//! Used by the packed cache to answer "which slot does this entity occupy"
//! and "which entity occupies this slot" in O(1). Implemented as two
//! `FxHashMap`s kept in lockstep.
//!
//! ## Architecture
//!
//! ```text
//!   forward: FxHashMap<EntityId, usize>     reverse: FxHashMap<usize, EntityId>
//!   ┌─────────┬────────┐                    ┌────────┬─────────┐
//!   │  "e0"   │   0    │                    │   0    │  "e0"   │
//!   │  "e1"   │   1    │                    │   1    │  "e1"   │
//!   │  "e2"   │   2    │                    │   2    │  "e2"   │
//!   └─────────┴────────┘                    └────────┴─────────┘
//! ```
//!
//! ## Behavior
//! - `insert(id, slot)`: binds the pair, evicting any stale occupant of the
//!   slot and any stale slot of the id, so the structure remains a bijection
//!   under arbitrary reassignment sequences.
//! - `remove_id(id)`: unbinds both directions.
//!
//! ## Performance
//! - `slot_of` / `id_at` / `insert` / `remove_id`: O(1) average
//!
//! `debug_validate_invariants()` is available in debug/test builds.
use rustc_hash::FxHashMap;

use crate::ds::id_gen::EntityId;

#[derive(Debug, Default, Clone)]
/// Two-way associative map between entity ids and dense slot indices.
pub struct IndexBiMap {
    forward: FxHashMap<EntityId, usize>,
    reverse: FxHashMap<usize, EntityId>,
}

impl IndexBiMap {
    /// Creates an empty bijection.
    pub fn new() -> Self {
        Self {
            forward: FxHashMap::default(),
            reverse: FxHashMap::default(),
        }
    }

    /// Returns the number of bound pairs.
    #[inline]
    pub fn len(&self) -> usize {
        self.forward.len()
    }

    /// Returns `true` if no pairs are bound.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// Returns the slot bound to `id`, if any.
    #[inline]
    pub fn slot_of(&self, id: &EntityId) -> Option<usize> {
        self.forward.get(id).copied()
    }

    /// Returns the id occupying `slot`, if any.
    #[inline]
    pub fn id_at(&self, slot: usize) -> Option<&EntityId> {
        self.reverse.get(&slot)
    }

    /// Returns `true` if `id` is bound to some slot.
    #[inline]
    pub fn contains_id(&self, id: &EntityId) -> bool {
        self.forward.contains_key(id)
    }

    /// Binds `id` to `slot`.
    ///
    /// If `id` was bound to another slot, that binding is dropped. If `slot`
    /// held another id, that occupant is dropped. Both evictions keep the
    /// two maps exact inverses.
    pub fn insert(&mut self, id: EntityId, slot: usize) {
        if let Some(prev_slot) = self.forward.get(&id).copied()
            && prev_slot != slot
            && self.reverse.get(&prev_slot).is_some_and(|occupant| *occupant == id)
        {
            self.reverse.remove(&prev_slot);
        }
        if let Some(prev_id) = self.reverse.get(&slot)
            && *prev_id != id
        {
            let prev_id = prev_id.clone();
            if self.forward.get(&prev_id).is_some_and(|s| *s == slot) {
                self.forward.remove(&prev_id);
            }
        }
        self.forward.insert(id.clone(), slot);
        self.reverse.insert(slot, id);
    }

    /// Unbinds `id`; returns the slot it occupied, if any.
    pub fn remove_id(&mut self, id: &EntityId) -> Option<usize> {
        let slot = self.forward.remove(id)?;
        if self.reverse.get(&slot).is_some_and(|occupant| occupant == id) {
            self.reverse.remove(&slot);
        }
        Some(slot)
    }

    /// Drops all bindings.
    pub fn clear(&mut self) {
        self.forward.clear();
        self.reverse.clear();
    }

    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self) {
        assert_eq!(self.forward.len(), self.reverse.len());
        for (id, slot) in &self.forward {
            assert_eq!(self.reverse.get(slot), Some(id));
        }
    }
}
