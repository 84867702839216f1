//! Packed, reference-aware entity compaction cache.
//!
//! Keeps a mutable collection of entities synchronized with a dense,
//! index-addressable external store (typically a GPU instance buffer).
//! Changes are queued by [`add`](PackedCache::add) /
//! [`mutate`](PackedCache::mutate) / [`remove`](PackedCache::remove) and
//! committed by [`pack`](PackedCache::pack), which recomputes the dense slot
//! mapping with minimal entity movement and returns the smallest copy
//! program that brings the external store up to date.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                         PackedCache<T>                              │
//! │                                                                     │
//! │   pending queues                      committed state               │
//! │   ┌───────────────────────────┐       ┌─────────────────────────┐   │
//! │   │ added:   id → T  (+order) │       │ backing: id → T         │   │
//! │   │ mutated: id → T           │       │ index:   id ↔ slot      │   │
//! │   │ removed: {id}    (+order) │       │          (IndexBiMap)   │   │
//! │   └───────────────────────────┘       └─────────────────────────┘   │
//! │                                                                     │
//! │   reference graph (iff extractors configured)                       │
//! │   ┌───────────────────────────────────────────────────────────┐     │
//! │   │ RefGraph: forward id → {id},  reverse id → {id}           │     │
//! │   └───────────────────────────────────────────────────────────┘     │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Pack Flow
//!
//! ```text
//!   pack():
//!     1. reference-graph maintenance (added / mutated / removed)
//!     2. slot reassignment: replace → append → move (defragment),
//!        cascading re-emission to dependents of every relocated entity
//!     3. commit queues into backing
//!     4. diff assembly: destinations sorted, compressed into copy runs
//!     5. index update: removals out, every diff id at its new slot
//!     6. clear queues, return { values, copy_slices }
//! ```
//!
//! ## Compaction Example
//!
//! ```text
//!   before: [ e0 ][ e1 ][ e2 ][ e3 ]     remove(e1), remove(e3)
//!
//!   new_used = 2, vacated = {1, 3}
//!   hole 1 < new_used  → refill from tail: e2 moves 2 → 1
//!   slot 3 >= new_used → the array simply shrinks there
//!
//!   after:  [ e0 ][ e2 ]                 copy program: {min:0, len:1, to:1}
//! ```
//!
//! ## Key Components
//!
//! | Component        | Description                                         |
//! |------------------|-----------------------------------------------------|
//! | `PackedCache<T>` | Queues + committed map + bijection + ref graph      |
//! | `ValueSlices<T>` | Pack output: value array plus copy program          |
//! | `RefExtractor`   | Caller-supplied `Fn(&T) -> Option<EntityId>`        |
//! | `IndexBiMap`     | Dense id ↔ slot bijection                           |
//! | `RefGraph`       | Forward/reverse dependency adjacency                |
//!
//! ## Operations
//!
//! | Operation  | Time                 | Notes                               |
//! |------------|----------------------|-------------------------------------|
//! | `add`      | O(1)                 | Queued; invisible until `pack`      |
//! | `mutate`   | O(1)                 | Queued; fails on removal-queued ids |
//! | `remove`   | O(1) amortized       | Deferred; committed ids stay visible|
//! | `pack`     | O(changes + edges)   | Proportional to pending work        |
//! | `index_of` | O(1)                 | Committed slots only                |
//!
//! ## Guarantees
//!
//! - The id ↔ slot bijection is dense and gap-free between packs.
//! - Slots are not stable across packs; only density and bijection hold.
//! - If entity A references entity B and a pack moves B, that same pack
//!   re-emits A even though A's fields never changed (reference cascade).
//! - Replaying the copy program against the previous external state
//!   reproduces the committed state exactly, in slot order.
//!
//! ## Example Usage
//!
//! ```
//! use packkit::cache::packed::PackedCache;
//!
//! let mut cache = PackedCache::new(true);
//! let a = cache.add("alpha");
//! let b = cache.add("beta");
//!
//! // Nothing is visible until pack commits the queues.
//! assert_eq!(cache.len(), 0);
//!
//! let update = cache.pack();
//! assert_eq!(cache.len(), 2);
//! assert_eq!(update.values, vec!["alpha", "beta"]);
//! assert_eq!(cache.index_of(&a), Some(0));
//!
//! // Removing the first entity compacts the tail down.
//! cache.remove(&a).unwrap();
//! let update = cache.pack();
//! assert_eq!(cache.len(), 1);
//! assert_eq!(cache.index_of(&b), Some(0));
//! assert_eq!(update.values, vec!["beta"]);
//! ```
//!
//! ## Thread Safety
//!
//! Single-threaded by design: one cooperative owner, no locking, no
//! suspension points. The returned [`ValueSlices`] is a plain value and may
//! be handed to another thread after `pack` returns.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::cache::ref_graph::RefGraph;
use crate::ds::bi_index::IndexBiMap;
use crate::ds::id_gen::{EntityId, IdGenerator};
use crate::ds::runs::{CopySlice, compress_sorted};
use crate::error::{InvariantError, MisuseError};
#[cfg(feature = "metrics")]
use crate::metrics::{PackCounters, PackMetricsSnapshot};
use crate::traits::CommittedView;

/// Caller-supplied pure function mapping an entity to the id of another
/// entity it depends on. `None`, or an id that does not resolve to a tracked
/// entity, means "no reference".
pub type RefExtractor<T> = Box<dyn Fn(&T) -> Option<EntityId>>;

/// Output of [`PackedCache::pack`]: the re-emitted values and the copy
/// program that writes them into an external dense store.
///
/// For each [`CopySlice`], a buffer writer takes `length` consecutive
/// elements of `values` starting at `min` and writes them at destination
/// offset `to_index`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueSlices<T> {
    /// Re-emitted entity values, ordered by destination slot.
    pub values: Vec<T>,
    /// Minimal contiguous-run copy program over `values`.
    pub copy_slices: Vec<CopySlice>,
}

impl<T> ValueSlices<T> {
    fn empty() -> Self {
        Self {
            values: Vec::new(),
            copy_slices: Vec::new(),
        }
    }

    /// Returns `true` if the pack produced no writes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Packed entity cache: pending queues, committed state, dense bijection,
/// and (optionally) a reference graph driving re-emission cascades.
pub struct PackedCache<T> {
    mutable: bool,
    extractors: Vec<RefExtractor<T>>,
    ids: IdGenerator,
    /// Committed entities, visible after the most recent pack.
    backing: FxHashMap<EntityId, T>,
    /// Queued inserts, with explicit insertion order for replace pairing.
    added: FxHashMap<EntityId, T>,
    added_order: Vec<EntityId>,
    /// Queued updates to a backing or added entity.
    mutated: FxHashMap<EntityId, T>,
    /// Queued deletions of backing entities, with explicit insertion order.
    removed: FxHashSet<EntityId>,
    removed_order: Vec<EntityId>,
    index: IndexBiMap,
    refs: RefGraph,
    #[cfg(feature = "metrics")]
    counters: PackCounters,
}

impl<T: Clone> PackedCache<T> {
    /// Creates a cache without reference extractors.
    ///
    /// An immutable cache rejects [`mutate`](Self::mutate); `add`, `remove`,
    /// and `pack` are unaffected.
    pub fn new(mutable: bool) -> Self {
        Self::with_extractors(mutable, Vec::new())
    }

    /// Creates a cache whose entities may reference each other.
    ///
    /// Each extractor maps an entity to the id of another entity it depends
    /// on. When a pack relocates a referenced entity, every dependent is
    /// re-emitted in the same pack so downstream code can re-encode the
    /// reference index.
    pub fn with_extractors(mutable: bool, extractors: Vec<RefExtractor<T>>) -> Self {
        Self {
            mutable,
            extractors,
            ids: IdGenerator::new(),
            backing: FxHashMap::default(),
            added: FxHashMap::default(),
            added_order: Vec::new(),
            mutated: FxHashMap::default(),
            removed: FxHashSet::default(),
            removed_order: Vec::new(),
            index: IndexBiMap::new(),
            refs: RefGraph::new(),
            #[cfg(feature = "metrics")]
            counters: PackCounters::default(),
        }
    }

    /// Returns a fluent builder for this cache type.
    pub fn builder() -> crate::builder::PackedCacheBuilder<T> {
        crate::builder::PackedCacheBuilder::new()
    }

    /// Returns `true` if [`mutate`](Self::mutate) is permitted.
    #[inline]
    pub fn is_mutable(&self) -> bool {
        self.mutable
    }

    /// Returns `true` if any change is queued for the next pack.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        !self.added.is_empty() || !self.mutated.is_empty() || !self.removed.is_empty()
    }

    /// Returns the number of committed entities.
    ///
    /// Queued adds and removes do not affect the count until `pack`.
    #[inline]
    pub fn len(&self) -> usize {
        self.backing.len()
    }

    /// Returns `true` if no entities are committed.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.backing.is_empty()
    }

    /// Returns the committed slot of `id`, or `None` if the id is not
    /// currently committed (including ids only queued, not yet packed).
    #[inline]
    pub fn index_of(&self, id: &EntityId) -> Option<usize> {
        self.index.slot_of(id)
    }

    /// Returns the id committed at `slot`, or `None` out of range.
    #[inline]
    pub fn id_of(&self, slot: usize) -> Option<&EntityId> {
        self.index.id_at(slot)
    }

    /// Returns the committed value of `id`.
    #[inline]
    pub fn get(&self, id: &EntityId) -> Option<&T> {
        self.backing.get(id)
    }

    /// Iterates committed entities in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &EntityId, &T)> {
        (0..self.len()).map(|slot| {
            let id = self
                .index
                .id_at(slot)
                .expect("dense range has unoccupied slot");
            let value = self
                .backing
                .get(id)
                .expect("indexed id missing from committed state");
            (slot, id, value)
        })
    }

    /// Queues a new entity and returns its freshly minted id.
    ///
    /// The entity is invisible to `len`/`index_of`/`get` until the next
    /// `pack`.
    pub fn add(&mut self, entity: T) -> EntityId {
        let id = self.ids.mint();
        self.added.insert(id.clone(), entity);
        self.added_order.push(id.clone());
        id
    }

    /// Queues the removal of a committed entity, or un-queues a pending add.
    ///
    /// A committed id stays visible until the next `pack`; any pending
    /// mutation for it is discarded, and a second removal of the same id is
    /// a no-op. An id that was only queued by [`add`](Self::add) is
    /// un-queued as if it never existed. Any other id fails with a
    /// [`MisuseError`], leaving state untouched.
    pub fn remove(&mut self, id: &EntityId) -> Result<(), MisuseError> {
        if self.backing.contains_key(id) {
            if self.removed.contains(id) {
                return Ok(());
            }
            self.mutated.remove(id);
            self.removed.insert(id.clone());
            self.removed_order.push(id.clone());
            return Ok(());
        }
        if self.added.remove(id).is_some() {
            self.added_order.retain(|queued| queued != id);
            return Ok(());
        }
        Err(MisuseError::new(format!("remove: unknown id {id}")))
    }

    /// Queues a replacement value for a committed or pending-add entity.
    ///
    /// Fails on an immutable cache, on an id queued for removal, and on an
    /// id the cache never handed out. Failure never mutates state. Mutating
    /// a pending add overwrites the queued insert in place.
    pub fn mutate(&mut self, id: &EntityId, entity: T) -> Result<(), MisuseError> {
        if !self.mutable {
            return Err(MisuseError::new(format!(
                "mutate: cache is immutable, cannot update {id}"
            )));
        }
        if self.removed.contains(id) {
            return Err(MisuseError::new(format!(
                "mutate: id {id} is queued for removal"
            )));
        }
        if self.backing.contains_key(id) {
            self.mutated.insert(id.clone(), entity);
            return Ok(());
        }
        if let Some(pending) = self.added.get_mut(id) {
            *pending = entity;
            return Ok(());
        }
        Err(MisuseError::new(format!("mutate: unknown id {id}")))
    }

    /// Commits all queued changes and returns the minimal diff program.
    ///
    /// Compaction reassigns as few entities as possible: queued adds first
    /// refill slots vacated by queued removes (replace), then extend the
    /// dense range (append); surplus vacated slots below the new bound are
    /// refilled from the tail (move). Every relocation re-emits the
    /// dependents of the moved entity. A clean cache returns an empty diff.
    pub fn pack(&mut self) -> ValueSlices<T> {
        #[cfg(feature = "metrics")]
        {
            self.counters.pack_calls += 1;
        }
        if !self.is_dirty() {
            return ValueSlices::empty();
        }

        // 1. Reference-graph maintenance.
        if !self.extractors.is_empty() {
            self.maintain_ref_graph();
        }

        // 2. Slot reassignment (may force cascade entries into `mutated`).
        let reassigned = self.reassign_slots();

        #[cfg(feature = "metrics")]
        {
            self.counters.committed_adds += self.added.len() as u64;
            self.counters.committed_mutations += self.mutated.len() as u64;
            self.counters.committed_removals += self.removed.len() as u64;
        }

        // 3. Commit queues into backing.
        let mutated_ids: Vec<EntityId> = self.mutated.keys().cloned().collect();
        for (id, entity) in self.added.drain() {
            self.backing.insert(id, entity);
        }
        self.added_order.clear();
        for (id, entity) in self.mutated.drain() {
            self.backing.insert(id, entity);
        }
        for id in &self.removed_order {
            self.backing.remove(id);
        }

        // 4. Diff assembly: mutated ids keep their pre-pack slots unless a
        // reassignment overlays them.
        let mut destinations: FxHashMap<EntityId, usize> = FxHashMap::default();
        for id in mutated_ids {
            let slot = self
                .index
                .slot_of(&id)
                .expect("mutated id has no committed slot");
            destinations.insert(id, slot);
        }
        for (id, slot) in reassigned {
            destinations.insert(id, slot);
        }

        let mut ordered: Vec<(usize, EntityId)> = destinations
            .into_iter()
            .map(|(id, slot)| (slot, id))
            .collect();
        ordered.sort_unstable_by(|a, b| a.0.cmp(&b.0));

        let mut values = Vec::with_capacity(ordered.len());
        let mut slots = Vec::with_capacity(ordered.len());
        for (slot, id) in &ordered {
            let value = self
                .backing
                .get(id)
                .expect("diff id missing from committed state");
            values.push(value.clone());
            slots.push(*slot);
        }
        let copy_slices = compress_sorted(&slots);

        // 5. Index update: removals out first, then every diff id at its
        // destination, evicting stale occupants.
        for id in &self.removed_order {
            self.index.remove_id(id);
        }
        for (slot, id) in ordered {
            self.index.insert(id, slot);
        }

        // 6. Clear queues.
        self.removed.clear();
        self.removed_order.clear();

        #[cfg(feature = "metrics")]
        {
            self.counters.emitted_values += values.len() as u64;
            self.counters.emitted_slices += copy_slices.len() as u64;
        }

        #[cfg(any(test, debug_assertions))]
        self.debug_validate_invariants();

        ValueSlices {
            values,
            copy_slices,
        }
    }

    /// Establishes links for added entities, refreshes links for mutated
    /// ones, and lets removed ids force their dependents to re-emit before
    /// dropping off the graph.
    fn maintain_ref_graph(&mut self) {
        for i in 0..self.added_order.len() {
            let id = self.added_order[i].clone();
            let refs = {
                let entity = self
                    .added
                    .get(&id)
                    .expect("added order out of sync with added queue");
                self.resolvable_refs(entity)
            };
            self.refs.record(&id, refs);
        }

        let mutated_ids: Vec<EntityId> = self.mutated.keys().cloned().collect();
        for id in mutated_ids {
            let refs = {
                let entity = self
                    .mutated
                    .get(&id)
                    .expect("mutated id vanished mid-pack");
                self.resolvable_refs(entity)
            };
            self.refs.record(&id, refs);
        }

        for i in 0..self.removed_order.len() {
            let id = self.removed_order[i].clone();
            self.force_dependents(&id);
            self.refs.sever(&id);
        }
    }

    /// Applies every extractor to `entity`, keeping only ids that resolve
    /// to a tracked entity. Unresolvable ids are dropped silently.
    fn resolvable_refs(&self, entity: &T) -> FxHashSet<EntityId> {
        let mut refs = FxHashSet::default();
        for extract in &self.extractors {
            if let Some(id) = extract(entity)
                && self.is_tracked(&id)
            {
                refs.insert(id);
            }
        }
        refs
    }

    #[inline]
    fn is_tracked(&self, id: &EntityId) -> bool {
        !self.removed.contains(id)
            && (self.added.contains_key(id) || self.backing.contains_key(id))
    }

    /// Queues every committed dependent of `id` into `mutated` with its
    /// current committed value, unless already queued. Dependents that are
    /// themselves pending (added, mutated, removed) are emitted or dropped
    /// through their own queues.
    fn force_dependents(&mut self, id: &EntityId) {
        let Some(dependents) = self.refs.dependents(id) else {
            return;
        };
        let dependents: Vec<EntityId> = dependents.iter().cloned().collect();
        for dependent in dependents {
            if self.mutated.contains_key(&dependent)
                || self.added.contains_key(&dependent)
                || self.removed.contains(&dependent)
            {
                continue;
            }
            let current = self
                .backing
                .get(&dependent)
                .expect("dependent missing from committed state")
                .clone();
            self.mutated.insert(dependent, current);
            #[cfg(feature = "metrics")]
            {
                self.counters.cascade_mutations += 1;
            }
        }
    }

    /// Computes the new slot of every entity that needs one: queued adds
    /// via replace pairing and appends, then tail entities pulled down into
    /// surplus vacated slots.
    fn reassign_slots(&mut self) -> FxHashMap<EntityId, usize> {
        let previous_used = self.backing.len();
        let added_n = self.added_order.len();
        let removed_n = self.removed_order.len();
        let new_used = previous_used + added_n - removed_n;

        let mut reassigned: FxHashMap<EntityId, usize> = FxHashMap::default();
        let paired = added_n.min(removed_n);

        // Replace: paired adds take the slots their partners vacate.
        let mut refill: FxHashMap<usize, EntityId> = FxHashMap::default();
        for i in 0..paired {
            let slot = self
                .index
                .slot_of(&self.removed_order[i])
                .expect("removed id has no committed slot");
            let incoming = self.added_order[i].clone();
            reassigned.insert(incoming.clone(), slot);
            refill.insert(slot, incoming);
        }

        // Append: remaining adds extend the dense range.
        for (offset, id) in self.added_order[paired..].iter().enumerate() {
            reassigned.insert(id.clone(), previous_used + offset);
        }

        #[cfg(feature = "metrics")]
        {
            self.counters.replaced_slots += paired as u64;
            self.counters.appended_slots += (added_n - paired) as u64;
        }

        if removed_n == paired {
            return reassigned;
        }

        // Move: surplus vacated slots below the new bound are refilled by
        // walking the tail downward; vacated slots at or beyond the bound
        // simply disappear.
        let mut vacated: FxHashSet<usize> = FxHashSet::default();
        for id in &self.removed_order[paired..] {
            let slot = self
                .index
                .slot_of(id)
                .expect("removed id has no committed slot");
            vacated.insert(slot);
        }
        let mut holes: Vec<usize> = vacated
            .iter()
            .copied()
            .filter(|&slot| slot < new_used)
            .collect();
        holes.sort_unstable();

        let mut cursor = previous_used;
        for hole in holes {
            loop {
                cursor = cursor
                    .checked_sub(1)
                    .expect("compaction ran out of trailing occupants");
                if !vacated.contains(&cursor) {
                    break;
                }
            }
            debug_assert!(cursor >= new_used, "mover taken from inside the new bound");

            let mover = match refill.get(&cursor) {
                // A freshly replace-assigned add pulled further down.
                Some(incoming) => incoming.clone(),
                None => self
                    .index
                    .id_at(cursor)
                    .expect("trailing slot has no occupant")
                    .clone(),
            };
            reassigned.insert(mover.clone(), hole);
            #[cfg(feature = "metrics")]
            {
                self.counters.moved_entities += 1;
            }

            // Reference cascade: dependents of a relocated entity re-emit
            // even though their own fields never changed.
            if !self.extractors.is_empty() {
                self.force_dependents(&mover);
            }
        }

        reassigned
    }

    /// Verifies the cache's internal invariants.
    ///
    /// Cheap enough for tests, not intended for per-frame use.
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        if self.index.len() != self.backing.len() {
            return Err(InvariantError::new(format!(
                "index holds {} bindings for {} committed entities",
                self.index.len(),
                self.backing.len()
            )));
        }
        for slot in 0..self.backing.len() {
            let Some(id) = self.index.id_at(slot) else {
                return Err(InvariantError::new(format!(
                    "slot {slot} unoccupied inside the dense range"
                )));
            };
            if !self.backing.contains_key(id) {
                return Err(InvariantError::new(format!(
                    "slot {slot} holds uncommitted id {id}"
                )));
            }
            if self.index.slot_of(id) != Some(slot) {
                return Err(InvariantError::new(format!(
                    "bijection mismatch at slot {slot} for id {id}"
                )));
            }
        }
        if self.added.len() != self.added_order.len() {
            return Err(InvariantError::new(
                "added queue and its order list disagree",
            ));
        }
        for id in &self.added_order {
            if self.backing.contains_key(id) {
                return Err(InvariantError::new(format!(
                    "queued add {id} already committed"
                )));
            }
        }
        if self.removed.len() != self.removed_order.len() {
            return Err(InvariantError::new(
                "removed queue and its order list disagree",
            ));
        }
        for id in &self.removed_order {
            if !self.backing.contains_key(id) {
                return Err(InvariantError::new(format!(
                    "queued removal {id} is not committed"
                )));
            }
            if self.mutated.contains_key(id) {
                return Err(InvariantError::new(format!(
                    "id {id} queued for both mutation and removal"
                )));
            }
        }
        Ok(())
    }

    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self) {
        if let Err(err) = self.check_invariants() {
            panic!("{err}");
        }
        self.refs.debug_validate_invariants();
    }

    /// Captures counters and gauges for this cache.
    #[cfg(feature = "metrics")]
    pub fn metrics_snapshot(&self) -> PackMetricsSnapshot {
        self.counters.snapshot(self.backing.len(), self.refs.edge_count())
    }
}

impl<T: Clone> CommittedView<T> for PackedCache<T> {
    #[inline]
    fn len(&self) -> usize {
        PackedCache::len(self)
    }

    #[inline]
    fn index_of(&self, id: &EntityId) -> Option<usize> {
        PackedCache::index_of(self, id)
    }

    #[inline]
    fn id_of(&self, slot: usize) -> Option<&EntityId> {
        PackedCache::id_of(self, slot)
    }

    #[inline]
    fn get(&self, id: &EntityId) -> Option<&T> {
        PackedCache::get(self, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queued_changes_do_not_affect_committed_state() {
        let mut cache = PackedCache::new(true);
        let a = cache.add(1u32);
        cache.add(2u32);

        assert_eq!(cache.len(), 0);
        assert_eq!(cache.index_of(&a), None);
        assert_eq!(cache.get(&a), None);
        assert!(cache.is_dirty());
    }

    #[test]
    fn dirty_tracks_every_queue() {
        let mut cache = PackedCache::new(true);
        assert!(!cache.is_dirty());

        let a = cache.add(1u32);
        assert!(cache.is_dirty());
        cache.pack();
        assert!(!cache.is_dirty());

        cache.mutate(&a, 2).unwrap();
        assert!(cache.is_dirty());
        cache.pack();
        assert!(!cache.is_dirty());

        cache.remove(&a).unwrap();
        assert!(cache.is_dirty());
        cache.pack();
        assert!(!cache.is_dirty());
    }

    #[test]
    fn add_then_remove_never_materializes() {
        let mut cache = PackedCache::new(true);
        let a = cache.add(1u32);
        let b = cache.add(2u32);
        cache.remove(&a).unwrap();

        let update = cache.pack();
        assert_eq!(cache.len(), 1);
        assert_eq!(update.values, vec![2]);
        assert_eq!(cache.index_of(&a), None);
        assert_eq!(cache.index_of(&b), Some(0));
    }

    #[test]
    fn mutate_on_pending_add_overwrites_in_place() {
        let mut cache = PackedCache::new(true);
        let a = cache.add(1u32);
        cache.mutate(&a, 9).unwrap();

        let update = cache.pack();
        assert_eq!(update.values, vec![9]);
        assert_eq!(cache.get(&a), Some(&9));
    }

    #[test]
    fn misuse_errors_leave_state_untouched() {
        let mut cache = PackedCache::new(true);
        let a = cache.add(1u32);
        cache.pack();

        let foreign = EntityId::from("never-minted");
        assert!(cache.remove(&foreign).is_err());
        assert!(cache.mutate(&foreign, 0).is_err());
        assert!(!cache.is_dirty());

        cache.remove(&a).unwrap();
        let err = cache.mutate(&a, 5).unwrap_err();
        assert!(err.message().contains("removal"));

        // The failed mutate queued nothing new.
        let update = cache.pack();
        assert!(update.values.is_empty());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn immutable_cache_rejects_mutate() {
        let mut cache = PackedCache::new(false);
        let a = cache.add(1u32);
        cache.pack();

        let err = cache.mutate(&a, 2).unwrap_err();
        assert!(err.message().contains("immutable"));
        assert!(!cache.is_mutable());
        assert_eq!(cache.get(&a), Some(&1));
    }

    #[test]
    fn double_remove_is_idempotent() {
        let mut cache = PackedCache::new(true);
        let a = cache.add(1u32);
        cache.add(2u32);
        cache.pack();

        cache.remove(&a).unwrap();
        cache.remove(&a).unwrap();

        let update = cache.pack();
        assert_eq!(cache.len(), 1);
        assert_eq!(update.values.len(), 1);
    }

    #[test]
    fn removed_ids_stay_visible_until_pack() {
        let mut cache = PackedCache::new(true);
        let a = cache.add(1u32);
        cache.pack();

        cache.remove(&a).unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&a), Some(&1));
        assert_eq!(cache.index_of(&a), Some(0));

        cache.pack();
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.get(&a), None);
    }

    #[test]
    fn replace_pairs_adds_with_removes_in_queue_order() {
        let mut cache = PackedCache::new(true);
        let a = cache.add("a");
        let b = cache.add("b");
        let c = cache.add("c");
        cache.pack();

        cache.remove(&a).unwrap();
        let d = cache.add("d");
        let update = cache.pack();

        // "d" takes the exact slot "a" vacated; nothing else moves.
        assert_eq!(cache.index_of(&d), Some(0));
        assert_eq!(cache.index_of(&b), Some(1));
        assert_eq!(cache.index_of(&c), Some(2));
        assert_eq!(update.values, vec!["d"]);
        assert_eq!(
            update.copy_slices,
            vec![CopySlice {
                min: 0,
                length: 1,
                to_index: 0
            }]
        );
    }

    #[test]
    fn iter_walks_slot_order() {
        let mut cache = PackedCache::new(true);
        cache.add(10u32);
        cache.add(20u32);
        cache.add(30u32);
        cache.pack();

        let collected: Vec<(usize, u32)> =
            cache.iter().map(|(slot, _, value)| (slot, *value)).collect();
        assert_eq!(collected, vec![(0, 10), (1, 20), (2, 30)]);
    }

    #[test]
    fn clean_pack_is_an_empty_diff() {
        let mut cache: PackedCache<u32> = PackedCache::new(true);
        let update = cache.pack();
        assert!(update.is_empty());
        assert!(update.copy_slices.is_empty());
    }

    #[cfg(feature = "metrics")]
    #[test]
    fn metrics_count_pack_phases() {
        let mut cache = PackedCache::new(true);
        let a = cache.add("a");
        let b = cache.add("b");
        cache.add("c");
        cache.pack();

        cache.remove(&a).unwrap();
        cache.add("d");
        cache.pack();

        cache.remove(&b).unwrap();
        cache.pack();

        let snapshot = cache.metrics_snapshot();
        assert_eq!(snapshot.pack_calls, 3);
        assert_eq!(snapshot.committed_adds, 4);
        assert_eq!(snapshot.committed_removals, 2);
        assert_eq!(snapshot.appended_slots, 3);
        assert_eq!(snapshot.replaced_slots, 1);
        assert_eq!(snapshot.moved_entities, 1);
        assert_eq!(snapshot.cascade_mutations, 0);
        assert_eq!(snapshot.emitted_values, 5);
        assert_eq!(snapshot.emitted_slices, 3);
        assert_eq!(snapshot.committed_len, 2);
        assert_eq!(snapshot.ref_edges, 0);
    }
}
