//! # Cache Trait Seams
//!
//! This module defines the two seams through which the packed cache meets
//! the rest of a pipeline: the read-only committed surface consumed by code
//! that encodes references, and the buffer-writer seam that applies a pack's
//! copy program to an external dense store.
//!
//! ## Architecture
//!
//! ```text
//!                  ┌──────────────────────────────────┐
//!                  │        CommittedView<T>          │
//!                  │                                  │
//!                  │  len(&) → usize                  │
//!                  │  index_of(&, &EntityId) → slot   │
//!                  │  id_of(&, usize) → &EntityId     │
//!                  │  get(&, &EntityId) → &T          │
//!                  └──────────────────────────────────┘
//!                        implemented by PackedCache
//!
//!   pack() ──► ValueSlices<T> ──► ┌──────────────────────────────────┐
//!                                 │          SliceSink<T>            │
//!                                 │                                  │
//!                                 │  write_run(&mut, to, &[T])       │
//!                                 │  apply(&mut, &ValueSlices<T>)    │
//!                                 └──────────────────────────────────┘
//!                                   e.g. MirrorBuffer, a GPU queue
//! ```
//!
//! The cache never sees byte layout, record strides, or GPU types; those
//! live entirely behind [`SliceSink`] implementations.

use crate::cache::packed::ValueSlices;
use crate::ds::id_gen::EntityId;

/// Read-only view over committed entities and their dense slots.
///
/// After every pack, `index_of`/`id_of` form a bijection over exactly
/// `[0, len())`. Pending (queued but unpacked) entities are invisible here.
///
/// # Example
///
/// ```
/// use packkit::cache::packed::PackedCache;
/// use packkit::traits::CommittedView;
///
/// fn dump<T, V: CommittedView<T>>(view: &V) -> Vec<usize> {
///     (0..view.len())
///         .map(|slot| view.index_of(view.id_of(slot).unwrap()).unwrap())
///         .collect()
/// }
///
/// let mut cache = PackedCache::new(true);
/// cache.add("a");
/// cache.add("b");
/// cache.pack();
/// assert_eq!(dump(&cache), vec![0, 1]);
/// ```
pub trait CommittedView<T> {
    /// Returns the number of committed entities.
    fn len(&self) -> usize;

    /// Returns `true` if no entities are committed.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the committed slot of `id`, if any.
    fn index_of(&self, id: &EntityId) -> Option<usize>;

    /// Returns the id committed at `slot`, if in range.
    fn id_of(&self, slot: usize) -> Option<&EntityId>;

    /// Returns the committed value of `id`, if any.
    fn get(&self, id: &EntityId) -> Option<&T>;
}

/// Destination for a pack's copy program.
///
/// Implementors own a dense store (a GPU buffer, a staging vec) and know its
/// record stride; the cache only speaks in slot offsets. The provided
/// [`apply`](Self::apply) walks the program run by run.
///
/// # Example
///
/// ```
/// use packkit::cache::packed::PackedCache;
/// use packkit::traits::{MirrorBuffer, SliceSink};
///
/// let mut cache = PackedCache::new(true);
/// cache.add(7u32);
/// cache.add(8u32);
/// let update = cache.pack();
///
/// let mut mirror = MirrorBuffer::new();
/// mirror.apply(&update);
/// assert_eq!(mirror.get(0), Some(&7));
/// assert_eq!(mirror.get(1), Some(&8));
/// ```
pub trait SliceSink<T: Clone> {
    /// Writes `values` at destination offset `to_index`.
    fn write_run(&mut self, to_index: usize, values: &[T]);

    /// Applies a whole pack output, one run per copy slice.
    fn apply(&mut self, update: &ValueSlices<T>) {
        for slice in &update.copy_slices {
            self.write_run(
                slice.to_index,
                &update.values[slice.min..slice.min + slice.length],
            );
        }
    }
}

/// Growable in-memory [`SliceSink`] mirroring the external store.
///
/// Used by tests, fuzz targets, and demos to replay copy programs and
/// cross-check the result against committed cache state. Slots that have
/// never been written read as `None`, like uninitialized buffer memory.
#[derive(Debug, Default, Clone)]
pub struct MirrorBuffer<T> {
    slots: Vec<Option<T>>,
}

impl<T> MirrorBuffer<T> {
    /// Creates an empty mirror.
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// Returns the physical length (the highest slot ever written plus one).
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if nothing was ever written.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns the value at `slot`, or `None` if never written.
    #[inline]
    pub fn get(&self, slot: usize) -> Option<&T> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    /// Shrinks the mirror to `new_len` slots, like a buffer reallocation
    /// after the dense range contracted.
    pub fn truncate(&mut self, new_len: usize) {
        self.slots.truncate(new_len);
    }
}

impl<T: Clone> SliceSink<T> for MirrorBuffer<T> {
    fn write_run(&mut self, to_index: usize, values: &[T]) {
        let end = to_index + values.len();
        if self.slots.len() < end {
            self.slots.resize_with(end, || None);
        }
        for (offset, value) in values.iter().enumerate() {
            self.slots[to_index + offset] = Some(value.clone());
        }
    }
}
