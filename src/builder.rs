//! Unified builder for packed caches.
//!
//! Provides a simple API to assemble a [`PackedCache`] while hiding the
//! boxing of reference extractors.
//!
//! ## Example
//!
//! ```rust
//! use packkit::builder::PackedCacheBuilder;
//! use packkit::ds::id_gen::EntityId;
//!
//! #[derive(Clone)]
//! struct Sprite {
//!     atlas: Option<EntityId>,
//! }
//!
//! let mut cache = PackedCacheBuilder::new()
//!     .mutable(true)
//!     .extractor(|sprite: &Sprite| sprite.atlas.clone())
//!     .build();
//!
//! let atlas = cache.add(Sprite { atlas: None });
//! cache.add(Sprite { atlas: Some(atlas) });
//! cache.pack();
//! assert_eq!(cache.len(), 2);
//! ```

use crate::cache::packed::{PackedCache, RefExtractor};
use crate::ds::id_gen::EntityId;

/// Fluent builder collecting construction options for a [`PackedCache`].
pub struct PackedCacheBuilder<T> {
    mutable: bool,
    extractors: Vec<RefExtractor<T>>,
}

impl<T: Clone> PackedCacheBuilder<T> {
    /// Creates a builder for an immutable cache with no extractors.
    pub fn new() -> Self {
        Self {
            mutable: false,
            extractors: Vec::new(),
        }
    }

    /// Sets whether the cache accepts `mutate` calls.
    pub fn mutable(mut self, mutable: bool) -> Self {
        self.mutable = mutable;
        self
    }

    /// Registers a reference extractor.
    ///
    /// Extractors must be pure; returning `None` or an unresolvable id
    /// means "no reference".
    pub fn extractor(mut self, extract: impl Fn(&T) -> Option<EntityId> + 'static) -> Self {
        self.extractors.push(Box::new(extract));
        self
    }

    /// Builds the cache.
    pub fn build(self) -> PackedCache<T> {
        PackedCache::with_extractors(self.mutable, self.extractors)
    }
}

impl<T: Clone> Default for PackedCacheBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}
