//! Error types for the packkit library.
//!
//! ## Key Components
//!
//! - [`MisuseError`]: Returned when a caller uses the public API with an id
//!   it never obtained, an id queued for removal, or a mutation on an
//!   immutable cache. Recoverable by fixing caller logic; never corrupts
//!   cache state.
//! - [`InvariantError`]: Returned when internal data-structure invariants
//!   are violated (`check_invariants` methods). Indicates an internal bug,
//!   never expected under correct use of the public API.
//!
//! ## Example Usage
//!
//! ```
//! use packkit::cache::packed::PackedCache;
//! use packkit::ds::id_gen::EntityId;
//!
//! let mut cache: PackedCache<u32> = PackedCache::new(true);
//!
//! // Removing an id the cache never minted is a misuse error.
//! let foreign = EntityId::from("not-ours");
//! assert!(cache.remove(&foreign).is_err());
//!
//! // The failed call left nothing queued.
//! assert!(!cache.is_dirty());
//! ```

use std::fmt;

// ---------------------------------------------------------------------------
// MisuseError
// ---------------------------------------------------------------------------

/// Error returned when the public API is called with arguments the cache
/// never handed out or in a state that forbids the call.
///
/// Produced by [`PackedCache::remove`](crate::cache::packed::PackedCache::remove)
/// and [`PackedCache::mutate`](crate::cache::packed::PackedCache::mutate).
/// Carries a human-readable description of the offending call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MisuseError(String);

impl MisuseError {
    /// Creates a new `MisuseError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MisuseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for MisuseError {}

// ---------------------------------------------------------------------------
// InvariantError
// ---------------------------------------------------------------------------

/// Error returned when internal cache invariants are violated.
///
/// Produced by `check_invariants` methods. Carries a human-readable
/// description of which invariant failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvariantError(String);

impl InvariantError {
    /// Creates a new `InvariantError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InvariantError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for InvariantError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
