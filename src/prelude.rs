pub use crate::builder::PackedCacheBuilder;
pub use crate::cache::packed::{PackedCache, RefExtractor, ValueSlices};
pub use crate::cache::ref_graph::RefGraph;
pub use crate::ds::{CopySlice, EntityId, IdGenerator, IndexBiMap};
pub use crate::error::{InvariantError, MisuseError};
#[cfg(feature = "metrics")]
pub use crate::metrics::PackMetricsSnapshot;
pub use crate::traits::{CommittedView, MirrorBuffer, SliceSink};
