pub mod packed;
pub mod ref_graph;

pub use packed::{PackedCache, RefExtractor, ValueSlices};
pub use ref_graph::RefGraph;
