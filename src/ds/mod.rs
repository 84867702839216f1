pub mod bi_index;
pub mod id_gen;
pub mod runs;

pub use bi_index::IndexBiMap;
pub use id_gen::{EntityId, IdGenerator};
pub use runs::{CopySlice, compress_sorted};
