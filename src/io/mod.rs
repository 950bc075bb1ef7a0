//! Minimal file interfaces: selection lists and vertex weightings.
//!
//! Mesh geometry itself is supplied by the caller; the only formats the
//! pipeline reads are the selection-list files that define locked sets,
//! ignore masks, regions and index maps, and the per-vertex scalar
//! weighting files.

pub mod selection;
pub mod weighting;

pub use selection::{read_selection, read_selection_mask, selection_to_mask, IndexMap};
pub use weighting::read_vertex_weights;
