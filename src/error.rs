//! Error types for lamina.
//!
//! Components never panic across module boundaries for recoverable
//! conditions; they return [`LaminaError`] plus a log record. The single
//! fatal case (the stitcher's free-vertex invariant) is documented on
//! [`crate::algo::stitch::MeshStitcher::init`].

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using [`LaminaError`].
pub type Result<T> = std::result::Result<T, LaminaError>;

/// Errors that can occur during mesh construction or layer reconciliation.
#[derive(Error, Debug)]
pub enum LaminaError {
    /// The mesh has no faces.
    #[error("mesh has no faces")]
    EmptyMesh,

    /// A face references an invalid vertex index.
    #[error("face {face} references invalid vertex index {vertex}")]
    InvalidVertexIndex {
        /// The face index.
        face: usize,
        /// The invalid vertex index.
        vertex: usize,
    },

    /// A face has duplicate vertex indices (degenerate).
    #[error("face {face} is degenerate (has duplicate vertices)")]
    DegenerateFace {
        /// The face index.
        face: usize,
    },

    /// An edge is referenced in the same direction by more than one face.
    #[error("edge ({v0}, {v1}) is non-manifold")]
    NonManifoldEdge {
        /// First vertex of the edge.
        v0: usize,
        /// Second vertex of the edge.
        v1: usize,
    },

    /// An operation that assumes triangle faces was given a non-triangle mesh.
    #[error("operation requires a triangle mesh")]
    NotATriangleMesh,

    /// Corresponding layers do not share the same vertex index space.
    #[error("layer vertex counts do not match: top has {top}, bottom has {bottom}")]
    LayerMismatch {
        /// Vertex count of the top (reference) layer.
        top: usize,
        /// Vertex count of the bottom (moving) layer.
        bottom: usize,
    },

    /// A locked-vertex selection is required but missing or empty.
    #[error("no locked vertices defined")]
    MissingLockedSelection,

    /// A per-element mask has the wrong length for its mesh.
    #[error("mask length {len} does not match element count {expected}")]
    MaskLength {
        /// Length of the supplied mask.
        len: usize,
        /// Expected element count.
        expected: usize,
    },

    /// A selection file could not be opened.
    #[error("cannot read selection file {}: {source}", .path.display())]
    SelectionRead {
        /// The file path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A vertex-weighting file could not be opened.
    #[error("cannot read vertex weighting file {}: {source}", .path.display())]
    WeightingRead {
        /// The file path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A vertex-weighting file ran out of values before the mesh ran out
    /// of vertices.
    #[error("vertex weighting file {} has only {found} of {expected} values", .path.display())]
    ShortWeightingFile {
        /// The file path.
        path: PathBuf,
        /// Number of values found.
        found: usize,
        /// Number of values expected (the mesh vertex count).
        expected: usize,
    },

    /// Too few RBF centers to build or apply the deformation field.
    #[error("too few RBF centers: {found} (need at least {required})")]
    TooFewCenters {
        /// Number of centers available.
        found: usize,
        /// Minimum required (kernel plus affine terms).
        required: usize,
    },

    /// An iterative linear solver failed to converge.
    #[error("solver failed to converge after {iterations} iterations")]
    ConvergenceFailed {
        /// Number of iterations attempted.
        iterations: usize,
    },

    /// A linear system was singular or could not be factorized.
    #[error("singular or unfactorizable system: {context}")]
    SingularSystem {
        /// Description of the system that failed.
        context: &'static str,
    },
}
