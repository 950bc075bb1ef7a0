//! Pipeline configuration.
//!
//! All paths, expected vertex counts and solver tuning constants are
//! carried in explicit configuration structs passed into pipeline
//! construction; nothing is process-global.

use std::path::PathBuf;

/// Tuning parameters for the layer collision resolver.
#[derive(Debug, Clone)]
pub struct CollisionConfig {
    /// Maximum number of detect/solve iterations.
    pub max_iterations: usize,

    /// Constraint-solver passes per iteration.
    pub solver_passes: usize,

    /// Rings of adjacency by which the colliding vertex set is expanded
    /// each iteration, giving the deformation room to distribute.
    pub expansion_rings: usize,

    /// Distance a colliding vertex is pushed past the collision plane,
    /// in mesh length units.
    pub push_offset: f64,

    /// Per-iteration increment of the collision constraint weight; the
    /// weight at iteration `i` is `(i + 1) * collision_weight_step`.
    pub collision_weight_step: f64,

    /// Closeness weight for locked vertices participating in the solve.
    pub locked_weight: f64,

    /// Closeness weight for free, non-colliding vertices.
    pub free_weight: f64,

    /// Allowed range of the hinge bending measure relative to its rest
    /// value, as (min, max) factors.
    pub bend_range: (f64, f64),
}

impl Default for CollisionConfig {
    fn default() -> Self {
        Self {
            max_iterations: 30,
            solver_passes: 5,
            expansion_rings: 2,
            push_offset: 0.0025,
            collision_weight_step: 50.0,
            locked_weight: 100.0,
            free_weight: 1.0,
            bend_range: (0.9, 1.1),
        }
    }
}

/// Tuning parameters for RBF center selection and warping.
#[derive(Debug, Clone)]
pub struct RbfConfig {
    /// Centers selected beyond the prioritized region's share.
    pub additional_centers: usize,

    /// Fraction of a prioritized region's vertices that become centers
    /// before unrestricted sampling continues.
    pub priority_ratio: f64,

    /// Minimum number of centers for a well-posed system (cubic kernel
    /// plus four affine terms).
    pub min_centers: usize,
}

impl Default for RbfConfig {
    fn default() -> Self {
        Self {
            additional_centers: 4800,
            priority_ratio: 0.5,
            min_centers: 5,
        }
    }
}

/// Configuration for a full reconciliation pipeline.
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    /// Directory holding selection and weighting files.
    pub data_dir: PathBuf,

    /// Selection file with the locked vertex set (head, hands, toes).
    pub locked_selection: String,

    /// Selection file with vertices to ignore during intersection
    /// detection and center sampling (interior mouth cavity).
    pub ignore_selection: String,

    /// Selection file defining the region prioritized during RBF center
    /// sampling (head).
    pub region_selection: String,

    /// Selection file with the locked set used for seam stitching
    /// (everything except the replaceable region).
    pub stitch_selection: String,

    /// Selection file mapping full-resolution to reduced wrap vertices.
    pub index_map: String,

    /// Weighting file that pulls the wrap inward along vertex normals in
    /// the cut-off regions.
    pub shrink_weighting: String,

    /// Expected vertex count of the reduced wrap layer; `None` disables
    /// the check.
    pub wrap_vertices: Option<usize>,

    /// Expected vertex count of the skin layer; `None` disables the check.
    pub skin_vertices: Option<usize>,

    /// Collision resolver tuning.
    pub collision: CollisionConfig,

    /// RBF warp tuning.
    pub rbf: RbfConfig,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            locked_selection: "locked.sel".into(),
            ignore_selection: "mouth.sel".into(),
            region_selection: "head.sel".into(),
            stitch_selection: "head_inverse.sel".into(),
            index_map: "mapping_full_to_cut.sel".into(),
            shrink_weighting: "wrap_shrinking.vw".into(),
            wrap_vertices: None,
            skin_vertices: None,
            collision: CollisionConfig::default(),
            rbf: RbfConfig::default(),
        }
    }
}

impl ReconcileConfig {
    /// Full path of a data file.
    pub fn data_path(&self, name: &str) -> PathBuf {
        self.data_dir.join(name)
    }
}
