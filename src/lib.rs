//! # Lamina
//!
//! Mesh layer reconciliation for nested surface layers: the geometry
//! machinery that turns raw decoded vertex positions for an inner wrap, an
//! outer skin and a separately posed bones layer into self-consistent,
//! non-intersecting geometry — every time a parameter slider moves.
//!
//! Four interoperating numerical components do the work:
//!
//! 1. **Triangle intersection** ([`algo::tri_tri`]): an exact
//!    separating-axis test with segment construction.
//! 2. **Layer collision resolution** ([`algo::collision`]): an iterative
//!    constraint solve that pushes the wrap back under the skin while
//!    preserving its shape.
//! 3. **RBF warping** ([`algo::rbf`]): a prefactorized cubic
//!    radial-basis-function field propagating sparse wrap displacements to
//!    the dense bones layer.
//! 4. **Laplacian stitching** ([`algo::stitch`]): differential-coordinate
//!    blending of a locally replaced region into the surrounding surface.
//!
//! [`layers::BodyLayers`] wires them into the per-interaction pipeline.
//!
//! ## Quick start
//!
//! ```
//! use lamina::prelude::*;
//! use lamina::mesh::primitives::uv_sphere;
//! use nalgebra::Point3;
//!
//! // Two co-indexed layers: an inner wrap whose north cap pokes through
//! // the outer skin.
//! let skin = uv_sphere(Point3::origin(), 1.0, 12, 16).unwrap();
//! let mut wrap = uv_sphere(Point3::origin(), 0.95, 12, 16).unwrap();
//! for vi in 0..wrap.num_vertices() {
//!     let v = VertexId::new(vi);
//!     let dir = wrap.position(v).coords.normalize();
//!     let bulge = ((dir.z - 0.8) / 0.2).max(0.0) * 0.07;
//!     wrap.set_position(v, Point3::from(dir * (0.95 + bulge)));
//! }
//!
//! // Anchor everything away from the cap, resolve the rest.
//! let locked: Vec<bool> = skin
//!     .vertex_ids()
//!     .map(|v| skin.position(v).coords.normalize().z < 0.4)
//!     .collect();
//! let outcome = resolve_layer_intersections_by_bottom_layer(
//!     &skin,
//!     &mut wrap,
//!     &locked,
//!     &CollisionConfig::default(),
//! )
//! .unwrap();
//! assert!(outcome.resolved);
//! ```
//!
//! Meshes are borrowed for the duration of each call; all parallelism is
//! internal (rayon data-parallel passes over faces and vertices) and every
//! operation is synchronous and blocking from the caller's perspective.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod algo;
pub mod config;
pub mod error;
pub mod io;
pub mod layers;
pub mod mesh;
pub mod solver;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::algo::collision::{
        resolve_layer_intersections_by_bottom_layer, CollisionOutcome,
    };
    pub use crate::algo::intersection::{meshes_intersect, track_intersections, IntersectionReport};
    pub use crate::algo::rbf::RbfWarp;
    pub use crate::algo::stitch::MeshStitcher;
    pub use crate::algo::tri_tri::{tri_tri_intersection, TriTriIntersection};
    pub use crate::config::{CollisionConfig, RbfConfig, ReconcileConfig};
    pub use crate::error::{LaminaError, Result};
    pub use crate::layers::{BodyLayers, LayerKind, LayerMasks, MeshVariant, TargetSkinLayers};
    pub use crate::mesh::{
        build_from_quads, build_from_triangles, to_face_vertex, EdgeId, FaceId, HalfEdgeId,
        HalfEdgeMesh, VertexId,
    };
}

// Re-export nalgebra for downstream geometry types.
pub use nalgebra;

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use crate::mesh::primitives::uv_sphere;
    use nalgebra::Point3;

    // The end-to-end scenario: a unit-sphere skin over a wrap whose single
    // pole cap pokes through, everything outside the cap locked.
    #[test]
    fn test_reconciliation_end_to_end() {
        let rings = 14;
        let segments = 18;
        let skin = uv_sphere(Point3::origin(), 1.0, rings, segments).unwrap();

        let mut wrap = uv_sphere(Point3::origin(), 0.95, rings, segments).unwrap();
        let cap_cos = 0.6_f64.cos();
        for vi in 0..wrap.num_vertices() {
            let v = VertexId::new(vi);
            let dir = wrap.position(v).coords.normalize();
            let t = ((dir.z - cap_cos) / (1.0 - cap_cos)).max(0.0);
            wrap.set_position(v, Point3::from(dir * (0.95 + 0.07 * t)));
        }

        let lock_cos = 1.1_f64.cos();
        let locked: Vec<bool> = skin
            .vertex_ids()
            .map(|v| skin.position(v).coords.normalize().z < lock_cos)
            .collect();

        let wrap_before = wrap.positions();
        let outcome = resolve_layer_intersections_by_bottom_layer(
            &skin,
            &mut wrap,
            &locked,
            &CollisionConfig::default(),
        )
        .unwrap();
        assert!(outcome.resolved);
        assert!(outcome.iterations < 30);

        let ignore = vec![false; skin.num_vertices()];
        let report = track_intersections(&skin, &wrap, &ignore, &ignore).unwrap();
        assert_eq!(report.pair_count, 0);

        // Outside the cap both layers kept their exact radii.
        for (vi, (p, q)) in wrap.positions().iter().zip(wrap_before.iter()).enumerate() {
            if locked[vi] {
                assert_eq!(p, q);
                assert!((p.coords.norm() - 0.95).abs() < 1e-12);
            }
        }
        for v in skin.vertex_ids() {
            assert!((skin.position(v).coords.norm() - 1.0).abs() < 1e-12);
        }
    }
}
