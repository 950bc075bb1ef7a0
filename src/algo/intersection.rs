//! Mesh-level intersection detection.
//!
//! Two modes over the face pairs of two triangle meshes:
//!
//! - **Boolean**: stop at the first intersecting pair. Face traversal is
//!   sequential in id order, so the answer (and the early exit point) is
//!   deterministic for a given pair of meshes.
//! - **Tracked**: re-evaluate every pair, marking every edge of every
//!   intersecting triangle as a feature edge and counting the pairs. Faces
//!   touching an ignore-masked vertex are skipped entirely. Pair testing is
//!   data-parallel; hit pairs are collected and feature marks applied
//!   afterwards so no two threads write the same edge flag.

use log::debug;
use nalgebra::Point3;
use rayon::prelude::*;

use super::tri_tri::tri_tri_intersection;
use crate::error::{LaminaError, Result};
use crate::mesh::{FaceId, HalfEdgeMesh};

/// Result of a tracked intersection pass.
#[derive(Debug, Clone)]
pub struct IntersectionReport {
    /// Total number of intersecting face pairs.
    pub pair_count: usize,

    /// Per-edge feature flags for the first mesh (length `num_edges`).
    pub features_a: Vec<bool>,

    /// Per-edge feature flags for the second mesh.
    pub features_b: Vec<bool>,
}

impl IntersectionReport {
    /// True if no face pair intersects.
    pub fn is_clean(&self) -> bool {
        self.pair_count == 0
    }
}

/// Gather face corner positions into a flat array for cheap repeated access.
pub(crate) fn gather_triangles(mesh: &HalfEdgeMesh) -> Vec<[Point3<f64>; 3]> {
    mesh.face_ids().map(|f| mesh.face_positions(f)).collect()
}

fn require_triangles(mesh: &HalfEdgeMesh) -> Result<()> {
    if mesh.is_triangle_mesh() {
        Ok(())
    } else {
        Err(LaminaError::NotATriangleMesh)
    }
}

fn check_mask(len: usize, expected: usize) -> Result<()> {
    if len == expected {
        Ok(())
    } else {
        Err(LaminaError::MaskLength { len, expected })
    }
}

/// Test whether any face of `mesh_a` intersects any face of `mesh_b`.
///
/// Returns on the first hit found; both meshes must be triangle meshes.
pub fn meshes_intersect(mesh_a: &HalfEdgeMesh, mesh_b: &HalfEdgeMesh) -> Result<bool> {
    require_triangles(mesh_a)?;
    require_triangles(mesh_b)?;

    let tris_a = gather_triangles(mesh_a);
    let tris_b = gather_triangles(mesh_b);

    for (ia, ta) in tris_a.iter().enumerate() {
        for (ib, tb) in tris_b.iter().enumerate() {
            if tri_tri_intersection(ta, tb).is_some() {
                debug!("intersection between face {} and face {}", ia, ib);
                return Ok(true);
            }
        }
    }
    Ok(false)
}

/// Re-evaluate all face pairs, marking feature edges on both meshes.
///
/// `ignore_a` / `ignore_b` are per-vertex masks; a face is skipped if any
/// of its vertices is masked (used for regions that interpenetrate by
/// construction, e.g. an interior mouth cavity). Returns fresh feature
/// arrays and the total pair count.
pub fn track_intersections(
    mesh_a: &HalfEdgeMesh,
    mesh_b: &HalfEdgeMesh,
    ignore_a: &[bool],
    ignore_b: &[bool],
) -> Result<IntersectionReport> {
    require_triangles(mesh_a)?;
    require_triangles(mesh_b)?;
    check_mask(ignore_a.len(), mesh_a.num_vertices())?;
    check_mask(ignore_b.len(), mesh_b.num_vertices())?;

    let tris_a = gather_triangles(mesh_a);
    let tris_b = gather_triangles(mesh_b);

    let skip_a = skipped_faces(mesh_a, ignore_a);
    let skip_b = skipped_faces(mesh_b, ignore_b);

    // Each mesh-a face is tested independently; hits are combined afterwards.
    let hits: Vec<(usize, usize)> = (0..tris_a.len())
        .into_par_iter()
        .flat_map_iter(|ia| {
            let mut pairs = Vec::new();
            if !skip_a[ia] {
                for ib in 0..tris_b.len() {
                    if skip_b[ib] {
                        continue;
                    }
                    if tri_tri_intersection(&tris_a[ia], &tris_b[ib]).is_some() {
                        pairs.push((ia, ib));
                    }
                }
            }
            pairs
        })
        .collect();

    let mut features_a = vec![false; mesh_a.num_edges()];
    let mut features_b = vec![false; mesh_b.num_edges()];
    for &(ia, ib) in &hits {
        mark_face(mesh_a, FaceId::new(ia), &mut features_a);
        mark_face(mesh_b, FaceId::new(ib), &mut features_b);
    }

    Ok(IntersectionReport {
        pair_count: hits.len(),
        features_a,
        features_b,
    })
}

/// A face is skipped when any of its vertices is ignore-masked.
fn skipped_faces(mesh: &HalfEdgeMesh, ignore: &[bool]) -> Vec<bool> {
    mesh.face_ids()
        .map(|f| mesh.face_vertices(f).any(|v| ignore[v.index()]))
        .collect()
}

fn mark_face(mesh: &HalfEdgeMesh, f: FaceId, features: &mut [bool]) {
    for he in mesh.face_halfedges(f) {
        features[he.edge().index()] = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::build_from_triangles;
    use crate::mesh::primitives::uv_sphere;
    use nalgebra::Point3;

    fn single_triangle(z: f64) -> HalfEdgeMesh {
        let vertices = vec![
            Point3::new(0.0, 0.0, z),
            Point3::new(2.0, 0.0, z),
            Point3::new(0.0, 2.0, z),
        ];
        build_from_triangles(&vertices, &[[0, 1, 2]]).unwrap()
    }

    fn piercing_triangle() -> HalfEdgeMesh {
        let vertices = vec![
            Point3::new(0.5, 0.5, -1.0),
            Point3::new(0.5, 0.5, 1.0),
            Point3::new(0.5, 1.5, 1.0),
        ];
        build_from_triangles(&vertices, &[[0, 1, 2]]).unwrap()
    }

    #[test]
    fn test_boolean_disjoint() {
        let a = single_triangle(0.0);
        let b = single_triangle(3.0);
        assert!(!meshes_intersect(&a, &b).unwrap());
    }

    #[test]
    fn test_boolean_hit() {
        let a = single_triangle(0.0);
        let b = piercing_triangle();
        assert!(meshes_intersect(&a, &b).unwrap());
    }

    #[test]
    fn test_tracked_clean_meshes() {
        let a = uv_sphere(Point3::origin(), 1.0, 6, 8).unwrap();
        let b = uv_sphere(Point3::new(5.0, 0.0, 0.0), 1.0, 6, 8).unwrap();
        let ignore_a = vec![false; a.num_vertices()];
        let ignore_b = vec![false; b.num_vertices()];

        let report = track_intersections(&a, &b, &ignore_a, &ignore_b).unwrap();
        assert!(report.is_clean());
        assert!(report.features_a.iter().all(|&f| !f));
        assert!(report.features_b.iter().all(|&f| !f));
    }

    #[test]
    fn test_tracked_single_crossing_pair() {
        let a = single_triangle(0.0);
        let b = piercing_triangle();
        let ignore_a = vec![false; a.num_vertices()];
        let ignore_b = vec![false; b.num_vertices()];

        let report = track_intersections(&a, &b, &ignore_a, &ignore_b).unwrap();
        assert!(report.pair_count >= 1);

        // Exactly the three edges of each offending face are marked.
        assert_eq!(report.features_a.iter().filter(|&&f| f).count(), 3);
        assert_eq!(report.features_b.iter().filter(|&&f| f).count(), 3);
    }

    #[test]
    fn test_tracked_ignore_mask_suppresses_detection() {
        let a = single_triangle(0.0);
        let b = piercing_triangle();
        let mut ignore_a = vec![false; a.num_vertices()];
        let ignore_b = vec![false; b.num_vertices()];

        // Masking one vertex of the only face of mesh a hides the hit.
        ignore_a[0] = true;
        let report = track_intersections(&a, &b, &ignore_a, &ignore_b).unwrap();
        assert_eq!(report.pair_count, 0);
    }

    #[test]
    fn test_mask_length_checked() {
        let a = single_triangle(0.0);
        let b = piercing_triangle();
        let result = track_intersections(&a, &b, &[false; 1], &[false; 3]);
        assert!(matches!(result, Err(LaminaError::MaskLength { .. })));
    }
}
