//! Discrete Laplace weights.
//!
//! Cotangent edge weights and mixed Voronoi vertex areas after Meyer et
//! al., "Discrete Differential-Geometry Operators for Triangulated
//! 2-Manifolds". These are the ingredients of the differential coordinates
//! used by the stitcher.

use nalgebra::Point3;

use crate::mesh::{EdgeId, HalfEdgeMesh, VertexId};

/// Cotangents are clamped to cot(~3°) to keep near-degenerate triangles
/// from blowing up the weights.
const COT_BOUND: f64 = 19.1;

/// Cotangent of the angle at `a` in triangle (a, b, c).
pub(crate) fn cotan(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>) -> f64 {
    let ab = b - a;
    let ac = c - a;
    let cross_norm = ab.cross(&ac).norm();
    if cross_norm < 1e-20 {
        0.0
    } else {
        (ab.dot(&ac) / cross_norm).clamp(-COT_BOUND, COT_BOUND)
    }
}

/// Cotangent weight of an edge: half the sum of the cotangents of the two
/// angles opposite it. Boundary edges use the one existing triangle.
pub fn cotan_weight(mesh: &HalfEdgeMesh, e: EdgeId) -> f64 {
    let mut weight = 0.0;
    for side in 0..2 {
        let he = e.halfedge(side);
        if mesh.is_boundary_halfedge(he) {
            continue;
        }
        let p0 = mesh.position(mesh.origin(he));
        let p1 = mesh.position(mesh.dest(he));
        let opp = mesh.position(mesh.dest(mesh.next(he)));
        weight += cotan(opp, p0, p1);
    }
    0.5 * weight
}

/// Mixed Voronoi area of a vertex.
///
/// Uses the circumcentric cell for non-obtuse triangles and falls back to
/// half/quarter barycentric area for obtuse ones, so the per-vertex areas
/// tile the surface.
pub fn voronoi_area(mesh: &HalfEdgeMesh, v: VertexId) -> f64 {
    let mut area = 0.0;
    let p = *mesh.position(v);

    for he in mesh.vertex_halfedges(v) {
        if mesh.is_boundary_halfedge(he) {
            continue;
        }
        let q = *mesh.position(mesh.dest(he));
        let r = *mesh.position(mesh.dest(mesh.next(he)));

        let tri_area = 0.5 * (q - p).cross(&(r - p)).norm();
        if tri_area < 1e-20 {
            continue;
        }

        let cot_p = (q - p).dot(&(r - p));
        let cot_q = (p - q).dot(&(r - q));
        let cot_r = (p - r).dot(&(q - r));

        if cot_p < 0.0 {
            // Obtuse at the vertex itself.
            area += tri_area / 2.0;
        } else if cot_q < 0.0 || cot_r < 0.0 {
            area += tri_area / 4.0;
        } else {
            // Circumcentric (Voronoi-safe) contribution.
            let d_q = (r - p).norm_squared();
            let d_r = (q - p).norm_squared();
            area += (d_q * cotan(&q, &r, &p) + d_r * cotan(&r, &p, &q)) / 8.0;
        }
    }

    area
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::build_from_triangles;
    use crate::mesh::primitives::uv_sphere;
    use nalgebra::Point3;

    #[test]
    fn test_cotan_weight_equilateral() {
        // Two equilateral triangles sharing an edge: both opposite angles
        // are 60°, so the weight is cot(60°) = 1/sqrt(3).
        let h = 3.0_f64.sqrt() / 2.0;
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.5, h, 0.0),
            Point3::new(0.5, -h, 0.0),
        ];
        let mesh = build_from_triangles(&vertices, &[[0, 1, 2], [1, 0, 3]]).unwrap();

        let shared = mesh
            .edge_ids()
            .find(|&e| !mesh.is_boundary_edge(e))
            .unwrap();
        let w = cotan_weight(&mesh, shared);
        assert!((w - 1.0 / 3.0_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_cotan_weight_boundary_edge() {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let mesh = build_from_triangles(&vertices, &[[0, 1, 2]]).unwrap();
        // Edge (1, 2) is opposite the right angle at vertex 0: cot(90°) = 0.
        for e in mesh.edge_ids() {
            let he = e.halfedge(0);
            let (a, b) = (mesh.origin(he).index(), mesh.dest(he).index());
            if (a, b) == (1, 2) || (a, b) == (2, 1) {
                assert!(cotan_weight(&mesh, e).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_voronoi_areas_tile_the_surface() {
        let mesh = uv_sphere(Point3::origin(), 1.0, 10, 14).unwrap();
        let total: f64 = mesh.vertex_ids().map(|v| voronoi_area(&mesh, v)).sum();
        let surface = mesh.surface_area();
        assert!(
            (total - surface).abs() < 1e-9 * surface,
            "mixed areas {} should sum to surface area {}",
            total,
            surface
        );
    }
}
