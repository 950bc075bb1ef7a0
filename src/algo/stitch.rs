//! Laplacian seam stitching.
//!
//! Blends a locally replaced region of a mesh into the rest of the surface
//! without discontinuities. At initialization the stitcher caches the
//! reference pose's discrete Laplace weights and differential (Laplacian)
//! vectors. A stitch solves for free-vertex positions whose differentials
//! match the deformed pose near the locked seam (preserving the replaced
//! region's local detail) and the undeformed pose everywhere else
//! (restoring the rest shape away from the seam).
//!
//! One sparse symmetric solve per coordinate; locked vertices never move.

use log::warn;
use nalgebra::{DVector, Vector3};

use super::laplace::{cotan_weight, voronoi_area};
use super::sparse::{conjugate_gradient, CsrMatrix};
use crate::error::{LaminaError, Result};
use crate::mesh::{HalfEdgeMesh, VertexId};

/// Cached differential state of a reference mesh with a locked vertex set.
///
/// All derived per-vertex and per-edge data is owned by the stitcher, so
/// dropping it restores the mesh-side world to exactly its pre-init state.
/// Re-`init` whenever the locked set, the topology, or the reference rest
/// pose changes materially.
pub struct MeshStitcher {
    num_vertices: usize,
    num_edges: usize,
    num_free: usize,
    locked: Vec<bool>,
    /// Dense index among free vertices; `None` for locked ones.
    free_idx: Vec<Option<usize>>,
    /// Mixed Voronoi area per vertex, from the reference pose.
    vertex_weight: Vec<f64>,
    /// Cotangent weight per edge, from the reference pose.
    edge_weight: Vec<f64>,
    /// Differential vectors of the undeformed reference pose.
    undeformed: Vec<Vector3<f64>>,
}

impl MeshStitcher {
    /// Capture the reference mesh's differential state.
    ///
    /// `locked` marks the vertices held fixed by every stitch (the
    /// non-replaceable part of the surface).
    ///
    /// # Panics
    ///
    /// Panics if the number of free vertices is not strictly less than the
    /// vertex count. An all-free mesh means the locked selection did not
    /// apply to this mesh at all; continuing would silently produce a
    /// floating, unanchored solve, so this is treated as a programmer or
    /// data error rather than a runtime condition.
    pub fn init(mesh: &HalfEdgeMesh, locked: &[bool]) -> Self {
        assert_eq!(
            locked.len(),
            mesh.num_vertices(),
            "locked mask length must match vertex count"
        );

        let vertex_weight: Vec<f64> = mesh.vertex_ids().map(|v| voronoi_area(mesh, v)).collect();
        let edge_weight: Vec<f64> = mesh.edge_ids().map(|e| cotan_weight(mesh, e)).collect();
        let undeformed = compute_differentials(mesh, &vertex_weight, &edge_weight);

        let mut free_idx = vec![None; mesh.num_vertices()];
        let mut num_free = 0;
        for (vi, &is_locked) in locked.iter().enumerate() {
            if !is_locked {
                free_idx[vi] = Some(num_free);
                num_free += 1;
            }
        }

        assert!(
            num_free < mesh.num_vertices(),
            "stitcher: number of free vertices ({}) must be less than the vertex count ({})",
            num_free,
            mesh.num_vertices()
        );

        Self {
            num_vertices: mesh.num_vertices(),
            num_edges: mesh.num_edges(),
            num_free,
            locked: locked.to_vec(),
            free_idx,
            vertex_weight,
            edge_weight,
            undeformed,
        }
    }

    /// Number of free (non-locked) vertices.
    pub fn num_free_vertices(&self) -> usize {
        self.num_free
    }

    /// Blend the mesh's current (deformed) pose with the cached reference.
    ///
    /// May be called repeatedly without re-`init`. The mesh must have the
    /// same topology as the reference it was initialized with.
    pub fn stitch(&self, mesh: &mut HalfEdgeMesh) -> Result<()> {
        if mesh.num_vertices() != self.num_vertices || mesh.num_edges() != self.num_edges {
            return Err(LaminaError::LayerMismatch {
                top: self.num_vertices,
                bottom: mesh.num_vertices(),
            });
        }

        let deformed = compute_differentials(mesh, &self.vertex_weight, &self.edge_weight);

        // Per-vertex target: keep the deformed detail at and next to the
        // seam, restore the reference detail elsewhere.
        let target: Vec<Vector3<f64>> = mesh
            .vertex_ids()
            .map(|v| {
                let near_seam = self.locked[v.index()]
                    || mesh.vertex_neighbors(v).any(|n| self.locked[n.index()]);
                if near_seam {
                    deformed[v.index()]
                } else {
                    self.undeformed[v.index()]
                }
            })
            .collect();

        // Assemble the free-vertex Laplace system, negated so it is
        // positive definite: (Σ_j w_ij) x_i − Σ_j∈free w_ij x_j
        //   = −target_i / a_i + Σ_j∈locked w_ij x_j.
        let n = self.num_free;
        let mut triplets: Vec<(usize, usize, f64)> = Vec::with_capacity(n * 7);
        let mut rhs = [DVector::zeros(n), DVector::zeros(n), DVector::zeros(n)];

        for v in mesh.vertex_ids() {
            let Some(i) = self.free_idx[v.index()] else { continue };

            let area = self.vertex_weight[v.index()];
            let scaled = if area > 1e-20 {
                target[v.index()] / area
            } else {
                Vector3::zeros()
            };
            for dim in 0..3 {
                rhs[dim][i] = -scaled[dim];
            }

            let mut weight_sum = 0.0;
            for he in mesh.vertex_halfedges(v) {
                let neighbor = mesh.dest(he);
                let w = self.edge_weight[he.edge().index()];
                weight_sum += w;

                match self.free_idx[neighbor.index()] {
                    Some(j) => triplets.push((i, j, -w)),
                    None => {
                        // Locked neighbor: its fixed position moves to the
                        // right-hand side.
                        let x = mesh.position(neighbor);
                        for dim in 0..3 {
                            rhs[dim][i] += w * x[dim];
                        }
                    }
                }
            }
            triplets.push((i, i, weight_sum));
        }

        let system = CsrMatrix::from_triplets(n, n, triplets);

        // Solve per coordinate, warm-started from the current pose.
        let mut solutions = Vec::with_capacity(3);
        for (dim, b) in rhs.iter().enumerate() {
            let warm = DVector::from_iterator(
                n,
                mesh.vertex_ids()
                    .filter(|v| self.free_idx[v.index()].is_some())
                    .map(|v| mesh.position(v)[dim]),
            );
            let x = conjugate_gradient(&system, b, Some(&warm), 8 * n.max(32), 1e-10)
                .map_err(|err| {
                    warn!("stitching solve failed: {}", err);
                    err
                })?;
            solutions.push(x);
        }

        for vi in 0..self.num_vertices {
            if let Some(i) = self.free_idx[vi] {
                let v = VertexId::new(vi);
                let mut p = *mesh.position(v);
                for dim in 0..3 {
                    p[dim] = solutions[dim][i];
                }
                mesh.set_position(v, p);
            }
        }
        Ok(())
    }
}

/// Differential (Laplacian) vectors at every vertex using cached weights:
/// `a_v * Σ_j w_vj (x_j − x_v)`.
fn compute_differentials(
    mesh: &HalfEdgeMesh,
    vertex_weight: &[f64],
    edge_weight: &[f64],
) -> Vec<Vector3<f64>> {
    mesh.vertex_ids()
        .map(|v| {
            let p = mesh.position(v);
            let mut l = Vector3::zeros();
            let mut weight_sum = 0.0;
            for he in mesh.vertex_halfedges(v) {
                let w = edge_weight[he.edge().index()];
                l += w * mesh.position(mesh.dest(he)).coords;
                weight_sum += w;
            }
            (l - weight_sum * p.coords) * vertex_weight[v.index()]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::primitives::uv_sphere;
    use nalgebra::Point3;

    fn sphere() -> HalfEdgeMesh {
        uv_sphere(Point3::origin(), 1.0, 12, 16).unwrap()
    }

    fn cap_locked(mesh: &HalfEdgeMesh, z_above: f64) -> Vec<bool> {
        mesh.vertex_ids()
            .map(|v| mesh.position(v).z > z_above)
            .collect()
    }

    #[test]
    #[should_panic(expected = "free vertices")]
    fn test_all_free_is_fatal() {
        let mesh = sphere();
        let locked = vec![false; mesh.num_vertices()];
        let _ = MeshStitcher::init(&mesh, &locked);
    }

    #[test]
    fn test_roundtrip_without_deformation() {
        let mut mesh = sphere();
        let locked = cap_locked(&mesh, 0.6);
        assert!(locked.iter().any(|&l| l));

        let stitcher = MeshStitcher::init(&mesh, &locked);
        let before = mesh.positions();

        stitcher.stitch(&mut mesh).unwrap();

        for (p, q) in mesh.positions().iter().zip(before.iter()) {
            assert!(
                (p - q).norm() < 1e-6,
                "undeformed stitch must reproduce the pose"
            );
        }
    }

    #[test]
    fn test_locked_vertices_never_move() {
        let mut mesh = sphere();
        let locked = cap_locked(&mesh, 0.6);
        let stitcher = MeshStitcher::init(&mesh, &locked);

        // Deform the locked cap (the replaced region).
        for vi in 0..mesh.num_vertices() {
            if locked[vi] {
                let v = VertexId::new(vi);
                let p = *mesh.position(v) + Vector3::new(0.0, 0.0, 0.08);
                mesh.set_position(v, p);
            }
        }
        let before = mesh.positions();

        stitcher.stitch(&mut mesh).unwrap();

        for (vi, (p, q)) in mesh.positions().iter().zip(before.iter()).enumerate() {
            if locked[vi] {
                assert_eq!(p, q, "locked vertex {} moved", vi);
            }
        }
    }

    #[test]
    fn test_detail_restored_away_from_seam() {
        let mut mesh = sphere();
        let locked = cap_locked(&mesh, 0.6);
        let stitcher = MeshStitcher::init(&mesh, &locked);

        let vertex_weight: Vec<f64> = mesh.vertex_ids().map(|v| voronoi_area(&mesh, v)).collect();
        let edge_weight: Vec<f64> = mesh.edge_ids().map(|e| cotan_weight(&mesh, e)).collect();
        let undeformed = compute_differentials(&mesh, &vertex_weight, &edge_weight);

        // Move the cap and perturb the free region; the stitch must restore
        // the rest-pose differentials away from the seam.
        for vi in 0..mesh.num_vertices() {
            let v = VertexId::new(vi);
            let p = *mesh.position(v);
            let p = if locked[vi] {
                p + Vector3::new(0.0, 0.0, 0.08)
            } else {
                p + 0.01 * Vector3::new(p.y, -p.x, p.z)
            };
            mesh.set_position(v, p);
        }

        stitcher.stitch(&mut mesh).unwrap();

        // Vertices two or more rings away from any locked vertex.
        let near_locked: Vec<bool> = mesh
            .vertex_ids()
            .map(|v| {
                locked[v.index()]
                    || mesh.vertex_neighbors(v).any(|n| {
                        locked[n.index()]
                            || mesh.vertex_neighbors(n).any(|m| locked[m.index()])
                    })
            })
            .collect();

        let after = compute_differentials(&mesh, &vertex_weight, &edge_weight);
        for v in mesh.vertex_ids() {
            if !near_locked[v.index()] {
                let diff = (after[v.index()] - undeformed[v.index()]).norm();
                assert!(
                    diff < 1e-6,
                    "vertex {} differential off by {}",
                    v.index(),
                    diff
                );
            }
        }
    }
}
