//! Selection-aware Laplacian smoothing.
//!
//! Explicit uniform-Laplace smoothing that holds a locked vertex selection
//! (and all boundary vertices) fixed. Used as a post-processing step on
//! decoded layer positions before collision resolution, to take the noise
//! out of regions the decoder reconstructs poorly.

use nalgebra::Point3;
use rayon::prelude::*;

use crate::mesh::{HalfEdgeMesh, VertexId};

/// Smooth all non-locked vertices toward their neighbor centroids.
///
/// Per iteration, every free vertex moves by `lambda` of the way to the
/// centroid of its 1-ring. Boundary vertices are always held fixed, as are
/// vertices marked in `locked`. A `lambda` of 0 or zero iterations is a
/// no-op.
pub fn smooth_locked(mesh: &mut HalfEdgeMesh, locked: &[bool], iterations: usize, lambda: f64) {
    if iterations == 0 || lambda == 0.0 || mesh.num_vertices() == 0 {
        return;
    }

    let fixed: Vec<bool> = mesh
        .vertex_ids()
        .map(|v| locked.get(v.index()).copied().unwrap_or(false) || mesh.is_boundary_vertex(v))
        .collect();

    let num_vertices = mesh.num_vertices();

    for _ in 0..iterations {
        let new_positions: Vec<Point3<f64>> = (0..num_vertices)
            .into_par_iter()
            .map(|vi| {
                let v = VertexId::new(vi);
                let pos = *mesh.position(v);
                if fixed[vi] {
                    return pos;
                }

                let mut centroid = nalgebra::Vector3::zeros();
                let mut count = 0;
                for n in mesh.vertex_neighbors(v) {
                    centroid += mesh.position(n).coords;
                    count += 1;
                }
                if count == 0 {
                    return pos;
                }
                centroid /= count as f64;

                Point3::from(pos.coords + lambda * (centroid - pos.coords))
            })
            .collect();

        for (vi, p) in new_positions.into_iter().enumerate() {
            mesh.set_position(VertexId::new(vi), p);
        }
    }
}
