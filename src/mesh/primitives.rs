//! Synthetic mesh primitives.
//!
//! Small generators used by tests and benchmarks; the reconciliation
//! pipeline itself operates on meshes supplied by the caller.

use nalgebra::Point3;

use super::builder::build_from_triangles;
use super::halfedge::HalfEdgeMesh;
use crate::error::Result;

/// Build a UV sphere centered at `center` with the given radius.
///
/// `rings` is the number of latitude subdivisions (at least 2) and
/// `segments` the number of longitude subdivisions (at least 3). Faces are
/// oriented counter-clockwise seen from outside.
pub fn uv_sphere(
    center: Point3<f64>,
    radius: f64,
    rings: usize,
    segments: usize,
) -> Result<HalfEdgeMesh> {
    let rings = rings.max(2);
    let segments = segments.max(3);

    let mut vertices = Vec::with_capacity((rings - 1) * segments + 2);

    // North pole, interior rings, south pole.
    vertices.push(center + radius * nalgebra::Vector3::z());
    for i in 1..rings {
        let theta = std::f64::consts::PI * i as f64 / rings as f64;
        let (sin_t, cos_t) = (theta.sin(), theta.cos());
        for j in 0..segments {
            let phi = std::f64::consts::TAU * j as f64 / segments as f64;
            vertices.push(Point3::new(
                center.x + radius * sin_t * phi.cos(),
                center.y + radius * sin_t * phi.sin(),
                center.z + radius * cos_t,
            ));
        }
    }
    vertices.push(center - radius * nalgebra::Vector3::z());

    let ring = |i: usize, j: usize| 1 + (i - 1) * segments + (j % segments);
    let south = vertices.len() - 1;

    let mut faces = Vec::with_capacity(2 * segments * (rings - 1));
    for j in 0..segments {
        faces.push([0, ring(1, j), ring(1, j + 1)]);
    }
    for i in 1..rings - 1 {
        for j in 0..segments {
            let a = ring(i, j);
            let b = ring(i, j + 1);
            let c = ring(i + 1, j + 1);
            let d = ring(i + 1, j);
            faces.push([a, d, c]);
            faces.push([a, c, b]);
        }
    }
    for j in 0..segments {
        faces.push([south, ring(rings - 1, j + 1), ring(rings - 1, j)]);
    }

    build_from_triangles(&vertices, &faces)
}

/// Build a planar triangulated grid of `n` by `n` cells in the XY plane.
pub fn grid(n: usize) -> Result<HalfEdgeMesh> {
    let n = n.max(1);
    let mut vertices = Vec::with_capacity((n + 1) * (n + 1));
    let mut faces = Vec::with_capacity(n * n * 2);

    for j in 0..=n {
        for i in 0..=n {
            vertices.push(Point3::new(i as f64, j as f64, 0.0));
        }
    }

    for j in 0..n {
        for i in 0..n {
            let v00 = j * (n + 1) + i;
            let v10 = v00 + 1;
            let v01 = v00 + (n + 1);
            let v11 = v01 + 1;
            faces.push([v00, v10, v11]);
            faces.push([v00, v11, v01]);
        }
    }

    build_from_triangles(&vertices, &faces)
}
