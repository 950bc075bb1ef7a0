//! Mesh construction from face-vertex lists.
//!
//! Builds the paired half-edge representation: every undirected edge
//! allocates its two half-edges together, so twins and edge ids come for
//! free. Boundary half-edges are created for unpaired directions and linked
//! into boundary loops.

use std::collections::HashMap;

use nalgebra::Point3;

use super::halfedge::{Face, HalfEdge, HalfEdgeMesh};
use super::index::{FaceId, HalfEdgeId, VertexId};
use crate::error::{LaminaError, Result};

/// Build a half-edge mesh from vertices and triangle faces.
///
/// # Example
/// ```
/// use lamina::mesh::build_from_triangles;
/// use nalgebra::Point3;
///
/// let vertices = vec![
///     Point3::new(0.0, 0.0, 0.0),
///     Point3::new(1.0, 0.0, 0.0),
///     Point3::new(0.5, 1.0, 0.0),
/// ];
/// let mesh = build_from_triangles(&vertices, &[[0, 1, 2]]).unwrap();
/// assert_eq!(mesh.num_vertices(), 3);
/// assert_eq!(mesh.num_edges(), 3);
/// ```
pub fn build_from_triangles(
    vertices: &[Point3<f64>],
    faces: &[[usize; 3]],
) -> Result<HalfEdgeMesh> {
    validate(vertices.len(), faces.iter().map(|f| &f[..]))?;
    build(vertices, faces.iter().map(|f| &f[..]), faces.len())
}

/// Build a half-edge mesh from vertices and quad faces.
pub fn build_from_quads(vertices: &[Point3<f64>], faces: &[[usize; 4]]) -> Result<HalfEdgeMesh> {
    validate(vertices.len(), faces.iter().map(|f| &f[..]))?;
    build(vertices, faces.iter().map(|f| &f[..]), faces.len())
}

fn validate<'a>(num_vertices: usize, faces: impl Iterator<Item = &'a [usize]>) -> Result<()> {
    let mut any = false;
    for (fi, face) in faces.enumerate() {
        any = true;
        for (i, &vi) in face.iter().enumerate() {
            if vi >= num_vertices {
                return Err(LaminaError::InvalidVertexIndex { face: fi, vertex: vi });
            }
            if face[i + 1..].contains(&vi) {
                return Err(LaminaError::DegenerateFace { face: fi });
            }
        }
    }
    if !any {
        return Err(LaminaError::EmptyMesh);
    }
    Ok(())
}

fn build<'a>(
    vertices: &[Point3<f64>],
    faces: impl Iterator<Item = &'a [usize]>,
    num_faces: usize,
) -> Result<HalfEdgeMesh> {
    let mut mesh = HalfEdgeMesh::with_capacity(vertices.len(), num_faces);
    for &pos in vertices {
        mesh.add_vertex(pos);
    }

    // Directed edge (a, b) -> half-edge going a -> b. Pairs are allocated
    // on first sight of either direction.
    let mut directed: HashMap<(usize, usize), HalfEdgeId> = HashMap::new();

    for face in faces {
        let n = face.len();
        let face_id = FaceId::new(mesh.num_faces());
        let mut face_hes = Vec::with_capacity(n);

        for i in 0..n {
            let a = face[i];
            let b = face[(i + 1) % n];

            let he = if let Some(&existing) = directed.get(&(a, b)) {
                // Same direction seen before: a third face on this edge.
                if mesh.halfedge(existing).face.is_valid() {
                    return Err(LaminaError::NonManifoldEdge { v0: a, v1: b });
                }
                existing
            } else if let Some(&opposite) = directed.get(&(b, a)) {
                let he = opposite.twin();
                directed.insert((a, b), he);
                he
            } else {
                let he = HalfEdgeId::new(mesh.num_halfedges());
                mesh.halfedges.push(HalfEdge::new());
                mesh.halfedges.push(HalfEdge::new());
                mesh.halfedge_mut(he).origin = VertexId::new(a);
                mesh.halfedge_mut(he.twin()).origin = VertexId::new(b);
                directed.insert((a, b), he);
                he
            };

            if mesh.halfedge(he).face.is_valid() {
                return Err(LaminaError::NonManifoldEdge { v0: a, v1: b });
            }
            face_hes.push(he);
        }

        mesh.faces.push(Face { halfedge: face_hes[0] });
        for i in 0..n {
            let he = face_hes[i];
            let next = face_hes[(i + 1) % n];
            mesh.halfedge_mut(he).face = face_id;
            mesh.halfedge_mut(he).next = next;
            mesh.halfedge_mut(next).prev = he;
            let origin = mesh.origin(he);
            mesh.vertex_mut(origin).halfedge = he;
        }
    }

    link_boundary_loops(&mut mesh);
    fix_boundary_vertex_halfedges(&mut mesh);

    Ok(mesh)
}

/// Link the `next`/`prev` pointers of boundary half-edges into loops.
fn link_boundary_loops(mesh: &mut HalfEdgeMesh) {
    let boundary: Vec<HalfEdgeId> = (0..mesh.num_halfedges())
        .map(HalfEdgeId::new)
        .filter(|&he| mesh.is_boundary_halfedge(he))
        .collect();

    // In a manifold mesh each boundary vertex has exactly one outgoing
    // boundary half-edge.
    let mut outgoing: HashMap<usize, HalfEdgeId> = HashMap::new();
    for &he in &boundary {
        outgoing.insert(mesh.origin(he).index(), he);
    }

    for &he in &boundary {
        let dest = mesh.dest(he).index();
        if let Some(&next_he) = outgoing.get(&dest) {
            mesh.halfedge_mut(he).next = next_he;
            mesh.halfedge_mut(next_he).prev = he;
        }
    }
}

/// Ensure boundary vertices store an outgoing boundary half-edge, making
/// `is_boundary_vertex` O(1).
fn fix_boundary_vertex_halfedges(mesh: &mut HalfEdgeMesh) {
    for vi in 0..mesh.num_vertices() {
        let vid = VertexId::new(vi);
        let start = mesh.vertex(vid).halfedge;
        if !start.is_valid() {
            continue;
        }
        let mut he = start;
        loop {
            if mesh.is_boundary_halfedge(he) {
                mesh.vertex_mut(vid).halfedge = he;
                break;
            }
            he = mesh.next(he.twin());
            if he == start {
                break;
            }
        }
    }
}

/// Convert a triangle mesh back to a face-vertex representation.
pub fn to_face_vertex(mesh: &HalfEdgeMesh) -> (Vec<Point3<f64>>, Vec<[usize; 3]>) {
    let vertices = mesh.positions();
    let faces = mesh
        .face_ids()
        .map(|f| {
            let [v0, v1, v2] = mesh.face_triangle(f);
            [v0.index(), v1.index(), v2.index()]
        })
        .collect();
    (vertices, faces)
}
