//! Iterative layer collision resolution.
//!
//! Removes interpenetration between two co-indexed mesh layers by moving
//! the bottom layer. Collisions are found with local triangle-triangle
//! tests restricted to precomputed 2-ring face neighborhoods of the top
//! layer, then a constraint solve pushes the colliding bottom vertices back
//! behind the top surface while closeness and bending constraints keep the
//! rest of the layer stable. Detection and solving alternate until no
//! collision remains or the iteration cap is reached.
//!
//! Both layers must share vertex indexing (same topology, same index
//! space); the top layer is never modified and locked vertices of the
//! bottom layer are returned bit-identical.

use log::{debug, error, warn};
use nalgebra::{Point3, Vector3};
use rayon::prelude::*;

use super::intersection::gather_triangles;
use super::tri_tri::tri_tri_intersection;
use crate::config::CollisionConfig;
use crate::error::{LaminaError, Result};
use crate::mesh::{FaceId, HalfEdgeMesh, VertexId};
use crate::solver::{Constraint, ShapeSolver};

/// Outcome of a resolution run.
#[derive(Debug, Clone, Copy)]
pub struct CollisionOutcome {
    /// Number of detect/solve iterations executed.
    pub iterations: usize,

    /// True if a detection pass found zero collisions before the cap.
    pub resolved: bool,

    /// Collision count of the last detection pass that found any.
    pub last_collision_count: usize,
}

/// Resolve interpenetrations between `top` and `bottom` by deforming the
/// bottom layer.
///
/// `locked` marks vertices (in the shared index space) that must not move;
/// it anchors the solve and must contain at least one vertex. Reaching the
/// iteration cap with collisions remaining is not an error: the outcome
/// reports `resolved = false` and the meshes hold the best-effort result.
pub fn resolve_layer_intersections_by_bottom_layer(
    top: &HalfEdgeMesh,
    bottom: &mut HalfEdgeMesh,
    locked: &[bool],
    config: &CollisionConfig,
) -> Result<CollisionOutcome> {
    if locked.is_empty() || !locked.iter().any(|&l| l) {
        error!("resolve_layer_intersections: no locked vertices defined");
        return Err(LaminaError::MissingLockedSelection);
    }
    if locked.len() != top.num_vertices() {
        return Err(LaminaError::MaskLength {
            len: locked.len(),
            expected: top.num_vertices(),
        });
    }
    if top.num_vertices() != bottom.num_vertices() {
        error!(
            "resolve_layer_intersections: layer vertex counts differ ({} vs {})",
            top.num_vertices(),
            bottom.num_vertices()
        );
        return Err(LaminaError::LayerMismatch {
            top: top.num_vertices(),
            bottom: bottom.num_vertices(),
        });
    }
    if !top.is_triangle_mesh() || !bottom.is_triangle_mesh() {
        return Err(LaminaError::NotATriangleMesh);
    }

    // Faces where every vertex is locked can never move; skip them for the
    // entire run.
    let faces_to_check: Vec<FaceId> = top
        .face_ids()
        .filter(|&f| !top.face_vertices(f).all(|v| locked[v.index()]))
        .collect();

    // 2-ring face neighborhoods on the top layer, used as the search window
    // into the bottom layer (the layers are co-indexed).
    let neighborhoods: Vec<Vec<FaceId>> = faces_to_check
        .par_iter()
        .map(|&f| face_neighborhood(top, f, 2))
        .collect();

    // Simulation indices: frozen vertices (locked with fully locked 1-ring)
    // are excluded from the solve entirely.
    let mut sim_idx: Vec<Option<usize>> = vec![None; top.num_vertices()];
    let mut num_sim = 0;
    for v in top.vertex_ids() {
        let frozen =
            locked[v.index()] && top.vertex_neighbors(v).all(|n| locked[n.index()]);
        if !frozen {
            sim_idx[v.index()] = Some(num_sim);
            num_sim += 1;
        }
    }

    let top_tris = gather_triangles(top);

    let mut iterations = 0;
    let mut resolved = false;
    let mut last_collision_count = 0;

    while iterations < config.max_iterations {
        let bottom_tris = gather_triangles(bottom);

        // Detection pass: each candidate face independently scans its
        // neighborhood against the current bottom positions, stopping at
        // its first hit.
        let hits: Vec<Option<Vector3<f64>>> = faces_to_check
            .par_iter()
            .zip(&neighborhoods)
            .map(|(&f, neighbors)| {
                let top_tri = &top_tris[f.index()];
                let bottom_normal = triangle_normal(&bottom_tris[f.index()]);
                neighbors
                    .iter()
                    .any(|&fi| tri_tri_intersection(top_tri, &bottom_tris[fi.index()]).is_some())
                    .then_some(bottom_normal)
            })
            .collect();

        let mut non_colliding = vec![true; num_sim];
        let mut push_normal: Vec<Vector3<f64>> = vec![Vector3::zeros(); top.num_vertices()];
        let mut collision_count = 0;

        for (&f, hit) in faces_to_check.iter().zip(&hits) {
            if let Some(normal) = hit {
                collision_count += 1;
                for v in top.face_vertices(f) {
                    if let Some(si) = sim_idx[v.index()] {
                        non_colliding[si] = false;
                    }
                    push_normal[v.index()] = *normal;
                }
            }
        }

        if collision_count == 0 {
            resolved = true;
            break;
        }
        last_collision_count = collision_count;
        debug!(
            "collision iteration {}: {} colliding faces",
            iterations, collision_count
        );

        // Let the neighborhood of the colliding set move too, so the
        // deformation has room to distribute.
        for _ in 0..config.expansion_rings {
            let mut newly_movable = Vec::new();
            for v in top.vertex_ids() {
                let Some(si) = sim_idx[v.index()] else { continue };
                if non_colliding[si] {
                    continue;
                }
                for n in top.vertex_neighbors(v) {
                    if !locked[n.index()] {
                        if let Some(ni) = sim_idx[n.index()] {
                            newly_movable.push(ni);
                        }
                    }
                }
            }
            for ni in newly_movable {
                non_colliding[ni] = false;
            }
        }

        // Gather the bottom layer's simulation points and build the
        // constraint system for this round.
        let mut points = vec![Point3::origin(); num_sim];
        for v in bottom.vertex_ids() {
            if let Some(si) = sim_idx[v.index()] {
                points[si] = *bottom.position(v);
            }
        }
        let mut solver = ShapeSolver::new(points);

        for v in top.vertex_ids() {
            let Some(si) = sim_idx[v.index()] else { continue };
            if non_colliding[si] {
                // Keep the bulk of the layer where it is; locked vertices
                // anchor the system with a much stronger pull.
                let weight = if locked[v.index()] {
                    config.locked_weight
                } else {
                    config.free_weight
                };
                solver.add_constraint(Constraint::closeness(si, weight, solver.points()));
            } else {
                // Escalate the corrective force on every iteration that
                // failed to resolve.
                let weight = (iterations + 1) as f64 * config.collision_weight_step;
                solver.add_constraint(Constraint::plane_collision(
                    si,
                    weight,
                    *top.position(v),
                    push_normal[v.index()],
                    config.push_offset,
                ));
            }
        }

        // Regularize the bottom layer's shape: a bending constraint on
        // every interior edge flap without locked vertices.
        for e in bottom.edge_ids() {
            if bottom.is_boundary_edge(e) {
                continue;
            }
            let h0 = e.halfedge(0);
            let h1 = e.halfedge(1);
            let flap = [
                bottom.dest(h0),
                bottom.dest(h1),
                bottom.dest(bottom.next(h0)),
                bottom.dest(bottom.next(h1)),
            ];
            if flap.iter().any(|v| locked[v.index()]) {
                continue;
            }
            let ids = flap.map(|v| sim_idx[v.index()].expect("free vertices have sim indices"));
            if let Some(c) = Constraint::bending(ids, 1.0, solver.points(), config.bend_range) {
                solver.add_constraint(c);
            }
        }

        match solver.initialize() {
            Ok(()) => {
                if let Err(err) = solver.solve(config.solver_passes) {
                    // Best effort: keep whatever positions the passes
                    // produced and continue iterating.
                    warn!("collision solve failed: {}", err);
                }
                for vi in 0..bottom.num_vertices() {
                    if locked[vi] {
                        continue;
                    }
                    if let Some(si) = sim_idx[vi] {
                        bottom.set_position(VertexId::new(vi), solver.points()[si]);
                    }
                }
            }
            Err(err) => {
                error!("cannot initialize collision constraint solver: {}", err);
            }
        }

        iterations += 1;
    }

    if !resolved {
        warn!(
            "collision resolution hit the iteration cap ({}) with {} collisions remaining",
            config.max_iterations, last_collision_count
        );
    }

    Ok(CollisionOutcome {
        iterations,
        resolved,
        last_collision_count,
    })
}

/// Breadth-first 2-hop vertex expansion around a face, collecting all faces
/// incident to the expanded vertex set.
fn face_neighborhood(mesh: &HalfEdgeMesh, f: FaceId, hops: usize) -> Vec<FaceId> {
    let mut vertices: Vec<VertexId> = mesh.face_vertices(f).collect();
    let mut seen: Vec<VertexId> = vertices.clone();

    for _ in 0..hops {
        let mut next = Vec::new();
        for &v in &vertices {
            for n in mesh.vertex_neighbors(v) {
                if !seen.contains(&n) {
                    seen.push(n);
                    next.push(n);
                }
            }
        }
        vertices = next;
    }

    let mut faces: Vec<FaceId> = Vec::new();
    for &v in &seen {
        for fi in mesh.vertex_faces(v) {
            if !faces.contains(&fi) {
                faces.push(fi);
            }
        }
    }
    faces
}

fn triangle_normal(tri: &[Point3<f64>; 3]) -> Vector3<f64> {
    let n = (tri[0] - tri[2]).cross(&(tri[1] - tri[2]));
    let len = n.norm();
    if len > 1e-20 {
        n / len
    } else {
        Vector3::zeros()
    }
}
