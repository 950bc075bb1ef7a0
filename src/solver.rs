//! Weighted least-squares geometry solver.
//!
//! A small projective solver over a shared point buffer: constraints
//! project points onto their feasible sets (the local step), and a global
//! sparse least-squares solve blends the projections by weight. Alternating
//! the two steps a few times relaxes the points toward all constraints at
//! once; the collision resolver runs a handful of passes per detection
//! round rather than solving to convergence.
//!
//! Three constraint types are supported: point closeness, plane collision
//! (push a point past an offset plane) and hinge bending (bound the
//! cotangent curvature measure of an edge flap relative to its rest value).

use log::warn;
use nalgebra::{DVector, Point3, Vector3};
use rayon::prelude::*;

use crate::algo::laplace::cotan;
use crate::algo::sparse::{conjugate_gradient, CsrMatrix};
use crate::error::{LaminaError, Result};

/// A single constraint over the solver's point buffer.
#[derive(Debug, Clone)]
pub enum Constraint {
    /// Pull a point toward a rest position.
    Closeness {
        /// Point index.
        id: usize,
        /// Constraint weight.
        weight: f64,
        /// The position the point is pulled toward.
        rest: Point3<f64>,
    },

    /// Push a point to lie `offset` behind the plane through `anchor` with
    /// the given normal (i.e. to signed distance `-offset`).
    PlaneCollision {
        /// Point index.
        id: usize,
        /// Constraint weight.
        weight: f64,
        /// A point on the collision plane.
        anchor: Point3<f64>,
        /// Unit plane normal (the recorded push direction).
        normal: Vector3<f64>,
        /// Distance behind the plane the point is pushed to.
        offset: f64,
    },

    /// Bound the hinge curvature of an edge flap relative to rest.
    Bending {
        /// The four stencil points: the shared edge, then the two wings.
        ids: [usize; 4],
        /// Constraint weight.
        weight: f64,
        /// Cotangent hinge coefficients (sum to zero).
        coeffs: [f64; 4],
        /// Norm of the hinge vector at rest.
        rest_norm: f64,
        /// Allowed (min, max) factors of the rest norm.
        range: (f64, f64),
    },
}

impl Constraint {
    /// Closeness constraint capturing the point's current position.
    pub fn closeness(id: usize, weight: f64, points: &[Point3<f64>]) -> Self {
        Constraint::Closeness {
            id,
            weight,
            rest: points[id],
        }
    }

    /// Plane-collision constraint pushing `id` behind the plane.
    pub fn plane_collision(
        id: usize,
        weight: f64,
        anchor: Point3<f64>,
        normal: Vector3<f64>,
        offset: f64,
    ) -> Self {
        Constraint::PlaneCollision {
            id,
            weight,
            anchor,
            normal,
            offset,
        }
    }

    /// Bending constraint over an edge flap, with coefficients and rest
    /// curvature captured from the current points.
    ///
    /// `ids` is `[edge start, edge end, wing of the first triangle, wing of
    /// the second]`. Returns `None` for degenerate flaps.
    pub fn bending(
        ids: [usize; 4],
        weight: f64,
        points: &[Point3<f64>],
        range: (f64, f64),
    ) -> Option<Self> {
        let [p0, p1, p2, p3] = ids.map(|i| points[i]);

        // Angles adjacent to the shared edge in both triangles.
        let cot_b0 = cotan(&p0, &p1, &p2);
        let cot_b1 = cotan(&p1, &p0, &p2);
        let cot_g0 = cotan(&p0, &p1, &p3);
        let cot_g1 = cotan(&p1, &p0, &p3);

        let coeffs = [
            cot_b1 + cot_g1,
            cot_b0 + cot_g0,
            -(cot_b0 + cot_b1),
            -(cot_g0 + cot_g1),
        ];
        if coeffs.iter().map(|c| c.abs()).sum::<f64>() < 1e-12 {
            return None;
        }

        let hinge: Vector3<f64> = coeffs
            .iter()
            .zip([p0, p1, p2, p3])
            .map(|(&c, p)| c * p.coords)
            .sum();

        Some(Constraint::Bending {
            ids,
            weight,
            coeffs,
            rest_norm: hinge.norm(),
            range,
        })
    }

    /// The weighted projection targets of this constraint given the current
    /// points: pairs of (point index, weight * target contribution).
    fn project(&self, points: &[Point3<f64>]) -> ProjectionTargets {
        match *self {
            Constraint::Closeness { id, weight, rest } => {
                ProjectionTargets::one(id, weight * rest.coords)
            }
            Constraint::PlaneCollision {
                id,
                weight,
                anchor,
                normal,
                offset,
            } => {
                let p = points[id];
                let d = normal.dot(&(p - anchor));
                let target = if d > -offset {
                    p.coords - (d + offset) * normal
                } else {
                    p.coords
                };
                ProjectionTargets::one(id, weight * target)
            }
            Constraint::Bending {
                ids,
                weight,
                coeffs,
                rest_norm,
                range,
            } => {
                let hinge: Vector3<f64> = coeffs
                    .iter()
                    .zip(ids)
                    .map(|(&c, i)| c * points[i].coords)
                    .sum();
                let norm = hinge.norm();
                let target = if norm > 1e-14 && rest_norm > 1e-14 {
                    let clamped = norm.clamp(range.0 * rest_norm, range.1 * rest_norm);
                    hinge * (clamped / norm)
                } else {
                    hinge
                };
                let mut targets = ProjectionTargets::default();
                for (a, &i) in ids.iter().enumerate() {
                    targets.push(i, weight * coeffs[a] * target);
                }
                targets
            }
        }
    }

    /// Triplet contributions to the global normal matrix.
    fn matrix_triplets(&self, triplets: &mut Vec<(usize, usize, f64)>) {
        match *self {
            Constraint::Closeness { id, weight, .. }
            | Constraint::PlaneCollision { id, weight, .. } => {
                triplets.push((id, id, weight));
            }
            Constraint::Bending {
                ids,
                weight,
                coeffs,
                ..
            } => {
                for a in 0..4 {
                    for b in 0..4 {
                        triplets.push((ids[a], ids[b], weight * coeffs[a] * coeffs[b]));
                    }
                }
            }
        }
    }
}

/// Up to four weighted right-hand-side contributions from one projection.
#[derive(Debug)]
struct ProjectionTargets {
    entries: [(usize, Vector3<f64>); 4],
    len: usize,
}

impl Default for ProjectionTargets {
    fn default() -> Self {
        Self {
            entries: [(0, Vector3::zeros()); 4],
            len: 0,
        }
    }
}

impl ProjectionTargets {
    fn one(id: usize, value: Vector3<f64>) -> Self {
        let mut t = Self::default();
        t.push(id, value);
        t
    }

    fn push(&mut self, id: usize, value: Vector3<f64>) {
        self.entries[self.len] = (id, value);
        self.len += 1;
    }

    fn iter(&self) -> impl Iterator<Item = &(usize, Vector3<f64>)> {
        self.entries[..self.len].iter()
    }
}

/// The projective solver.
pub struct ShapeSolver {
    points: Vec<Point3<f64>>,
    constraints: Vec<Constraint>,
    system: Option<CsrMatrix>,
}

impl ShapeSolver {
    /// Create a solver over a point buffer.
    pub fn new(points: Vec<Point3<f64>>) -> Self {
        Self {
            points,
            constraints: Vec::new(),
            system: None,
        }
    }

    /// The current point buffer.
    pub fn points(&self) -> &[Point3<f64>] {
        &self.points
    }

    /// Add a constraint. Invalidates a previously initialized system.
    pub fn add_constraint(&mut self, constraint: Constraint) {
        self.constraints.push(constraint);
        self.system = None;
    }

    /// Number of constraints added.
    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    /// Assemble the global normal matrix.
    ///
    /// Every point must be touched by at least one constraint, otherwise
    /// the system is singular and an error is returned.
    pub fn initialize(&mut self) -> Result<()> {
        let n = self.points.len();
        let mut triplets = Vec::with_capacity(self.constraints.len() * 4);
        for c in &self.constraints {
            c.matrix_triplets(&mut triplets);
        }

        let mut diag = vec![0.0; n];
        for &(r, c, v) in &triplets {
            if r == c {
                diag[r] += v;
            }
        }
        if diag.iter().any(|&d| d <= 0.0) {
            return Err(LaminaError::SingularSystem {
                context: "constraint system leaves points unconstrained",
            });
        }

        self.system = Some(CsrMatrix::from_triplets(n, n, triplets));
        Ok(())
    }

    /// Run `passes` local-projection / global-solve rounds.
    ///
    /// Requires a prior successful [`initialize`](Self::initialize).
    pub fn solve(&mut self, passes: usize) -> Result<()> {
        let system = self.system.as_ref().ok_or(LaminaError::SingularSystem {
            context: "solver used before initialization",
        })?;
        let n = self.points.len();

        for _ in 0..passes {
            // Local step: project all constraints against current points.
            let projections: Vec<ProjectionTargets> = self
                .constraints
                .par_iter()
                .map(|c| c.project(&self.points))
                .collect();

            let mut rhs = [DVector::zeros(n), DVector::zeros(n), DVector::zeros(n)];
            for targets in &projections {
                for &(id, v) in targets.iter() {
                    rhs[0][id] += v.x;
                    rhs[1][id] += v.y;
                    rhs[2][id] += v.z;
                }
            }

            // Global step: one SPD solve per coordinate, warm-started from
            // the current positions.
            for dim in 0..3 {
                let warm = DVector::from_iterator(n, self.points.iter().map(|p| p[dim]));
                match conjugate_gradient(system, &rhs[dim], Some(&warm), 4 * n.max(32), 1e-9) {
                    Ok(solution) => {
                        for (p, &v) in self.points.iter_mut().zip(solution.iter()) {
                            p[dim] = v;
                        }
                    }
                    Err(err) => {
                        warn!("constraint solve did not converge: {}", err);
                        return Err(err);
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closeness_equilibrium() {
        let points = vec![Point3::new(1.0, 2.0, 3.0), Point3::new(-1.0, 0.0, 4.0)];
        let mut solver = ShapeSolver::new(points.clone());
        solver.add_constraint(Constraint::closeness(0, 1.0, solver.points()));
        solver.add_constraint(Constraint::closeness(1, 5.0, solver.points()));

        solver.initialize().unwrap();
        solver.solve(3).unwrap();

        for (p, q) in solver.points().iter().zip(points.iter()) {
            assert!((p - q).norm() < 1e-8);
        }
    }

    #[test]
    fn test_plane_collision_pushes_point() {
        // A point above the z = 0 plane must end up offset below it.
        let mut solver = ShapeSolver::new(vec![Point3::new(0.0, 0.0, 0.5)]);
        solver.add_constraint(Constraint::plane_collision(
            0,
            100.0,
            Point3::origin(),
            Vector3::z(),
            0.01,
        ));
        solver.initialize().unwrap();
        solver.solve(5).unwrap();

        let z = solver.points()[0].z;
        assert!(
            (z + 0.01).abs() < 1e-6,
            "point should settle at -offset, got z = {}",
            z
        );
    }

    #[test]
    fn test_collision_and_closeness_balance() {
        // With both a strong plane constraint and a weak closeness pull,
        // the point lands between its rest position and the plane target,
        // far closer to the latter.
        let mut solver = ShapeSolver::new(vec![Point3::new(0.0, 0.0, 1.0)]);
        solver.add_constraint(Constraint::closeness(0, 1.0, solver.points()));
        solver.add_constraint(Constraint::plane_collision(
            0,
            100.0,
            Point3::origin(),
            Vector3::z(),
            0.0,
        ));
        solver.initialize().unwrap();
        solver.solve(10).unwrap();

        let z = solver.points()[0].z;
        assert!(z < 0.1, "strong collision should dominate, got z = {}", z);
        assert!(z > -0.1);
    }

    #[test]
    fn test_bending_keeps_planar_flap_planar() {
        // A flat hinge has zero rest curvature; bending plus closeness on
        // the edge should not bend it.
        let points = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.5, 1.0, 0.0),
            Point3::new(0.5, -1.0, 0.0),
        ];
        let mut solver = ShapeSolver::new(points);
        for id in 0..4 {
            solver.add_constraint(Constraint::closeness(id, 1.0, solver.points()));
        }
        let bend =
            Constraint::bending([0, 1, 2, 3], 1.0, solver.points(), (0.9, 1.1)).unwrap();
        solver.add_constraint(bend);

        solver.initialize().unwrap();
        solver.solve(5).unwrap();

        for p in solver.points() {
            assert!(p.z.abs() < 1e-8);
        }
    }

    #[test]
    fn test_unconstrained_point_is_singular() {
        let mut solver = ShapeSolver::new(vec![Point3::origin(), Point3::new(1.0, 0.0, 0.0)]);
        solver.add_constraint(Constraint::closeness(0, 1.0, solver.points()));
        assert!(matches!(
            solver.initialize(),
            Err(LaminaError::SingularSystem { .. })
        ));
    }

    #[test]
    fn test_solve_before_initialize_fails() {
        let mut solver = ShapeSolver::new(vec![Point3::origin()]);
        solver.add_constraint(Constraint::closeness(0, 1.0, solver.points()));
        assert!(solver.solve(1).is_err());
    }
}
