//! Radial-basis-function warping.
//!
//! Propagates the deformation of a sparse set of control vertices on a
//! template wrap mesh to an independent, denser mesh. Control centers are
//! chosen by greedy farthest-point sampling (optionally prioritizing a
//! named region), the cubic-kernel system is factorized once per topology,
//! and each `apply` call solves for the weights of the current displacement
//! and evaluates the field at every target vertex.
//!
//! The interpolant is `d(p) = Σ_i w_i ‖p − c_i‖³ + a₀ + A·p`, built per
//! coordinate; the affine tail makes the field reproduce affine motion
//! exactly.

use log::{error, warn};
use nalgebra::{DMatrix, Dyn, Point3, Vector3, LU};
use rayon::prelude::*;

use crate::config::RbfConfig;
use crate::error::{LaminaError, Result};
use crate::mesh::{HalfEdgeMesh, VertexId};

/// A prefactorized RBF deformation field.
///
/// Created once per wrap topology; `apply` may be called every frame with
/// updated wrap positions.
pub struct RbfWarp {
    /// Rest positions of the control centers.
    centers: Vec<Point3<f64>>,
    /// Source vertex ids of the centers on the wrap mesh.
    indices: Vec<usize>,
    /// LU decomposition of the (n+4)×(n+4) kernel-plus-affine system.
    lu: LU<f64, Dyn, Dyn>,
    /// Vertex count of the wrap mesh the centers were sampled from.
    num_wrap_vertices: usize,
    min_centers: usize,
}

impl RbfWarp {
    /// Select `num_centers` control vertices on `wrap` and prefactorize the
    /// deformation system.
    ///
    /// `ignore` masks vertices that must never become centers (regions that
    /// interpenetrate by construction). Fails if fewer than
    /// [`RbfConfig::min_centers`] centers result.
    pub fn init(
        wrap: &HalfEdgeMesh,
        num_centers: usize,
        ignore: &[bool],
        config: &RbfConfig,
    ) -> Result<Self> {
        check_mask(ignore.len(), wrap.num_vertices())?;

        let mut sampler = Sampler::new(wrap);
        sampler.run(num_centers, |v| !ignore[v]);
        Self::from_sampler(sampler, config)
    }

    /// Like [`init`](Self::init), but guarantee dense coverage of a region.
    ///
    /// Sampling runs in two stages: first, a share of the region's vertex
    /// count ([`RbfConfig::priority_ratio`]) is filled using only region
    /// vertices, then `additional_centers` more are sampled without
    /// restriction. Ignored vertices are excluded from both stages.
    pub fn init_prioritized(
        wrap: &HalfEdgeMesh,
        additional_centers: usize,
        ignore: &[bool],
        region: &[bool],
        config: &RbfConfig,
    ) -> Result<Self> {
        check_mask(ignore.len(), wrap.num_vertices())?;
        check_mask(region.len(), wrap.num_vertices())?;

        let region_count = region
            .iter()
            .zip(ignore)
            .filter(|&(&r, &i)| r && !i)
            .count();
        let region_centers = (region_count as f64 * config.priority_ratio) as usize;

        let mut sampler = Sampler::new(wrap);
        sampler.run(region_centers, |v| region[v] && !ignore[v]);
        sampler.run(region_centers + additional_centers, |v| !ignore[v]);
        Self::from_sampler(sampler, config)
    }

    fn from_sampler(sampler: Sampler, config: &RbfConfig) -> Result<Self> {
        let num_wrap_vertices = sampler.num_vertices();
        let (centers, indices) = sampler.take();
        if centers.len() < config.min_centers {
            error!(
                "too few RBF centers: {} of {} required",
                centers.len(),
                config.min_centers
            );
            return Err(LaminaError::TooFewCenters {
                found: centers.len(),
                required: config.min_centers,
            });
        }

        let lu = prefactorize(&centers)?;
        Ok(Self {
            centers,
            indices,
            lu,
            num_wrap_vertices,
            min_centers: config.min_centers,
        })
    }

    /// Number of control centers.
    pub fn num_centers(&self) -> usize {
        self.centers.len()
    }

    /// Source vertex ids of the centers on the wrap mesh.
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Warp `target` by the deformation field defined by the wrap mesh's
    /// current center positions relative to their rest positions.
    ///
    /// Evaluation is independent per target vertex and runs in parallel.
    pub fn apply(&self, wrap: &HalfEdgeMesh, target: &mut HalfEdgeMesh) -> Result<()> {
        if wrap.num_vertices() != self.num_wrap_vertices {
            return Err(LaminaError::LayerMismatch {
                top: self.num_wrap_vertices,
                bottom: wrap.num_vertices(),
            });
        }
        let n = self.centers.len();
        if n < self.min_centers {
            warn!("rbf warp not applied: too few centers ({})", n);
            return Err(LaminaError::TooFewCenters {
                found: n,
                required: self.min_centers,
            });
        }

        // Right-hand side: current center displacement per coordinate,
        // zeros in the four affine rows.
        let mut rhs = DMatrix::zeros(n + 4, 3);
        for (i, (&idx, center)) in self.indices.iter().zip(&self.centers).enumerate() {
            let displacement = wrap.position(VertexId::new(idx)) - center;
            for dim in 0..3 {
                rhs[(i, dim)] = displacement[dim];
            }
        }

        let weights = self.lu.solve(&rhs).ok_or(LaminaError::SingularSystem {
            context: "rbf kernel system",
        })?;

        let displacements: Vec<Vector3<f64>> = (0..target.num_vertices())
            .into_par_iter()
            .map(|vi| {
                let p = *target.position(VertexId::new(vi));
                let mut d = Vector3::zeros();
                for (i, center) in self.centers.iter().enumerate() {
                    let r = (p - center).norm();
                    let k = r * r * r;
                    d.x += weights[(i, 0)] * k;
                    d.y += weights[(i, 1)] * k;
                    d.z += weights[(i, 2)] * k;
                }
                for dim in 0..3 {
                    d[dim] += weights[(n, dim)]
                        + weights[(n + 1, dim)] * p.x
                        + weights[(n + 2, dim)] * p.y
                        + weights[(n + 3, dim)] * p.z;
                }
                d
            })
            .collect();

        for (vi, d) in displacements.into_iter().enumerate() {
            let v = VertexId::new(vi);
            let p = *target.position(v);
            target.set_position(v, p + d);
        }
        Ok(())
    }
}

/// Build and factorize the symmetric (n+4)×(n+4) system: the cubic kernel
/// block bordered by the affine block, zero lower-right.
fn prefactorize(centers: &[Point3<f64>]) -> Result<LU<f64, Dyn, Dyn>> {
    let n = centers.len();
    let mut a = DMatrix::zeros(n + 4, n + 4);

    for i in 0..n {
        for j in 0..n {
            let r = (centers[i] - centers[j]).norm();
            a[(i, j)] = r * r * r;
        }
    }
    for (i, c) in centers.iter().enumerate() {
        a[(i, n)] = 1.0;
        a[(n, i)] = 1.0;
        for dim in 0..3 {
            a[(i, n + 1 + dim)] = c[dim];
            a[(n + 1 + dim, i)] = c[dim];
        }
    }

    Ok(a.lu())
}

fn check_mask(len: usize, expected: usize) -> Result<()> {
    if len == expected {
        Ok(())
    } else {
        Err(LaminaError::MaskLength { len, expected })
    }
}

/// Greedy farthest-point sampler over a mesh's vertices.
///
/// Keeps the selected prefix in-place: entry `k` of `centers`/`indices` is
/// the k-th selected center, and `dist` tracks each remaining vertex's
/// squared distance to the selected set. Sampling starts from vertex 0 and
/// can be resumed with a different acceptance predicate for staged
/// (region-prioritized) selection.
struct Sampler {
    centers: Vec<Point3<f64>>,
    indices: Vec<usize>,
    dist: Vec<f64>,
    selected: usize,
}

impl Sampler {
    fn new(mesh: &HalfEdgeMesh) -> Self {
        Self {
            centers: mesh.positions(),
            indices: (0..mesh.num_vertices()).collect(),
            dist: vec![f64::MAX; mesh.num_vertices()],
            selected: 0,
        }
    }

    /// Select centers until `target_count` are chosen (or the vertices run
    /// out), considering only vertices accepted by the predicate.
    fn run(&mut self, target_count: usize, accept: impl Fn(usize) -> bool) {
        let n = self.centers.len();
        let target = target_count.min(n);
        if target < target_count {
            warn!(
                "farthest-point sampling truncated to {} of {} requested centers",
                target, target_count
            );
        }

        while self.selected < target {
            let p = self.centers[self.selected];
            self.dist[self.selected] = 0.0;
            self.selected += 1;
            if self.selected == target {
                break;
            }

            // Update each candidate's distance to the selected set and
            // pick the farthest as the next center.
            let mut imax = self.selected;
            let mut dmax = 0.0;
            for i in self.selected..n {
                if !accept(self.indices[i]) {
                    continue;
                }
                let d = (p - self.centers[i]).norm_squared();
                if d < self.dist[i] {
                    self.dist[i] = d;
                }
                if self.dist[i] > dmax {
                    dmax = self.dist[i];
                    imax = i;
                }
            }

            self.centers.swap(self.selected, imax);
            self.indices.swap(self.selected, imax);
            self.dist.swap(self.selected, imax);
        }
    }

    fn num_vertices(&self) -> usize {
        self.centers.len()
    }

    fn take(self) -> (Vec<Point3<f64>>, Vec<usize>) {
        let k = self.selected;
        let mut centers = self.centers;
        let mut indices = self.indices;
        centers.truncate(k);
        indices.truncate(k);
        (centers, indices)
    }
}
