//! Mesh layer ownership and the reconciliation pipeline.
//!
//! A body model owns three nested layers sharing one body frame: the
//! high-resolution bones, an inner wrap (a reduced proxy of the skeleton
//! volume) and the visible skin. Decoded vertex positions land on the wrap
//! and skin; [`BodyLayers::reconcile`] then produces self-consistent,
//! non-intersecting geometry:
//!
//! 1. assemble the full-resolution wrap from the skin and the reduced wrap
//!    through the full-to-cutoff index map,
//! 2. shrink it along vertex normals where the per-vertex weighting says
//!    the warp handles the cut-off regions poorly,
//! 3. resolve skin/wrap interpenetration by deforming the wrap,
//! 4. write the resolved positions back to the reduced wrap, and
//! 5. warp the bones by the RBF field of the wrap's displacement from its
//!    template.
//!
//! A replacement skin region (a target head) is blended in separately by
//! the seam stitcher. The small closed set of model variants is a tagged
//! union ([`MeshVariant`]), not an inheritance hierarchy.

use log::{error, warn};

use crate::algo::collision::{resolve_layer_intersections_by_bottom_layer, CollisionOutcome};
use crate::algo::rbf::RbfWarp;
use crate::algo::stitch::MeshStitcher;
use crate::config::ReconcileConfig;
use crate::error::{LaminaError, Result};
use crate::io::{read_selection_mask, read_vertex_weights, IndexMap};
use crate::mesh::{HalfEdgeMesh, VertexId};

/// The three layers of a body model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerKind {
    /// High-resolution bone geometry, posed by the RBF warp.
    Bones,
    /// The reduced inner wrap layer.
    Wrap,
    /// The outer, visible skin layer.
    Skin,
}

/// Per-vertex masks and maps driving the pipeline, all in skin index space
/// (the skin and the full wrap template are co-indexed).
#[derive(Debug, Clone)]
pub struct LayerMasks {
    /// Vertices held fixed during collision resolution.
    pub locked: Vec<bool>,
    /// Vertices excluded from intersection detection and center sampling.
    pub ignore: Vec<bool>,
    /// Region prioritized during RBF center sampling.
    pub region: Vec<bool>,
    /// Locked set for seam stitching (the non-replaceable surface).
    pub stitch_locked: Vec<bool>,
    /// Shrink-along-normal weighting, if available.
    pub shrink: Option<Vec<f64>>,
    /// Full-resolution to reduced-wrap vertex map.
    pub full_to_cutoff: IndexMap,
}

impl LayerMasks {
    /// Load all masks from the configured data directory.
    ///
    /// Missing or malformed files degrade the affected feature (logged)
    /// instead of failing construction: an absent locked set surfaces
    /// later as a collision-resolver error, an absent weighting simply
    /// skips the shrink step.
    pub fn load(config: &ReconcileConfig, num_skin_vertices: usize) -> Self {
        let mask = |name: &str| -> Vec<bool> {
            read_selection_mask(&config.data_path(name), num_skin_vertices).unwrap_or_else(|err| {
                warn!("selection {} unavailable: {}", name, err);
                vec![false; num_skin_vertices]
            })
        };

        let shrink = read_vertex_weights(
            &config.data_path(&config.shrink_weighting),
            num_skin_vertices,
        )
        .map_err(|err| {
            warn!("shrink weighting unavailable: {}", err);
            err
        })
        .ok();

        let full_to_cutoff = IndexMap::from_file(&config.data_path(&config.index_map))
            .unwrap_or_else(|err| {
                warn!("full-to-cutoff map unavailable: {}", err);
                IndexMap::from_entries(&[])
            });

        Self {
            locked: mask(&config.locked_selection),
            ignore: mask(&config.ignore_selection),
            region: mask(&config.region_selection),
            stitch_locked: mask(&config.stitch_selection),
            shrink,
            full_to_cutoff,
        }
    }
}

/// Summary of one reconciliation run.
#[derive(Debug, Clone, Copy)]
pub struct ReconcileReport {
    /// Outcome of the collision resolution step.
    pub collision: CollisionOutcome,
    /// True if the bones layer was warped by the RBF field.
    pub bones_warped: bool,
}

/// The body model: three layers, their templates, masks, and cached
/// solver state.
pub struct BodyLayers {
    wrap: HalfEdgeMesh,
    skin: HalfEdgeMesh,
    bones: HalfEdgeMesh,
    template_bones: HalfEdgeMesh,
    template_wrap: HalfEdgeMesh,
    masks: LayerMasks,
    rbf: Option<RbfWarp>,
    seam_stitcher: Option<MeshStitcher>,
    config: ReconcileConfig,
}

impl BodyLayers {
    /// Assemble a body model from its meshes and masks.
    ///
    /// `template_wrap` is the full-resolution wrap template, co-indexed
    /// with the skin; `wrap` is the reduced wrap addressed through the
    /// full-to-cutoff map. The bones layer starts at its template pose.
    pub fn new(
        wrap: HalfEdgeMesh,
        skin: HalfEdgeMesh,
        template_bones: HalfEdgeMesh,
        template_wrap: HalfEdgeMesh,
        masks: LayerMasks,
        config: ReconcileConfig,
    ) -> Result<Self> {
        if skin.num_vertices() != template_wrap.num_vertices() {
            error!(
                "skin ({}) and full wrap template ({}) must be co-indexed",
                skin.num_vertices(),
                template_wrap.num_vertices()
            );
            return Err(LaminaError::LayerMismatch {
                top: skin.num_vertices(),
                bottom: template_wrap.num_vertices(),
            });
        }
        if let Some(expected) = config.wrap_vertices {
            if wrap.num_vertices() != expected {
                warn!(
                    "wrap vertex count {} does not match expected {}",
                    wrap.num_vertices(),
                    expected
                );
            }
        }
        if let Some(expected) = config.skin_vertices {
            if skin.num_vertices() != expected {
                warn!(
                    "skin vertex count {} does not match expected {}",
                    skin.num_vertices(),
                    expected
                );
            }
        }

        let bones = template_bones.clone();
        Ok(Self {
            wrap,
            skin,
            bones,
            template_bones,
            template_wrap,
            masks,
            rbf: None,
            seam_stitcher: None,
            config,
        })
    }

    /// Borrow a layer.
    pub fn layer(&self, kind: LayerKind) -> &HalfEdgeMesh {
        match kind {
            LayerKind::Bones => &self.bones,
            LayerKind::Wrap => &self.wrap,
            LayerKind::Skin => &self.skin,
        }
    }

    /// Vertex count of a layer.
    pub fn vertex_count(&self, kind: LayerKind) -> usize {
        self.layer(kind).num_vertices()
    }

    /// Replace a layer mesh. The new mesh must keep the layer's vertex
    /// count; masks live on the model, so they carry over unchanged.
    pub fn set_layer(&mut self, kind: LayerKind, mesh: HalfEdgeMesh) -> Result<()> {
        let expected = self.vertex_count(kind);
        if mesh.num_vertices() != expected {
            return Err(LaminaError::LayerMismatch {
                top: expected,
                bottom: mesh.num_vertices(),
            });
        }
        match kind {
            LayerKind::Bones => self.bones = mesh,
            LayerKind::Wrap => self.wrap = mesh,
            LayerKind::Skin => self.skin = mesh,
        }
        Ok(())
    }

    /// Update one layer's positions from a flat decoded buffer.
    pub fn update_layer_points(&mut self, kind: LayerKind, data: &[f64]) -> bool {
        let mesh = match kind {
            LayerKind::Bones => &mut self.bones,
            LayerKind::Wrap => &mut self.wrap,
            LayerKind::Skin => &mut self.skin,
        };
        let ok = mesh.set_positions_flat(data);
        if !ok {
            warn!(
                "layer point update rejected: {} values for {} vertices",
                data.len(),
                mesh.num_vertices()
            );
        }
        ok
    }

    /// Update wrap and skin from one concatenated decoded buffer
    /// (wrap positions first, then skin).
    pub fn update_decoded_points(&mut self, data: &[f64]) -> Result<()> {
        let wrap_len = self.wrap.num_vertices() * 3;
        let skin_len = self.skin.num_vertices() * 3;
        if data.len() != wrap_len + skin_len {
            return Err(LaminaError::MaskLength {
                len: data.len(),
                expected: wrap_len + skin_len,
            });
        }
        self.wrap.set_positions_flat(&data[..wrap_len]);
        self.skin.set_positions_flat(&data[wrap_len..]);
        Ok(())
    }

    /// Run the full reconciliation pipeline for the current layer poses.
    pub fn reconcile(&mut self) -> Result<ReconcileReport> {
        // The deformation field is prefactorized lazily, once per topology.
        if self.rbf.is_none() {
            match RbfWarp::init_prioritized(
                &self.template_wrap,
                self.config.rbf.additional_centers,
                &self.masks.ignore,
                &self.masks.region,
                &self.config.rbf,
            ) {
                Ok(warp) => self.rbf = Some(warp),
                Err(err) => warn!("rbf warp unavailable, bones stay at template: {}", err),
            }
        }

        // Bones restart from the template pose every run.
        self.bones = self.template_bones.clone();

        // Full wrap: skin positions with every mapped vertex overwritten
        // from the reduced wrap.
        let mut full_wrap = self.skin.clone();
        for vi in 0..full_wrap.num_vertices() {
            if let Some(m) = self.masks.full_to_cutoff.get(vi) {
                if m < self.wrap.num_vertices() {
                    full_wrap.set_position(VertexId::new(vi), *self.wrap.position(VertexId::new(m)));
                } else {
                    warn!("full-to-cutoff entry {} exceeds wrap vertex count", m);
                }
            }
        }

        // Pull the wrap inward where the cut-off regions need it.
        if let Some(shrink) = &self.masks.shrink {
            let normals = full_wrap.vertex_normals();
            for vi in 0..full_wrap.num_vertices() {
                let v = VertexId::new(vi);
                let p = *full_wrap.position(v) - shrink[vi] * normals[vi];
                full_wrap.set_position(v, p);
            }
        }

        let collision = resolve_layer_intersections_by_bottom_layer(
            &self.skin,
            &mut full_wrap,
            &self.masks.locked,
            &self.config.collision,
        )?;

        // Resolved positions go back to the reduced wrap.
        for vi in 0..full_wrap.num_vertices() {
            if let Some(m) = self.masks.full_to_cutoff.get(vi) {
                if m < self.wrap.num_vertices() {
                    self.wrap
                        .set_position(VertexId::new(m), *full_wrap.position(VertexId::new(vi)));
                }
            }
        }

        // Finally pose the bones inside the resolved wrap.
        let bones_warped = match &self.rbf {
            Some(warp) => match warp.apply(&full_wrap, &mut self.bones) {
                Ok(()) => true,
                Err(err) => {
                    warn!("bone warp skipped: {}", err);
                    false
                }
            },
            None => false,
        };

        Ok(ReconcileReport {
            collision,
            bones_warped,
        })
    }

    /// Adopt a replacement skin and prepare the seam stitcher for it.
    ///
    /// The target's positions overwrite the skin layer; subsequent decoded
    /// updates call [`stitch_seam`](Self::stitch_seam) to blend the seam.
    pub fn init_seam_stitcher(&mut self, target: &TargetSkinLayers) -> Result<()> {
        if target.vertex_count() != self.skin.num_vertices() {
            error!(
                "target skin has {} vertices, body skin has {}",
                target.vertex_count(),
                self.skin.num_vertices()
            );
            return Err(LaminaError::LayerMismatch {
                top: self.skin.num_vertices(),
                bottom: target.vertex_count(),
            });
        }

        self.skin.set_positions_flat(&target.points());
        self.seam_stitcher = Some(MeshStitcher::init(&self.skin, &self.masks.stitch_locked));
        Ok(())
    }

    /// Blend the seam of a previously loaded replacement skin.
    ///
    /// No-op (returning `false`) if no stitcher has been initialized.
    pub fn stitch_seam(&mut self) -> Result<bool> {
        match &self.seam_stitcher {
            Some(stitcher) => {
                stitcher.stitch(&mut self.skin)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// A standalone replacement skin surface to be fitted and blended in.
pub struct TargetSkinLayers {
    mesh: HalfEdgeMesh,
}

impl TargetSkinLayers {
    /// Wrap a loaded target surface.
    pub fn new(mesh: HalfEdgeMesh) -> Self {
        Self { mesh }
    }

    /// Borrow the target mesh.
    pub fn mesh(&self) -> &HalfEdgeMesh {
        &self.mesh
    }

    /// Vertex count of the target surface.
    pub fn vertex_count(&self) -> usize {
        self.mesh.num_vertices()
    }

    /// The target's positions as a flat `[x, y, z, ...]` buffer.
    pub fn points(&self) -> Vec<f64> {
        let mut data = Vec::with_capacity(self.mesh.num_vertices() * 3);
        for v in self.mesh.vertex_ids() {
            let p = self.mesh.position(v);
            data.extend_from_slice(&[p.x, p.y, p.z]);
        }
        data
    }
}

/// The closed set of mesh-model variants the application dispatches over.
pub enum MeshVariant {
    /// A full body model with nested layers.
    Body(BodyLayers),
    /// A standalone target skin surface.
    TargetSkin(TargetSkinLayers),
}

impl MeshVariant {
    /// Borrow a layer, if the variant has one of this kind.
    pub fn layer(&self, kind: LayerKind) -> Option<&HalfEdgeMesh> {
        match self {
            MeshVariant::Body(body) => Some(body.layer(kind)),
            MeshVariant::TargetSkin(target) => {
                (kind == LayerKind::Skin).then(|| target.mesh())
            }
        }
    }

    /// Replace a layer, if the variant supports it.
    pub fn set_layer(&mut self, kind: LayerKind, mesh: HalfEdgeMesh) -> Result<()> {
        match self {
            MeshVariant::Body(body) => body.set_layer(kind, mesh),
            MeshVariant::TargetSkin(target) => {
                if kind != LayerKind::Skin {
                    return Err(LaminaError::LayerMismatch {
                        top: 0,
                        bottom: mesh.num_vertices(),
                    });
                }
                target.mesh = mesh;
                Ok(())
            }
        }
    }

    /// Update a layer's positions from a flat buffer.
    pub fn update_points(&mut self, kind: LayerKind, data: &[f64]) -> bool {
        match self {
            MeshVariant::Body(body) => body.update_layer_points(kind, data),
            MeshVariant::TargetSkin(target) => {
                kind == LayerKind::Skin && target.mesh.set_positions_flat(data)
            }
        }
    }

    /// Run reconciliation; `None` for variants without a pipeline.
    pub fn reconcile(&mut self) -> Option<Result<ReconcileReport>> {
        match self {
            MeshVariant::Body(body) => Some(body.reconcile()),
            MeshVariant::TargetSkin(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::intersection::track_intersections;
    use crate::config::RbfConfig;
    use crate::mesh::primitives::uv_sphere;
    use nalgebra::Point3;

    const RINGS: usize = 14;
    const SEGMENTS: usize = 18;

    fn sphere(radius: f64) -> HalfEdgeMesh {
        uv_sphere(Point3::origin(), radius, RINGS, SEGMENTS).unwrap()
    }

    /// A wrap pose whose north cap bulges through the unit skin.
    fn bulged_wrap() -> HalfEdgeMesh {
        let mut mesh = sphere(0.95);
        let cap_cos = 0.6_f64.cos();
        for vi in 0..mesh.num_vertices() {
            let v = VertexId::new(vi);
            let dir = mesh.position(v).coords.normalize();
            let t = ((dir.z - cap_cos) / (1.0 - cap_cos)).max(0.0);
            mesh.set_position(v, Point3::from(dir * (0.95 + 0.07 * t)));
        }
        mesh
    }

    fn identity_map(n: usize) -> IndexMap {
        IndexMap::from_entries(&(0..n as i64).collect::<Vec<_>>())
    }

    fn test_masks(skin: &HalfEdgeMesh) -> LayerMasks {
        let n = skin.num_vertices();
        let lock_cos = 1.1_f64.cos();
        let locked: Vec<bool> = skin
            .vertex_ids()
            .map(|v| skin.position(v).coords.normalize().z < lock_cos)
            .collect();
        let region: Vec<bool> = skin
            .vertex_ids()
            .map(|v| skin.position(v).coords.normalize().z > 0.5)
            .collect();
        LayerMasks {
            locked,
            ignore: vec![false; n],
            region,
            stitch_locked: skin
                .vertex_ids()
                .map(|v| skin.position(v).coords.normalize().z <= 0.8)
                .collect(),
            shrink: None,
            full_to_cutoff: identity_map(n),
        }
    }

    fn test_config() -> ReconcileConfig {
        ReconcileConfig {
            rbf: RbfConfig {
                additional_centers: 40,
                ..RbfConfig::default()
            },
            ..ReconcileConfig::default()
        }
    }

    fn body() -> BodyLayers {
        let skin = sphere(1.0);
        let masks = test_masks(&skin);
        BodyLayers::new(
            bulged_wrap(),
            skin,
            sphere(0.5),
            sphere(0.95),
            masks,
            test_config(),
        )
        .unwrap()
    }

    #[test]
    fn test_mismatched_templates_rejected() {
        let skin = sphere(1.0);
        let masks = test_masks(&skin);
        let bad_template = uv_sphere(Point3::origin(), 0.95, 6, 8).unwrap();
        let result = BodyLayers::new(
            bulged_wrap(),
            skin,
            sphere(0.5),
            bad_template,
            masks,
            test_config(),
        );
        assert!(matches!(result, Err(LaminaError::LayerMismatch { .. })));
    }

    #[test]
    fn test_reconcile_removes_interpenetration() {
        let mut body = body();

        // The wrap initially pierces the skin.
        let n = body.vertex_count(LayerKind::Skin);
        let ignore = vec![false; n];
        let before = track_intersections(
            body.layer(LayerKind::Skin),
            body.layer(LayerKind::Wrap),
            &ignore,
            &ignore,
        )
        .unwrap();
        assert!(before.pair_count > 0, "setup must interpenetrate");

        let report = body.reconcile().unwrap();
        assert!(report.collision.resolved);
        assert!(report.bones_warped);

        let after = track_intersections(
            body.layer(LayerKind::Skin),
            body.layer(LayerKind::Wrap),
            &ignore,
            &ignore,
        )
        .unwrap();
        assert_eq!(after.pair_count, 0, "reconcile must remove intersections");

        // The bones followed the wrap's deformation (the cap was pushed
        // in, so at least some bone vertices moved off the template).
        let template = sphere(0.5);
        let moved = body
            .layer(LayerKind::Bones)
            .positions()
            .iter()
            .zip(template.positions().iter())
            .any(|(p, q)| (p - q).norm() > 1e-9);
        assert!(moved);
    }

    #[test]
    fn test_reconcile_is_repeatable() {
        let mut body = body();
        body.reconcile().unwrap();
        let report = body.reconcile().unwrap();
        // Second run starts from resolved geometry: nothing to do.
        assert!(report.collision.resolved);
        assert_eq!(report.collision.iterations, 0);
    }

    #[test]
    fn test_update_decoded_points_roundtrip() {
        let mut body = body();
        let wrap_data: Vec<f64> = body.layer(LayerKind::Wrap).positions().iter()
            .flat_map(|p| [p.x, p.y, p.z])
            .collect();
        let skin_data: Vec<f64> = body.layer(LayerKind::Skin).positions().iter()
            .flat_map(|p| [p.x, p.y, p.z])
            .collect();

        let mut combined = wrap_data;
        combined.extend(skin_data);
        body.update_decoded_points(&combined).unwrap();

        assert!(body.update_decoded_points(&combined[1..]).is_err());
    }

    #[test]
    fn test_stitch_seam_is_noop_before_init() {
        let mut body = body();
        assert!(!body.stitch_seam().unwrap());
    }

    #[test]
    fn test_target_skin_stitching() {
        let mut body = body();

        // A replacement skin whose cap is displaced.
        let mut target_mesh = sphere(1.0);
        for vi in 0..target_mesh.num_vertices() {
            let v = VertexId::new(vi);
            let p = *target_mesh.position(v);
            if p.z > 0.8 {
                target_mesh.set_position(v, Point3::new(p.x, p.y, p.z + 0.05));
            }
        }
        let target = TargetSkinLayers::new(target_mesh);

        body.init_seam_stitcher(&target).unwrap();
        assert!(body.stitch_seam().unwrap());

        // Stitching keeps the locked surface fixed (it was overwritten by
        // the identical target positions there) and produces finite
        // geometry everywhere.
        for p in body.layer(LayerKind::Skin).positions() {
            assert!(p.coords.iter().all(|c| c.is_finite()));
        }
    }

    #[test]
    fn test_variant_dispatch() {
        let target = TargetSkinLayers::new(sphere(1.0));
        let mut variant = MeshVariant::TargetSkin(target);

        assert!(variant.layer(LayerKind::Skin).is_some());
        assert!(variant.layer(LayerKind::Bones).is_none());
        assert!(variant.reconcile().is_none());

        let mut body_variant = MeshVariant::Body(body());
        assert!(body_variant.layer(LayerKind::Wrap).is_some());
        let report = body_variant.reconcile().unwrap().unwrap();
        assert!(report.collision.resolved);
    }
}
