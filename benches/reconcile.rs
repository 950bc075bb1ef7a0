//! Benchmarks for the reconciliation pipeline.

use criterion::{criterion_group, criterion_main, Criterion};
use lamina::config::{CollisionConfig, RbfConfig};
use lamina::mesh::primitives::uv_sphere;
use lamina::mesh::{HalfEdgeMesh, VertexId};
use lamina::prelude::*;
use nalgebra::Point3;

fn bulged_wrap(rings: usize, segments: usize) -> HalfEdgeMesh {
    let mut mesh = uv_sphere(Point3::origin(), 0.95, rings, segments).unwrap();
    let cap_cos = 0.6_f64.cos();
    for vi in 0..mesh.num_vertices() {
        let v = VertexId::new(vi);
        let dir = mesh.position(v).coords.normalize();
        let t = ((dir.z - cap_cos) / (1.0 - cap_cos)).max(0.0);
        mesh.set_position(v, Point3::from(dir * (0.95 + 0.07 * t)));
    }
    mesh
}

fn bench_tracked_intersection(c: &mut Criterion) {
    let skin = uv_sphere(Point3::origin(), 1.0, 24, 32).unwrap();
    let wrap = bulged_wrap(24, 32);
    let ignore = vec![false; skin.num_vertices()];

    c.bench_function("track_intersections_sphere_pair", |b| {
        b.iter(|| track_intersections(&skin, &wrap, &ignore, &ignore).unwrap().pair_count);
    });
}

fn bench_collision_resolution(c: &mut Criterion) {
    let rings = 20;
    let segments = 26;
    let skin = uv_sphere(Point3::origin(), 1.0, rings, segments).unwrap();
    let wrap = bulged_wrap(rings, segments);
    let lock_cos = 1.1_f64.cos();
    let locked: Vec<bool> = skin
        .vertex_ids()
        .map(|v| skin.position(v).coords.normalize().z < lock_cos)
        .collect();

    c.bench_function("resolve_cap_penetration", |b| {
        b.iter(|| {
            let mut bottom = wrap.clone();
            resolve_layer_intersections_by_bottom_layer(
                &skin,
                &mut bottom,
                &locked,
                &CollisionConfig::default(),
            )
            .unwrap()
            .iterations
        });
    });
}

fn bench_rbf_apply(c: &mut Criterion) {
    let wrap_rest = uv_sphere(Point3::origin(), 1.0, 20, 26).unwrap();
    let warp = RbfWarp::init(
        &wrap_rest,
        100,
        &vec![false; wrap_rest.num_vertices()],
        &RbfConfig::default(),
    )
    .unwrap();

    let mut wrap = wrap_rest.clone();
    for vi in 0..wrap.num_vertices() {
        let v = VertexId::new(vi);
        let p = *wrap.position(v) * 1.05;
        wrap.set_position(v, p);
    }

    let bones = uv_sphere(Point3::origin(), 0.6, 30, 40).unwrap();

    c.bench_function("rbf_apply_dense_target", |b| {
        b.iter(|| {
            let mut target = bones.clone();
            warp.apply(&wrap, &mut target).unwrap();
            target
        });
    });
}

criterion_group!(
    benches,
    bench_tracked_intersection,
    bench_collision_resolution,
    bench_rbf_apply
);
criterion_main!(benches);
