use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use glam::{DMat3, DVec3};
use vio_pose::essential::essential_8point;
use vio_pose::ransac::{ransac_essential, RansacParams};
use vio_pose::{Correspondence, RelativePoseConfig, RelativePoseSolver};

/// Generate synthetic bearing correspondences for a fixed motion.
fn generate_scene(n: usize) -> Vec<Correspondence> {
    let r = DMat3::from_axis_angle(DVec3::new(0.1, 1.0, -0.2).normalize(), 0.2);
    let t = DVec3::new(0.8, -0.1, 0.1);
    (0..n)
        .map(|i| {
            let fi = i as f64;
            let x = DVec3::new(
                (fi * 0.73).sin() * 2.0,
                (fi * 0.41).cos() * 1.5,
                5.0 + (fi * 0.17).sin() * 3.0,
            );
            Correspondence::new(x / x.z, r * x + t)
        })
        .collect()
}

fn bench_essential_8point(c: &mut Criterion) {
    let mut group = c.benchmark_group("essential_8point");
    for &n in &[8, 50, 200] {
        let data = generate_scene(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| {
                let _ = std::hint::black_box(essential_8point(&data));
            });
        });
    }
    group.finish();
}

fn bench_ransac_essential(c: &mut Criterion) {
    let mut group = c.benchmark_group("ransac_essential");
    let params = RansacParams::default();
    for &n in &[50, 200] {
        let data = generate_scene(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| {
                let _ = std::hint::black_box(ransac_essential(&data, &params));
            });
        });
    }
    group.finish();
}

fn bench_solve(c: &mut Criterion) {
    let mut group = c.benchmark_group("relative_pose_solve");
    let solver = RelativePoseSolver::new(RelativePoseConfig {
        ransac: None,
        ..Default::default()
    });
    for &n in &[50, 200] {
        let data = generate_scene(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| {
                let _ = std::hint::black_box(solver.solve(&data));
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_essential_8point,
    bench_ransac_essential,
    bench_solve
);
criterion_main!(benches);
