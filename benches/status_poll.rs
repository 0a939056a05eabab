use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use glam::Vec3;
use render_host::core::bitmap::Bitmap;
use render_host::core::memory_guard::MemoryGuard;
use render_host::core::status::{FpsMeter, RenderInfo, StatusSnapshot};
use render_host::engines::ScriptedEngine;
use render_host::math::Ray;
use render_host::scenes::create_builtin_scene;
use render_host::traits::Engine;
use render_host::{RenderState, Scene};
use std::time::{Duration, Instant};

fn sample_info() -> RenderInfo {
    RenderInfo {
        width: 640,
        height: 480,
        threads: 8,
        samples_pixel: 16,
        samples_light: 4,
        primitives: 1_024,
        lights: 2,
    }
}

/// Benchmark: one status tick against the scripted engine, snapshot included
fn bench_poll_tick(c: &mut Criterion) {
    let engine = ScriptedEngine::working_forever(1_024);
    engine
        .begin_render(Bitmap::new(64, 48).into_shared(), 1, true)
        .expect("begin");
    let started = Instant::now();
    let started_at = chrono::Utc::now();

    c.bench_function("poll_tick", |b| {
        b.iter(|| {
            let status = engine.poll_status().expect("poll");
            black_box(StatusSnapshot::from_engine(
                RenderState::Busy,
                &status,
                4.0,
                started.elapsed(),
                sample_info(),
                started_at,
            ))
        })
    });
}

/// Benchmark: two-line status text
fn bench_snapshot_format(c: &mut Criterion) {
    let snapshot = StatusSnapshot {
        state: RenderState::Busy,
        sample_index: 12,
        info: sample_info(),
        ..StatusSnapshot::idle()
    };

    c.bench_function("snapshot_format", |b| {
        b.iter(|| black_box(black_box(&snapshot).to_string()))
    });
}

/// Benchmark: refresh-rate meter tick
fn bench_fps_meter(c: &mut Criterion) {
    let mut meter = FpsMeter::new();
    let mut now = Instant::now();

    c.bench_function("fps_meter_tick", |b| {
        b.iter(|| {
            now += Duration::from_millis(250);
            black_box(meter.tick_at(black_box(now)))
        })
    });
}

/// Benchmark: live memory query against /proc/meminfo
fn bench_memory_guard(c: &mut Criterion) {
    let guard = MemoryGuard::system(0);

    c.bench_function("memory_guard_query", |b| {
        b.iter(|| black_box(guard.is_low_memory(black_box(10))))
    });
}

/// Benchmark: primary ray against each built-in scene
fn bench_scene_intersection(c: &mut Criterion) {
    let mut group = c.benchmark_group("scene_intersection");
    for scene in [Scene::Cornell, Scene::Spheres, Scene::Spheres2] {
        let geometry = create_builtin_scene(scene).expect("built-in scene");
        let camera = geometry.camera();
        let ray = camera.primary_ray(0.5, 0.5, 4.0 / 3.0);
        group.bench_with_input(BenchmarkId::from_parameter(scene.name()), &geometry, |b, g| {
            b.iter(|| black_box(g.intersect(black_box(&ray), f32::MAX)))
        });
    }
    group.finish();

    let geometry = create_builtin_scene(Scene::Cornell).expect("built-in scene");
    let miss = Ray::new(Vec3::new(0.0, 100.0, 0.0), Vec3::Y);
    c.bench_function("scene_intersection_miss", |b| {
        b.iter(|| black_box(geometry.intersect(black_box(&miss), f32::MAX)))
    });
}

criterion_group!(
    benches,
    bench_poll_tick,
    bench_snapshot_format,
    bench_fps_meter,
    bench_memory_guard,
    bench_scene_intersection,
);

criterion_main!(benches);
