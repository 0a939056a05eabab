#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use render_host::core::memory_guard::{FixedMemoryProbe, MemoryGuard};
use render_host::engines::ScriptedEngine;
use render_host::logging::{init_logging, LoggingConfig};
use render_host::traits::Engine;
use render_host::{CoordinatorSettings, HeadlessSurface, RenderConfig, RenderCoordinator};

/// Short poll period so lifecycle tests finish quickly
pub const PERIOD: Duration = Duration::from_millis(40);

/// Scheduling slack added to every timing bound
pub const SLACK: Duration = Duration::from_millis(200);

pub fn init_test_logging() {
    init_logging(LoggingConfig {
        is_test: true,
        ..LoggingConfig::default()
    });
}

pub fn settings() -> CoordinatorSettings {
    CoordinatorSettings {
        poll_interval_ms: PERIOD.as_millis() as u64,
        num_threads: 2,
        force_rasterize: false,
        low_memory_floor_mb: 0,
    }
}

pub fn config() -> RenderConfig {
    RenderConfig::builder()
        .resolution(32, 24)
        .samples(1, 1)
        .build()
}

pub struct Harness {
    pub coordinator: RenderCoordinator,
    pub engine: Arc<ScriptedEngine>,
    pub surface: HeadlessSurface,
    pub memory: Arc<FixedMemoryProbe>,
}

pub fn harness(engine: ScriptedEngine) -> Harness {
    init_test_logging();
    let engine = Arc::new(engine);
    let memory = Arc::new(FixedMemoryProbe::new(1_000_000));
    let surface = HeadlessSurface::new(32, 24);
    let coordinator = RenderCoordinator::new(
        Arc::clone(&engine) as Arc<dyn Engine>,
        Box::new(surface.clone()),
        settings(),
        MemoryGuard::new(Arc::clone(&memory) as _),
    )
    .expect("coordinator");
    Harness {
        coordinator,
        engine,
        surface,
        memory,
    }
}
