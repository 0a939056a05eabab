// Progressive software tracer. Cancellation is checked per row; a partial
// pass is discarded.

mod raster;
mod shade;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use anyhow::{anyhow, bail, Context, Result};
use glam::Vec3;
use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;

use crate::camera::Camera;
use crate::config::{RenderConfig, Scene, Shader};
use crate::core::bitmap::{Bitmap, SharedBitmap};
use crate::core::memory_guard::{megabytes_for, MemoryGuard};
use crate::loaders::load_obj;
use crate::math::to_rgba8;
use crate::scenes::{create_builtin_scene, Light, SceneGeometry};
use crate::traits::{
    Engine, EngineStatus, NativeBuffer, PreviewBufferKind, PreviewSet, OUT_OF_MEMORY,
    SCENE_LOAD_FAILED,
};

use shade::{unit, Shading};

/// Bytes of the per-pixel radiance sums kept across passes
fn accumulation_bytes(width: u32, height: u32) -> u64 {
    width as u64 * height as u64 * std::mem::size_of::<Vec3>() as u64
}

struct LoadedScene {
    geometry: SceneGeometry,
    camera: Camera,
    shader: Shader,
    samples_pixel: u32,
    samples_light: u32,
}

#[derive(Default)]
struct Progress {
    working: AtomicBool,
    cancel: AtomicBool,
    sample_index: AtomicU32,
    elapsed_ms: AtomicU64,
    started: Mutex<Option<Instant>>,
}

impl Progress {
    fn elapsed_ms(&self) -> u64 {
        match *self.started.lock() {
            Some(started) if self.working.load(Ordering::Acquire) => {
                started.elapsed().as_millis() as u64
            }
            _ => self.elapsed_ms.load(Ordering::Acquire),
        }
    }
}

pub struct SoftwareEngine {
    guard: Option<MemoryGuard>,
    scene: RwLock<Option<Arc<LoadedScene>>>,
    progress: Arc<Progress>,
    worker: Mutex<Option<JoinHandle<()>>>,
    buffers: Mutex<HashMap<u64, usize>>,
    next_buffer_id: AtomicU64,
}

impl SoftwareEngine {
    pub fn new() -> Self {
        Self {
            guard: None,
            scene: RwLock::new(None),
            progress: Arc::new(Progress::default()),
            worker: Mutex::new(None),
            buffers: Mutex::new(HashMap::new()),
            next_buffer_id: AtomicU64::new(1),
        }
    }

    /// Reject scenes that would not fit in memory, reporting [`OUT_OF_MEMORY`],
    /// and guard the tracer's own buffers
    pub fn with_memory_guard(mut self, guard: MemoryGuard) -> Self {
        self.guard = Some(guard);
        self
    }

    /// Preview buffers handed out and not yet freed
    pub fn live_preview_buffers(&self) -> usize {
        self.buffers.lock().len()
    }

    fn load_geometry(&self, config: &RenderConfig) -> Result<SceneGeometry> {
        if let Some(geometry) = create_builtin_scene(config.scene()) {
            return Ok(geometry);
        }
        if config.scene() == Scene::WrongFile {
            bail!("scene '{}' has no loadable geometry", config.scene().name());
        }

        let mesh = load_obj(config.obj_path(), Some(config.mat_path()))?;
        if mesh.triangles.is_empty() {
            bail!("{} contains no faces", config.obj_path().display());
        }
        let mut geometry = SceneGeometry {
            triangles: mesh.triangles,
            lights: mesh
                .emissive_centers
                .into_iter()
                .map(|p| Light::new(p, 1.0))
                .collect(),
            ..Default::default()
        };

        let bounds = geometry.bounds();
        if geometry.lights.is_empty() {
            let above = bounds.center() + Vec3::new(0.0, bounds.extent().y, bounds.extent().z);
            geometry.lights.push(Light::new(above, 1.0));
        }
        let framing = Camera::framing(&bounds);
        geometry.camera = Some(if config.cam_path().as_os_str().is_empty() {
            framing
        } else {
            Camera::from_file(config.cam_path(), framing)?
        });
        Ok(geometry)
    }

    fn stop_worker(&self) {
        self.progress.cancel.store(true, Ordering::Release);
        if let Some(handle) = self.worker.lock().take() {
            if handle.join().is_err() {
                log::error!("render worker panicked");
            }
        }
        self.progress.working.store(false, Ordering::Release);
    }

    fn preview_len(&self, kind: PreviewBufferKind) -> Result<usize> {
        let scene = self.scene.read();
        let scene = scene.as_ref().context("no scene loaded")?;
        let triangles = scene.geometry.triangles.len();
        let spheres = scene.geometry.spheres.len();
        Ok(match kind {
            PreviewBufferKind::Vertices => triangles * 9 * 4 + spheres * 4 * 4,
            PreviewBufferKind::Colors => (triangles + spheres) * 3 * 4,
            PreviewBufferKind::Camera => 16 * 4,
        })
    }
}

impl Default for SoftwareEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for SoftwareEngine {
    fn initialize_scene(&self, config: &RenderConfig) -> Result<i32> {
        self.stop_worker();
        *self.scene.write() = None;

        let geometry = match self.load_geometry(config) {
            Ok(geometry) => geometry,
            Err(err) => {
                log::warn!("scene {} failed to load: {err:#}", config.scene().name());
                return Ok(SCENE_LOAD_FAILED);
            }
        };

        let accumulation =
            accumulation_bytes(config.width().max(0) as u32, config.height().max(0) as u32);
        let needed_mb = megabytes_for(geometry.estimated_bytes() + accumulation).max(1);
        if self.guard.as_ref().is_some_and(|g| g.is_low_memory(needed_mb)) {
            log::warn!("scene {} needs {needed_mb} MB, not enough memory", config.scene().name());
            return Ok(OUT_OF_MEMORY);
        }

        let primitives = geometry.primitive_count();
        let camera = geometry.camera();
        *self.scene.write() = Some(Arc::new(LoadedScene {
            geometry,
            camera,
            shader: config.shader(),
            samples_pixel: config.samples_pixel().max(1) as u32,
            samples_light: config.samples_light().max(1) as u32,
        }));
        log::info!(
            "scene {} ready: {primitives} primitives, shader {}",
            config.scene().name(),
            config.shader().name()
        );
        Ok(primitives as i32)
    }

    fn begin_render(&self, sink: SharedBitmap, num_threads: usize, run_async: bool) -> Result<()> {
        let scene = self.scene.read().clone().context("no scene loaded")?;
        if self.progress.working.load(Ordering::Acquire) {
            bail!("a render is already running");
        }
        if let Some(handle) = self.worker.lock().take() {
            let _ = handle.join();
        }
        if let Some(guard) = &self.guard {
            let (width, height) = sink.read().dimensions();
            guard.check_bytes(accumulation_bytes(width, height), "accumulation buffer")?;
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads.max(1))
            .thread_name(|i| format!("render-worker-{i}"))
            .build()
            .map_err(|e| anyhow!("failed to build render pool: {e}"))?;

        let progress = Arc::clone(&self.progress);
        progress.cancel.store(false, Ordering::Release);
        progress.sample_index.store(0, Ordering::Release);
        progress.elapsed_ms.store(0, Ordering::Release);
        *progress.started.lock() = Some(Instant::now());
        progress.working.store(true, Ordering::Release);

        let job = move || render_passes(&scene, &sink, &progress, &pool);
        if run_async {
            let handle = thread::Builder::new()
                .name("render-main".into())
                .spawn(job)
                .context("failed to spawn render thread");
            match handle {
                Ok(handle) => *self.worker.lock() = Some(handle),
                Err(err) => {
                    self.progress.working.store(false, Ordering::Release);
                    return Err(err);
                }
            }
        } else {
            job();
        }
        Ok(())
    }

    fn cancel_render(&self) {
        self.progress.cancel.store(true, Ordering::Release);
    }

    fn poll_status(&self) -> Result<EngineStatus> {
        let scene = self.scene.read();
        let scene_bytes = scene
            .as_ref()
            .map_or(0, |s| s.geometry.estimated_bytes());
        let preview_bytes: usize = self.buffers.lock().values().sum();

        let sample_index = self.progress.sample_index.load(Ordering::Acquire);
        let elapsed_ms = self.progress.elapsed_ms();
        let fps = if elapsed_ms > 0 {
            sample_index as f32 * 1000.0 / elapsed_ms as f32
        } else {
            0.0
        };

        Ok(EngineStatus {
            is_working: self.progress.working.load(Ordering::Acquire),
            fps,
            elapsed_ms,
            sample_index,
            light_count: scene.as_ref().map_or(0, |s| s.geometry.lights.len() as u32),
            allocated_bytes: scene_bytes + preview_bytes as u64,
        })
    }

    fn allocate_preview_buffer(&self, kind: PreviewBufferKind) -> Result<NativeBuffer> {
        let len = self.preview_len(kind)?;
        let id = self.next_buffer_id.fetch_add(1, Ordering::Relaxed);
        self.buffers.lock().insert(id, len);
        Ok(NativeBuffer::new(id, kind, len))
    }

    fn free_preview_buffer(&self, buffer: NativeBuffer) {
        if self.buffers.lock().remove(&buffer.id()).is_none() {
            log::warn!("freeing unknown preview buffer {}", buffer.id());
        }
    }

    fn rasterize_preview(&self, buffers: PreviewSet<'_>, target: &mut Bitmap) -> Result<()> {
        {
            let live = self.buffers.lock();
            for buffer in [buffers.vertices, buffers.colors, buffers.camera] {
                if !live.contains_key(&buffer.id()) {
                    bail!("preview buffer {} is not allocated", buffer.id());
                }
            }
        }
        let scene = self.scene.read().clone().context("no scene loaded")?;
        if let Some(guard) = &self.guard {
            let (width, height) = target.dimensions();
            let depth = width as u64 * height as u64 * std::mem::size_of::<f32>() as u64;
            guard.check_bytes(depth, "raster depth buffer")?;
        }
        raster::rasterize(&scene.geometry, &scene.camera, target);
        Ok(())
    }

    fn finish_render(&self) {
        self.stop_worker();
        *self.scene.write() = None;
        log::debug!("software engine released its scene");
    }

    fn name(&self) -> &str {
        "software"
    }
}

impl Drop for SoftwareEngine {
    fn drop(&mut self) {
        self.stop_worker();
    }
}

fn render_passes(
    scene: &LoadedScene,
    sink: &SharedBitmap,
    progress: &Progress,
    pool: &rayon::ThreadPool,
) {
    let (width, height) = sink.read().dimensions();
    let (w, h) = (width as usize, height as usize);
    let aspect = width as f32 / height.max(1) as f32;
    let bounds = scene.geometry.bounds();
    let shading = Shading {
        geometry: &scene.geometry,
        shader: scene.shader,
        samples_light: scene.samples_light,
        max_depth: (bounds.max - scene.camera.position)
            .length()
            .max((bounds.min - scene.camera.position).length())
            .max(1e-3),
    };
    let mut accum = vec![Vec3::ZERO; w * h];

    for pass in 0..scene.samples_pixel {
        if progress.cancel.load(Ordering::Acquire) {
            break;
        }
        let completed = pool.install(|| {
            accum.par_chunks_mut(w.max(1)).enumerate().try_for_each(|(y, row)| {
                if progress.cancel.load(Ordering::Relaxed) {
                    return Err(());
                }
                for (x, pixel) in row.iter_mut().enumerate() {
                    let seed = ((y * w + x) as u32).wrapping_mul(9781) ^ pass.wrapping_mul(6271);
                    let (jx, jy) = if pass == 0 {
                        (0.5, 0.5)
                    } else {
                        (unit(seed), unit(seed ^ 0x68e3_1da4))
                    };
                    let ray = scene.camera.primary_ray(
                        (x as f32 + jx) / width as f32,
                        (y as f32 + jy) / height as f32,
                        aspect,
                    );
                    *pixel += shading.radiance(&ray, seed);
                }
                Ok(())
            })
        });
        if completed.is_err() {
            log::debug!("render cancelled during pass {pass}");
            break;
        }

        let scale = 1.0 / (pass + 1) as f32;
        {
            let mut image = sink.write();
            for (out, color) in image.pixels_mut().chunks_exact_mut(4).zip(&accum) {
                out.copy_from_slice(&to_rgba8(*color * scale));
            }
        }
        progress.sample_index.store(pass + 1, Ordering::Release);
    }

    let elapsed = progress
        .started
        .lock()
        .map_or(0, |s| s.elapsed().as_millis() as u64);
    progress.elapsed_ms.store(elapsed, Ordering::Release);
    progress.working.store(false, Ordering::Release);
    log::debug!(
        "render passes done: {} samples in {elapsed} ms",
        progress.sample_index.load(Ordering::Acquire)
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bitmap::BLACK;
    use std::time::Duration;

    fn cornell(width: i32, height: i32, spp: i32) -> RenderConfig {
        RenderConfig::builder()
            .scene(Scene::Cornell)
            .shader(Shader::Whitted)
            .resolution(width, height)
            .samples(spp, 1)
            .build()
    }

    fn wait_idle(engine: &SoftwareEngine) -> EngineStatus {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            let status = engine.poll_status().unwrap();
            if !status.is_working || Instant::now() > deadline {
                return status;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_builtin_scene_reports_primitives() {
        let engine = SoftwareEngine::new();
        let primitives = engine.initialize_scene(&cornell(8, 8, 1)).unwrap();
        assert_eq!(primitives, 12);
    }

    #[test]
    fn test_missing_obj_is_load_failure() {
        let engine = SoftwareEngine::new();
        let config = RenderConfig::builder()
            .scene(Scene::Obj)
            .obj_path("/nonexistent/model.obj")
            .build();
        assert_eq!(engine.initialize_scene(&config).unwrap(), SCENE_LOAD_FAILED);
        assert_eq!(
            engine
                .initialize_scene(&RenderConfig::builder().scene(Scene::WrongFile).build())
                .unwrap(),
            SCENE_LOAD_FAILED
        );
    }

    #[test]
    fn test_low_memory_reports_sentinel() {
        let probe = Arc::new(crate::core::memory_guard::FixedMemoryProbe::new(1));
        let engine = SoftwareEngine::new().with_memory_guard(MemoryGuard::new(probe));
        assert_eq!(engine.initialize_scene(&cornell(8, 8, 1)).unwrap(), OUT_OF_MEMORY);
    }

    #[test]
    fn test_accumulation_buffer_is_guarded() {
        let probe = Arc::new(crate::core::memory_guard::FixedMemoryProbe::new(10));
        let engine = SoftwareEngine::new().with_memory_guard(MemoryGuard::new(probe));

        // 1024x1024 needs 12 MB of radiance sums on top of the scene
        assert_eq!(
            engine.initialize_scene(&cornell(1024, 1024, 1)).unwrap(),
            OUT_OF_MEMORY
        );

        engine.initialize_scene(&cornell(8, 8, 1)).unwrap();
        let err = engine
            .begin_render(Bitmap::new(1024, 1024).into_shared(), 1, false)
            .unwrap_err();
        let err = err.downcast::<crate::error::RenderError>().unwrap();
        assert_eq!(err.kind(), "low_memory");
        assert!(!engine.poll_status().unwrap().is_working);
    }

    #[test]
    fn test_synchronous_render_fills_image() {
        let engine = SoftwareEngine::new();
        engine.initialize_scene(&cornell(16, 16, 2)).unwrap();
        let sink = Bitmap::new(16, 16).into_shared();
        engine.begin_render(Arc::clone(&sink), 2, false).unwrap();

        let status = engine.poll_status().unwrap();
        assert!(!status.is_working);
        assert_eq!(status.sample_index, 2);
        assert_eq!(status.light_count, 1);
        assert_ne!(sink.read().pixel(8, 8), Some(BLACK));
    }

    #[test]
    fn test_cancel_stops_async_render() {
        let engine = SoftwareEngine::new();
        engine.initialize_scene(&cornell(64, 64, 100_000)).unwrap();
        let sink = Bitmap::new(64, 64).into_shared();
        engine.begin_render(sink, 2, true).unwrap();
        assert!(engine.poll_status().unwrap().is_working);

        engine.cancel_render();
        let status = wait_idle(&engine);
        assert!(!status.is_working);
        assert!(status.sample_index < 100_000);
        engine.finish_render();
    }

    #[test]
    fn test_preview_buffers_are_tracked() {
        let engine = SoftwareEngine::new();
        engine.initialize_scene(&cornell(8, 8, 1)).unwrap();
        let vertices = engine.allocate_preview_buffer(PreviewBufferKind::Vertices).unwrap();
        let colors = engine.allocate_preview_buffer(PreviewBufferKind::Colors).unwrap();
        let camera = engine.allocate_preview_buffer(PreviewBufferKind::Camera).unwrap();
        assert_eq!(engine.live_preview_buffers(), 3);
        assert_eq!(vertices.len_bytes(), 10 * 9 * 4 + 2 * 4 * 4);

        let mut target = Bitmap::new(8, 8);
        let set = PreviewSet {
            vertices: &vertices,
            colors: &colors,
            camera: &camera,
        };
        engine.rasterize_preview(set, &mut target).unwrap();
        assert_ne!(target.pixel(4, 4), Some(BLACK));

        engine.free_preview_buffer(vertices);
        engine.free_preview_buffer(colors);
        engine.free_preview_buffer(camera);
        assert_eq!(engine.live_preview_buffers(), 0);
    }

    #[test]
    fn test_begin_without_scene_is_an_error() {
        let engine = SoftwareEngine::new();
        let sink = Bitmap::new(4, 4).into_shared();
        assert!(engine.begin_render(sink, 1, false).is_err());
    }
}
