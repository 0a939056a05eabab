// Framebuffer and raster preview buffers; display thread only

use std::sync::Arc;

use crate::core::bitmap::{Bitmap, SharedBitmap, BYTES_IN_MEGABYTE};
use crate::core::memory_guard::MemoryGuard;
use crate::error::{RenderError, RenderResult};
use crate::traits::{DisplaySurface, Engine, NativeBuffer, PreviewBufferKind, PreviewSet};

/// Estimated bytes per triangle in the raster preview: nine floats of
/// geometry plus per-primitive bookkeeping.
const PREVIEW_TRIANGLE_BYTES: u64 = 4 * 9 + 8 * 11;

/// Megabytes the raster preview needs for `primitives` triangles
pub fn preview_memory_mb(primitives: u32) -> i64 {
    1 + (primitives as u64 * PREVIEW_TRIANGLE_BYTES / BYTES_IN_MEGABYTE as u64) as i64
}

/// What a call to [`FrameComposer::draw_frame`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// First frame of a render: engine started, image presented
    RenderStarted,
    /// Engine output copied to the display
    Presented,
    /// No framebuffer yet, nothing to draw
    Skipped,
}

#[derive(Debug, Default)]
struct PreviewArrays {
    vertices: Option<NativeBuffer>,
    colors: Option<NativeBuffer>,
    camera: Option<NativeBuffer>,
}

impl PreviewArrays {
    fn slot(&mut self, kind: PreviewBufferKind) -> &mut Option<NativeBuffer> {
        match kind {
            PreviewBufferKind::Vertices => &mut self.vertices,
            PreviewBufferKind::Colors => &mut self.colors,
            PreviewBufferKind::Camera => &mut self.camera,
        }
    }

    fn allocated(&self) -> usize {
        [&self.vertices, &self.colors, &self.camera]
            .iter()
            .filter(|b| b.is_some())
            .count()
    }

    fn as_set(&self) -> Option<PreviewSet<'_>> {
        Some(PreviewSet {
            vertices: self.vertices.as_ref()?,
            colors: self.colors.as_ref()?,
            camera: self.camera.as_ref()?,
        })
    }
}

pub struct FrameComposer {
    engine: Arc<dyn Engine>,
    guard: MemoryGuard,
    bitmap: Option<SharedBitmap>,
    width: u32,
    height: u32,
    surface_width: u32,
    surface_height: u32,
    first_frame: bool,
    rasterize: bool,
    primitives: u32,
    num_threads: usize,
    preview: PreviewArrays,
    frames_presented: u64,
}

impl FrameComposer {
    pub fn new(engine: Arc<dyn Engine>, guard: MemoryGuard) -> Self {
        Self {
            engine,
            guard,
            bitmap: None,
            width: 0,
            height: 0,
            surface_width: 0,
            surface_height: 0,
            first_frame: false,
            rasterize: false,
            primitives: 0,
            num_threads: 1,
            preview: PreviewArrays::default(),
            frames_presented: 0,
        }
    }

    /// Per-render parameters consumed by the next first frame
    pub fn prepare(&mut self, primitives: u32, num_threads: usize, rasterize: bool) {
        self.primitives = primitives;
        self.num_threads = num_threads.max(1);
        self.rasterize = rasterize;
    }

    /// Allocate a black framebuffer of `width x height` for the next render.
    ///
    /// The surface size is kept for the raster preview, which draws at surface
    /// resolution and is rescaled into the framebuffer.
    pub fn set_bitmap(
        &mut self,
        width: i32,
        height: i32,
        surface_width: i32,
        surface_height: i32,
    ) -> RenderResult<SharedBitmap> {
        if width <= 0 || height <= 0 || surface_width <= 0 || surface_height <= 0 {
            return Err(RenderError::invalid_resolution(format!(
                "image {width}x{height} on surface {surface_width}x{surface_height}"
            )));
        }
        let (width, height) = (width as u32, height as u32);

        self.guard
            .check_bytes(Bitmap::required_bytes(width, height), "framebuffer")?;

        let bitmap = Bitmap::new(width, height);
        if bitmap.dimensions() != (width, height) {
            return Err(RenderError::invalid_resolution(format!(
                "requested {width}x{height}, allocated {}x{}",
                bitmap.width(),
                bitmap.height()
            )));
        }

        let shared = bitmap.into_shared();
        self.bitmap = Some(Arc::clone(&shared));
        self.width = width;
        self.height = height;
        self.surface_width = surface_width as u32;
        self.surface_height = surface_height as u32;
        self.first_frame = true;
        Ok(shared)
    }

    pub fn bitmap(&self) -> Option<SharedBitmap> {
        self.bitmap.clone()
    }

    /// Allocate the vertices, colors and camera scratch buffers.
    ///
    /// Calling this while a set is still allocated frees the old set first, so
    /// handles are never overwritten. Each buffer is guard-checked right
    /// before allocation; on low memory or an engine failure every buffer
    /// allocated so far is freed again.
    pub fn init_preview_arrays(&mut self) -> RenderResult<()> {
        if self.preview.allocated() > 0 {
            log::debug!("preview arrays still allocated, freeing before re-init");
            self.free_preview_arrays();
        }

        for kind in [
            PreviewBufferKind::Vertices,
            PreviewBufferKind::Colors,
            PreviewBufferKind::Camera,
        ] {
            if let Err(err) = self.guard.check(1, "preview buffer") {
                self.free_preview_arrays();
                return Err(err);
            }
            match self.engine.allocate_preview_buffer(kind) {
                Ok(buffer) => *self.preview.slot(kind) = Some(buffer),
                Err(source) => {
                    self.free_preview_arrays();
                    return Err(RenderError::engine_fault(
                        format!("allocate {kind:?} preview buffer"),
                        source,
                    ));
                }
            }
        }
        Ok(())
    }

    /// Give every allocated preview buffer back to the engine; no-op when empty
    pub fn free_preview_arrays(&mut self) {
        for kind in [
            PreviewBufferKind::Vertices,
            PreviewBufferKind::Colors,
            PreviewBufferKind::Camera,
        ] {
            if let Some(buffer) = self.preview.slot(kind).take() {
                self.engine.free_preview_buffer(buffer);
            }
        }
    }

    pub fn preview_buffers_allocated(&self) -> usize {
        self.preview.allocated()
    }

    /// Draw one frame.
    ///
    /// The first frame after [`set_bitmap`](Self::set_bitmap) runs the
    /// optional raster preview and starts the engine; every frame then
    /// uploads the current engine output to `surface`.
    pub fn draw_frame(&mut self, surface: &mut dyn DisplaySurface) -> RenderResult<FrameOutcome> {
        let Some(bitmap) = self.bitmap.clone() else {
            return Ok(FrameOutcome::Skipped);
        };

        let mut outcome = FrameOutcome::Presented;
        if self.first_frame {
            self.first_frame = false;
            if self.rasterize {
                self.rasterize = false;
                self.run_preview_pass(&bitmap)?;
            }
            self.engine
                .begin_render(Arc::clone(&bitmap), self.num_threads, true)
                .map_err(|source| RenderError::from_engine("begin_render", source))?;
            outcome = FrameOutcome::RenderStarted;
        }

        let image = bitmap.read();
        surface
            .upload(&image)
            .map_err(|source| RenderError::engine_fault("upload display texture", source))?;
        self.frames_presented += 1;
        Ok(outcome)
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    /// Drop per-render resources once a render has ended
    pub fn release(&mut self) {
        self.free_preview_arrays();
        self.first_frame = false;
        self.rasterize = false;
    }

    /// Preview failures other than an engine fault only cost the preview.
    fn run_preview_pass(&mut self, bitmap: &SharedBitmap) -> RenderResult<()> {
        let result = self
            .init_preview_arrays()
            .and_then(|()| self.rasterize_into(bitmap));
        self.free_preview_arrays();
        match result {
            Err(RenderError::LowMemory(msg)) => {
                log::warn!("low memory to rasterize a frame: {msg}");
                Ok(())
            }
            other => other,
        }
    }

    fn rasterize_into(&mut self, bitmap: &SharedBitmap) -> RenderResult<()> {
        self.guard
            .check(preview_memory_mb(self.primitives), "raster preview")?;

        let Some(set) = self.preview.as_set() else {
            return Ok(());
        };
        // surface-sized scratch plus its framebuffer-sized rescale
        let images = Bitmap::required_bytes(self.surface_width, self.surface_height)
            + Bitmap::required_bytes(self.width, self.height);
        self.guard.check_bytes(images, "raster preview images")?;
        let mut scratch = Bitmap::new(self.surface_width, self.surface_height);
        self.engine
            .rasterize_preview(set, &mut scratch)
            .map_err(|source| RenderError::from_engine("rasterize_preview", source))?;

        *bitmap.write() = scratch.resized(self.width, self.height);
        log::debug!(
            "raster preview drawn at {}x{}",
            self.surface_width,
            self.surface_height
        );
        Ok(())
    }
}

impl Drop for FrameComposer {
    fn drop(&mut self) {
        self.free_preview_arrays();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_estimate_has_one_mb_floor() {
        assert_eq!(preview_memory_mb(0), 1);
        assert_eq!(preview_memory_mb(1000), 1);
        // 124 bytes each: ~8456 triangles per MiB
        assert_eq!(preview_memory_mb(20_000), 3);
    }
}
