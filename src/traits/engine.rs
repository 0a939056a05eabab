use serde::Serialize;

use crate::config::RenderConfig;
use crate::core::bitmap::{Bitmap, SharedBitmap};

/// `initialize_scene` result when the scene would not fit in memory
pub const OUT_OF_MEMORY: i32 = -1;
/// `initialize_scene` result when the scene or its assets could not be loaded
pub const SCENE_LOAD_FAILED: i32 = -2;

/// Decoded `initialize_scene` return value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneInit {
    Loaded { primitives: u32 },
    LoadFailed,
    OutOfMemory,
}

impl SceneInit {
    /// Map the raw engine value; unknown negative values count as load failures
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            OUT_OF_MEMORY => SceneInit::OutOfMemory,
            n if n < 0 => SceneInit::LoadFailed,
            n => SceneInit::Loaded {
                primitives: n as u32,
            },
        }
    }
}

/// Counters published by the engine; cheap to read at high frequency
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct EngineStatus {
    pub is_working: bool,
    pub fps: f32,
    pub elapsed_ms: u64,
    pub sample_index: u32,
    pub light_count: u32,
    pub allocated_bytes: u64,
}

/// Which scratch buffer of the raster preview a handle refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PreviewBufferKind {
    Vertices,
    Colors,
    Camera,
}

/// Engine-owned scratch memory handle.
///
/// Not `Clone`; each handle goes back to the engine exactly once.
#[derive(Debug, PartialEq, Eq)]
pub struct NativeBuffer {
    id: u64,
    kind: PreviewBufferKind,
    len_bytes: usize,
}

impl NativeBuffer {
    pub fn new(id: u64, kind: PreviewBufferKind, len_bytes: usize) -> Self {
        Self {
            id,
            kind,
            len_bytes,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> PreviewBufferKind {
        self.kind
    }

    pub fn len_bytes(&self) -> usize {
        self.len_bytes
    }
}

/// A complete set of preview buffers lent to the engine for one raster pass
#[derive(Debug, Clone, Copy)]
pub struct PreviewSet<'a> {
    pub vertices: &'a NativeBuffer,
    pub colors: &'a NativeBuffer,
    pub camera: &'a NativeBuffer,
}

/// Opaque ray-tracing engine boundary.
///
/// Implementations must be callable from any thread. `Err` returns are
/// unexpected faults; expected outcomes such as a missing asset are encoded in
/// the `initialize_scene` sentinels instead.
pub trait Engine: Send + Sync {
    /// Load the scene described by `config`; may block for seconds.
    ///
    /// Returns the primitive count, [`SCENE_LOAD_FAILED`] or [`OUT_OF_MEMORY`].
    fn initialize_scene(&self, config: &RenderConfig) -> anyhow::Result<i32>;

    /// Start filling `sink` in place. `is_working` must read true once this
    /// returns `Ok`.
    fn begin_render(&self, sink: SharedBitmap, num_threads: usize, run_async: bool)
        -> anyhow::Result<()>;

    /// Best-effort cooperative cancellation
    fn cancel_render(&self);

    fn poll_status(&self) -> anyhow::Result<EngineStatus>;

    fn allocate_preview_buffer(&self, kind: PreviewBufferKind) -> anyhow::Result<NativeBuffer>;

    fn free_preview_buffer(&self, buffer: NativeBuffer);

    /// One fast rasterised approximation of the loaded scene into `target`
    fn rasterize_preview(&self, buffers: PreviewSet<'_>, target: &mut Bitmap) -> anyhow::Result<()>;

    /// Release the scene once a render has ended, naturally or by cancellation
    fn finish_render(&self);

    fn name(&self) -> &str {
        "engine"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels_decode() {
        assert_eq!(SceneInit::from_raw(OUT_OF_MEMORY), SceneInit::OutOfMemory);
        assert_eq!(SceneInit::from_raw(SCENE_LOAD_FAILED), SceneInit::LoadFailed);
        assert_eq!(SceneInit::from_raw(-17), SceneInit::LoadFailed);
        assert_eq!(
            SceneInit::from_raw(12),
            SceneInit::Loaded { primitives: 12 }
        );
        assert_eq!(SceneInit::from_raw(0), SceneInit::Loaded { primitives: 0 });
    }

    #[test]
    fn buffer_handle_accessors() {
        let buffer = NativeBuffer::new(7, PreviewBufferKind::Camera, 80);
        assert_eq!(buffer.id(), 7);
        assert_eq!(buffer.kind(), PreviewBufferKind::Camera);
        assert_eq!(buffer.len_bytes(), 80);
    }
}
