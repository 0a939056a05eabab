use crate::core::composer::{FrameComposer, FrameOutcome};
use crate::error::RenderResult;
use crate::traits::DisplaySurface;

/// Everything that may only be touched on the display thread
pub struct DisplayContext {
    pub composer: FrameComposer,
    pub surface: Box<dyn DisplaySurface>,
}

impl DisplayContext {
    pub fn new(composer: FrameComposer, surface: Box<dyn DisplaySurface>) -> Self {
        Self { composer, surface }
    }

    /// Surface size as signed dimensions, the form `set_bitmap` validates
    pub fn surface_size(&self) -> (i32, i32) {
        let (w, h) = self.surface.surface_size();
        (
            i32::try_from(w).unwrap_or(i32::MAX),
            i32::try_from(h).unwrap_or(i32::MAX),
        )
    }

    pub fn draw_frame(&mut self) -> RenderResult<FrameOutcome> {
        self.composer.draw_frame(self.surface.as_mut())
    }
}
