use std::sync::Arc;

use anyhow::bail;
use parking_lot::Mutex;

use crate::core::bitmap::Bitmap;
use crate::traits::DisplaySurface;

#[derive(Debug, Default)]
struct Presented {
    width: u32,
    height: u32,
    uploads: u64,
    last_frame: Option<Bitmap>,
    fail_uploads: bool,
}

/// Off-screen display surface that keeps the last presented texture.
///
/// Clones share state, so a test can keep one clone while the coordinator
/// moves the other onto the display thread.
#[derive(Debug, Clone)]
pub struct HeadlessSurface {
    inner: Arc<Mutex<Presented>>,
}

impl HeadlessSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Presented {
                width,
                height,
                ..Presented::default()
            })),
        }
    }

    pub fn resize(&self, width: u32, height: u32) {
        let mut inner = self.inner.lock();
        inner.width = width;
        inner.height = height;
    }

    pub fn uploads(&self) -> u64 {
        self.inner.lock().uploads
    }

    pub fn last_frame(&self) -> Option<Bitmap> {
        self.inner.lock().last_frame.clone()
    }

    /// Make every following upload fail
    pub fn fail_uploads(&self, fail: bool) {
        self.inner.lock().fail_uploads = fail;
    }
}

impl DisplaySurface for HeadlessSurface {
    fn surface_size(&self) -> (u32, u32) {
        let inner = self.inner.lock();
        (inner.width, inner.height)
    }

    fn upload(&mut self, image: &Bitmap) -> anyhow::Result<()> {
        let mut inner = self.inner.lock();
        if inner.fail_uploads {
            bail!("display texture upload rejected");
        }
        inner.uploads += 1;
        match inner.last_frame.as_mut() {
            Some(frame) if frame.dimensions() == image.dimensions() => {
                frame.pixels_mut().copy_from_slice(image.pixels());
            }
            _ => inner.last_frame = Some(image.clone()),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_uploads() {
        let probe = HeadlessSurface::new(4, 4);
        let mut surface = probe.clone();
        let mut image = Bitmap::new(2, 2);
        image.put_pixel(1, 1, [9, 9, 9, 255]);

        surface.upload(&image).unwrap();
        surface.upload(&image).unwrap();

        assert_eq!(probe.uploads(), 2);
        assert_eq!(probe.last_frame().unwrap().pixel(1, 1), Some([9, 9, 9, 255]));
    }

    #[test]
    fn test_failed_upload_is_an_error() {
        let mut surface = HeadlessSurface::new(4, 4);
        surface.fail_uploads(true);
        assert!(surface.upload(&Bitmap::new(1, 1)).is_err());
        assert_eq!(surface.uploads(), 0);
    }
}
