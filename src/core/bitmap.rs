use std::sync::Arc;

use parking_lot::RwLock;

/// Output image shared between the engine (writer) and the composer (reader)
pub type SharedBitmap = Arc<RwLock<Bitmap>>;

pub const BYTES_PER_PIXEL: usize = 4;
pub const BYTES_IN_MEGABYTE: usize = 1_048_576;

/// Opaque black, the colour a fresh framebuffer is erased to
pub const BLACK: [u8; 4] = [0, 0, 0, 255];

/// RGBA8 framebuffer image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Bitmap {
    /// Create a bitmap erased to opaque black
    pub fn new(width: u32, height: u32) -> Self {
        let len = width as usize * height as usize * BYTES_PER_PIXEL;
        let mut pixels = Vec::with_capacity(len);
        for _ in 0..(width as usize * height as usize) {
            pixels.extend_from_slice(&BLACK);
        }
        Self { width, height, pixels }
    }

    /// Bytes a `width x height` RGBA image needs
    pub fn required_bytes(width: u32, height: u32) -> u64 {
        width as u64 * height as u64 * BYTES_PER_PIXEL as u64
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
        let mut rgba = [0u8; 4];
        rgba.copy_from_slice(&self.pixels[idx..idx + BYTES_PER_PIXEL]);
        Some(rgba)
    }

    pub fn put_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        if x >= self.width || y >= self.height {
            return;
        }
        let idx = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
        self.pixels[idx..idx + BYTES_PER_PIXEL].copy_from_slice(&rgba);
    }

    /// Fill every pixel with one colour
    pub fn erase(&mut self, rgba: [u8; 4]) {
        for px in self.pixels.chunks_exact_mut(BYTES_PER_PIXEL) {
            px.copy_from_slice(&rgba);
        }
    }

    /// Nearest-neighbour rescale into a new bitmap
    pub fn resized(&self, width: u32, height: u32) -> Bitmap {
        let mut out = Bitmap::new(width, height);
        if self.width == 0 || self.height == 0 {
            return out;
        }
        for y in 0..height {
            let src_y = (y as u64 * self.height as u64 / height.max(1) as u64) as u32;
            for x in 0..width {
                let src_x = (x as u64 * self.width as u64 / width.max(1) as u64) as u32;
                if let Some(rgba) = self.pixel(src_x, src_y) {
                    out.put_pixel(x, y, rgba);
                }
            }
        }
        out
    }

    pub fn into_shared(self) -> SharedBitmap {
        Arc::new(RwLock::new(self))
    }
}
