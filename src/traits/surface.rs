use crate::core::bitmap::Bitmap;

/// Display surface owned by the display thread.
///
/// Only `Send`: a surface is moved onto the display thread once and never
/// touched from anywhere else.
pub trait DisplaySurface: Send {
    /// Current size of the drawable area in physical pixels
    fn surface_size(&self) -> (u32, u32);

    /// Upload `image` as the display texture and present it
    fn upload(&mut self, image: &Bitmap) -> anyhow::Result<()>;
}
