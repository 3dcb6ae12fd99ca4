//! Image collaborators consumed by the store.
//!
//! Encoding camera frames and cropping/thumbnailing stored images are pure
//! functions supplied by the host; the store only moves bytes between them and
//! the blob repository.

use crate::entity::CropRegion;
use crate::error::Result;

/// A captured image handed to the store when a page is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImage {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Image bytes as produced by the capture pipeline
    pub data: Vec<u8>,
}

impl RawImage {
    /// Wrap captured image bytes.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data,
        }
    }

    /// The crop region covering the whole image.
    pub fn bounds(&self) -> CropRegion {
        CropRegion::full(self.width, self.height)
    }
}

/// Decoded pixels produced by a [`PageRenderer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Pixel data, row major
    pub pixels: Vec<u8>,
}

/// Lossy encoder applied to a captured image before it is stored as a blob.
pub trait ImageEncoder: Send + Sync {
    /// Encode `image` at `quality` in `(0, 1]`.
    fn encode(&self, image: &RawImage, quality: f32) -> Result<Vec<u8>>;
}

/// Encoder for hosts whose capture pipeline already produces compressed bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughEncoder;

impl ImageEncoder for PassthroughEncoder {
    fn encode(&self, image: &RawImage, _quality: f32) -> Result<Vec<u8>> {
        Ok(image.data.clone())
    }
}

/// Renders stored page images.
pub trait PageRenderer {
    /// Render the cropped portion of an encoded image at full resolution.
    fn render(&self, image: &[u8], crop_region: &CropRegion) -> Result<PixelBuffer>;

    /// Render the cropped portion scaled so neither side exceeds `max_dimension`.
    fn render_thumbnail(
        &self,
        image: &[u8],
        crop_region: &CropRegion,
        max_dimension: u32,
    ) -> Result<PixelBuffer>;
}
