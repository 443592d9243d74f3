//! Built-in stylers.
//!
//! - [`DecodeStyler`]: decodes the bytes as-is, sniffing the format
//! - [`ThumbnailStyler`]: decodes, then fits the image into a bounding box
//! - [`GrayscaleStyler`]: decodes, then converts to 8-bit luma

use std::io::Cursor;

use image::{DynamicImage, ImageError, ImageReader};

use super::{Styler, StylerRegistry};
use crate::error::DecodeError;

/// Default bounding box edge for thumbnails, in pixels.
pub const DEFAULT_THUMBNAIL_SIZE: u32 = 128;

/// Style name of the built-in [`ThumbnailStyler`].
pub const THUMBNAIL_STYLE: &str = "thumbnail";

/// Style name of the built-in [`GrayscaleStyler`].
pub const GRAYSCALE_STYLE: &str = "grayscale";

/// Registry with every built-in style registered under its standard name.
pub fn builtin_stylers(thumbnail_size: u32) -> StylerRegistry {
    StylerRegistry::new()
        .with_style(THUMBNAIL_STYLE, ThumbnailStyler::square(thumbnail_size))
        .with_style(GRAYSCALE_STYLE, GrayscaleStyler::new())
}

/// Decode raw bytes, guessing the format from the content.
pub fn decode_image(data: &[u8]) -> Result<DynamicImage, DecodeError> {
    let reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| DecodeError::Malformed(e.to_string()))?;

    if reader.format().is_none() {
        return Err(DecodeError::UnsupportedFormat(
            "could not detect image format".to_string(),
        ));
    }

    reader.decode().map_err(|e| match e {
        ImageError::Unsupported(e) => DecodeError::UnsupportedFormat(e.to_string()),
        e => DecodeError::Malformed(e.to_string()),
    })
}

/// Plain decoder used for the default variant.
#[derive(Debug, Clone, Default)]
pub struct DecodeStyler;

impl DecodeStyler {
    pub fn new() -> Self {
        Self
    }
}

impl Styler for DecodeStyler {
    fn style(&self, data: &[u8], _style: Option<&str>) -> Result<DynamicImage, DecodeError> {
        decode_image(data)
    }
}

/// Decodes and shrinks an image to fit within `max_width` x `max_height`.
///
/// Aspect ratio is preserved. Images already inside the box are returned at
/// their native size.
#[derive(Debug, Clone)]
pub struct ThumbnailStyler {
    max_width: u32,
    max_height: u32,
}

impl ThumbnailStyler {
    /// Create a thumbnail styler with a bounding box.
    ///
    /// Zero dimensions are raised to 1.
    pub fn new(max_width: u32, max_height: u32) -> Self {
        Self {
            max_width: max_width.max(1),
            max_height: max_height.max(1),
        }
    }

    /// Square bounding box.
    pub fn square(size: u32) -> Self {
        Self::new(size, size)
    }

    pub fn max_size(&self) -> (u32, u32) {
        (self.max_width, self.max_height)
    }
}

impl Default for ThumbnailStyler {
    fn default() -> Self {
        Self::square(DEFAULT_THUMBNAIL_SIZE)
    }
}

impl Styler for ThumbnailStyler {
    fn style(&self, data: &[u8], _style: Option<&str>) -> Result<DynamicImage, DecodeError> {
        let img = decode_image(data)?;
        if img.width() <= self.max_width && img.height() <= self.max_height {
            return Ok(img);
        }
        Ok(img.thumbnail(self.max_width, self.max_height))
    }
}

/// Decodes and converts to grayscale.
#[derive(Debug, Clone, Default)]
pub struct GrayscaleStyler;

impl GrayscaleStyler {
    pub fn new() -> Self {
        Self
    }
}

impl Styler for GrayscaleStyler {
    fn style(&self, data: &[u8], _style: Option<&str>) -> Result<DynamicImage, DecodeError> {
        let img = decode_image(data)?;
        Ok(DynamicImage::ImageLuma8(img.to_luma8()))
    }
}
