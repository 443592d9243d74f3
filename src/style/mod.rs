//! Stylers: raw bytes to decoded image.
//!
//! A styler is the pluggable decode/transform step run by the task that owns
//! a fetch. Each variant of a URL (`None` for the default rendering, or a
//! named style such as `"thumbnail"`) is produced by exactly one styler,
//! looked up in a [`StylerRegistry`] unless the request supplies its own.
//!
//! # Example
//!
//! ```
//! use image_loader::style::{StylerRegistry, ThumbnailStyler, GrayscaleStyler};
//!
//! let stylers = StylerRegistry::new()
//!     .with_style("thumbnail", ThumbnailStyler::square(64))
//!     .with_style("grayscale", GrayscaleStyler::new());
//!
//! assert!(stylers.resolve(Some("thumbnail")).is_ok());
//! assert!(stylers.resolve(Some("sepia")).is_err());
//! ```

mod builtin;
mod styler;

pub use builtin::{
    builtin_stylers, decode_image, DecodeStyler, GrayscaleStyler, ThumbnailStyler,
    DEFAULT_THUMBNAIL_SIZE, GRAYSCALE_STYLE, THUMBNAIL_STYLE,
};
pub use styler::{Styler, StylerRegistry};
