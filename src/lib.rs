//! # Image Loader
//!
//! An image fetching and caching engine that coalesces concurrent requests
//! for the same image variant.
//!
//! Many parts of an application can ask for the same remote image at the
//! same time. The loader guarantees that at most one fetch and decode runs
//! per variant, fans the single result out to every waiter, and keeps the
//! decoded image in memory for later requests.
//!
//! ## Features
//!
//! - **Request coalescing**: Concurrent requests for one variant share one fetch
//! - **Memory cache**: Decoded images are shared as `Arc` between all consumers
//! - **Variants**: Named styles (thumbnail, grayscale, or your own) are cached separately
//! - **Cancellation**: Waiters can be detached at any time; fetches still fill the cache
//! - **Pluggable transport**: HTTP via reqwest, or any [`Transport`] implementation
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`loader`] - Variant keys, memory cache, fetch registry and the loader itself
//! - [`style`] - Stylers turning raw bytes into decoded images
//! - [`io`] - Transport abstraction and HTTP implementation
//! - [`config`] - CLI configuration for the `image-loader` binary
//! - [`error`] - Error types shared by every layer
//!
//! ## Example
//!
//! ```rust,no_run
//! use image_loader::{builtin_stylers, HttpTransport, ImageLoader, ImageRequest, Waiter};
//! use url::Url;
//!
//! #[tokio::main]
//! async fn main() {
//!     let loader = ImageLoader::builder(HttpTransport::new())
//!         .stylers(builtin_stylers(128))
//!         .build();
//!
//!     let url = Url::parse("https://example.com/photo.jpg").unwrap();
//!
//!     // Both requests are served by one fetch
//!     loader.request_image(
//!         ImageRequest::new(url.clone()).with_style("thumbnail"),
//!         Waiter::callback(|outcome| println!("first: {:?}", outcome.error())),
//!     );
//!     let thumb = loader.load(url.clone(), Some("thumbnail")).await.unwrap();
//!
//!     println!("{}x{}", thumb.width(), thumb.height());
//!     assert!(loader.has_loaded(&url, Some("thumbnail")));
//! }
//! ```

pub mod config;
pub mod error;
pub mod io;
pub mod loader;
pub mod style;

// Re-export commonly used types
pub use config::{Config, OutputFormat};
pub use error::{ConfigError, DecodeError, LoadError, TransportError};
pub use io::{HttpTransport, Transport, DEFAULT_REQUEST_TIMEOUT, DEFAULT_USER_AGENT};
pub use loader::{
    Completion, FetchRegistry, Image, ImageLoader, ImageLoaderBuilder, ImageObserver,
    ImageRequest, LoadOutcome, LoaderOptions, LoaderStats, MemoryCache, RequestOutcome, Role,
    VariantKey, Waiter, WaiterId, WaiterScope, DEFAULT_MAX_CONCURRENT_FETCHES,
};
pub use style::{
    builtin_stylers, decode_image, DecodeStyler, GrayscaleStyler, Styler, StylerRegistry,
    ThumbnailStyler, DEFAULT_THUMBNAIL_SIZE, GRAYSCALE_STYLE, THUMBNAIL_STYLE,
};
