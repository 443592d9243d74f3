//! Request coalescing and caching engine.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │   Callers (callbacks, observers)        │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │              ImageLoader                │
//! │  ┌──────────────┐  ┌─────────────────┐  │
//! │  │ MemoryCache  │  │  FetchRegistry  │  │
//! │  │ (decoded     │  │  (in-flight     │  │
//! │  │  images)     │  │   + waiters)    │  │
//! │  └──────────────┘  └─────────────────┘  │
//! └────────────────────┬────────────────────┘
//!                      │
//!          ┌───────────┴───────────┐
//!          ▼                       ▼
//! ┌─────────────────┐    ┌─────────────────────┐
//! │    Transport    │    │       Styler        │
//! │  (raw bytes)    │    │  (decode/transform) │
//! └─────────────────┘    └─────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`ImageLoader`]: public entry point; decides between cache hit, joining
//!   an in-flight fetch and starting a new one
//! - [`MemoryCache`]: decoded images per [`VariantKey`]
//! - [`FetchRegistry`]: at most one pending fetch per key, with its waiters
//! - [`Waiter`]: a completion callback or weakly-held [`ImageObserver`]
//!
//! # Guarantees
//!
//! - One pending fetch per variant; joining never starts a second fetch
//! - A cache hit never reaches the transport
//! - Every attached waiter gets exactly one [`LoadOutcome`]

mod cache;
mod engine;
mod key;
mod registry;
mod waiter;

use std::sync::Arc;

use image::DynamicImage;

/// A decoded image shared between the cache and every waiter.
pub type Image = Arc<DynamicImage>;

pub use cache::MemoryCache;
pub use engine::{
    ImageLoader, ImageLoaderBuilder, ImageRequest, LoaderOptions, LoaderStats, RequestOutcome,
    DEFAULT_MAX_CONCURRENT_FETCHES,
};
pub use key::VariantKey;
pub use registry::{Completion, FetchRegistry, Role, WaiterScope};
pub use waiter::{ImageObserver, LoadOutcome, Waiter, WaiterId};
