//! In-memory image cache.
//!
//! Decoded images are stored per [`VariantKey`] for the lifetime of the
//! process. There is no eviction: entries leave the cache only when a
//! variant (or every variant of a URL) is cleared explicitly.

use std::collections::HashMap;

use parking_lot::Mutex;
use url::Url;

use super::key::VariantKey;
use super::Image;

/// Thread-safe map from variant to decoded image.
///
/// All operations take a single short-lived lock and never block on I/O, so
/// the cache can be consulted from any thread, including inside completion
/// callbacks.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use image::DynamicImage;
/// use image_loader::loader::{MemoryCache, VariantKey};
/// use url::Url;
///
/// let cache = MemoryCache::new();
/// let key = VariantKey::new(Url::parse("http://x/img.png").unwrap(), Some("thumbnail"));
///
/// cache.put(key.clone(), Arc::new(DynamicImage::new_rgb8(4, 4)));
/// assert!(cache.contains(&key));
///
/// assert_eq!(cache.remove_all(key.url()), 1);
/// assert!(cache.is_empty());
/// ```
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<VariantKey, Image>>,
}

impl MemoryCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the image for a variant, if cached.
    pub fn get(&self, key: &VariantKey) -> Option<Image> {
        self.entries.lock().get(key).cloned()
    }

    /// Check if a variant is cached.
    pub fn contains(&self, key: &VariantKey) -> bool {
        self.entries.lock().contains_key(key)
    }

    /// Store an image, replacing any existing entry for the variant.
    pub fn put(&self, key: VariantKey, image: Image) {
        self.entries.lock().insert(key, image);
    }

    /// Remove exactly one variant.
    ///
    /// Returns the cached image if it existed.
    pub fn remove(&self, key: &VariantKey) -> Option<Image> {
        self.entries.lock().remove(key)
    }

    /// Remove every variant of `url`, whatever its style.
    ///
    /// Returns the number of entries removed.
    pub fn remove_all(&self, url: &Url) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|key, _| key.url() != url);
        before - entries.len()
    }

    /// Remove every entry.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Number of cached variants.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
