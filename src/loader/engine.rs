//! Image loader orchestrating cache lookups, coalescing and fan-out.
//!
//! ```text
//! request_image(url, style, waiter)
//!        │
//!        ▼
//!  ┌─────────────┐  hit   deliver now
//!  │ MemoryCache │──────▶ (caller's thread)
//!  └──────┬──────┘
//!         │ miss
//!         ▼
//!  ┌───────────────┐ joined   wait for owner
//!  │ FetchRegistry │────────▶
//!  └──────┬────────┘
//!         │ new owner: spawn task
//!         ▼
//!  Transport::fetch ──▶ Styler::style ──▶ MemoryCache::put ──▶ complete()
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::{oneshot, Semaphore};
use tracing::{debug, warn};
use url::Url;

use super::cache::MemoryCache;
use super::key::VariantKey;
use super::registry::{FetchRegistry, Role, WaiterScope};
use super::waiter::{ImageObserver, LoadOutcome, Waiter, WaiterId};
use super::Image;
use crate::error::LoadError;
use crate::io::Transport;
use crate::style::{Styler, StylerRegistry};

/// Default number of fetches allowed to run at the same time.
pub const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 6;

// =============================================================================
// Options and Requests
// =============================================================================

/// Tunables for an [`ImageLoader`].
#[derive(Debug, Clone)]
pub struct LoaderOptions {
    /// Maximum number of fetch+decode operations running at once.
    ///
    /// Additional owners wait for a free slot; values below 1 are raised to 1.
    pub max_concurrent_fetches: usize,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: DEFAULT_MAX_CONCURRENT_FETCHES,
        }
    }
}

/// A request for one variant of an image.
#[derive(Clone)]
pub struct ImageRequest {
    /// Resource to fetch
    pub url: Url,

    /// Named style, `None` for the default variant
    pub style: Option<String>,

    /// Serve from and re-check the memory cache (defaults to `true`)
    pub use_memory_cache: bool,

    /// Styler overriding the registered one for this request's fetch
    pub styler: Option<Arc<dyn Styler>>,
}

impl ImageRequest {
    /// Request the default variant of `url`, using the memory cache.
    pub fn new(url: Url) -> Self {
        Self {
            url,
            style: None,
            use_memory_cache: true,
            styler: None,
        }
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = Some(style.into());
        self
    }

    /// Always go through the registry, even if the variant is cached.
    pub fn bypass_memory_cache(mut self) -> Self {
        self.use_memory_cache = false;
        self
    }

    /// Use `styler` if this request ends up owning the fetch.
    ///
    /// Requests that join an in-flight fetch receive whatever the owner's
    /// styler produced.
    pub fn with_styler(mut self, styler: impl Styler + 'static) -> Self {
        self.styler = Some(Arc::new(styler));
        self
    }

    /// The cache and coalescing key of this request.
    pub fn key(&self) -> VariantKey {
        VariantKey::new(self.url.clone(), self.style.as_deref())
    }
}

impl From<Url> for ImageRequest {
    fn from(url: Url) -> Self {
        Self::new(url)
    }
}

impl fmt::Debug for ImageRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageRequest")
            .field("url", &self.url.as_str())
            .field("style", &self.style)
            .field("use_memory_cache", &self.use_memory_cache)
            .field("custom_styler", &self.styler.is_some())
            .finish()
    }
}

/// What [`ImageLoader::request_image`] did with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// Served from the memory cache; the waiter has already been notified.
    CacheHit,

    /// Attached to a fetch already in flight.
    Joined,

    /// Started a new fetch.
    Started,
}

/// Snapshot of loader state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoaderStats {
    pub cached: usize,
    pub pending: usize,
}

// =============================================================================
// Image Loader
// =============================================================================

/// Fetches, decodes and caches images, coalescing concurrent requests.
///
/// The loader is cheap to clone; clones share the same cache, registry and
/// worker limit. Cache hits are delivered synchronously on the calling
/// thread. Everything else is delivered from the task that owns the fetch.
///
/// # Example
///
/// ```no_run
/// use image_loader::{HttpTransport, ImageLoader, ImageRequest, Waiter};
/// use url::Url;
///
/// #[tokio::main]
/// async fn main() {
///     let loader = ImageLoader::new(HttpTransport::new());
///     let url = Url::parse("https://example.com/logo.png").unwrap();
///
///     // Callback style
///     loader.request_image(
///         ImageRequest::new(url.clone()),
///         Waiter::callback(|outcome| println!("{}: {:?}", outcome.key, outcome.error())),
///     );
///
///     // Async style: joins the fetch started above
///     let image = loader.load(url, None).await.unwrap();
///     println!("{}x{}", image.width(), image.height());
/// }
/// ```
#[derive(Clone)]
pub struct ImageLoader {
    inner: Arc<LoaderInner>,
}

struct LoaderInner {
    transport: Arc<dyn Transport>,
    stylers: StylerRegistry,
    cache: MemoryCache,
    registry: FetchRegistry,
    permits: Semaphore,
    runtime: Handle,
    /// Bumped by `reset`; fetches started earlier do not fill the cache
    generation: AtomicU64,
}

/// Builder for [`ImageLoader`].
pub struct ImageLoaderBuilder {
    transport: Arc<dyn Transport>,
    stylers: StylerRegistry,
    options: LoaderOptions,
    runtime: Option<Handle>,
}

impl ImageLoaderBuilder {
    pub fn stylers(mut self, stylers: StylerRegistry) -> Self {
        self.stylers = stylers;
        self
    }

    /// Register one named styler.
    pub fn style(mut self, name: impl Into<String>, styler: impl Styler + 'static) -> Self {
        self.stylers = self.stylers.with_style(name, styler);
        self
    }

    pub fn options(mut self, options: LoaderOptions) -> Self {
        self.options = options;
        self
    }

    pub fn max_concurrent_fetches(mut self, max: usize) -> Self {
        self.options.max_concurrent_fetches = max;
        self
    }

    /// Runtime on which fetch tasks are spawned.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Build the loader.
    ///
    /// # Panics
    ///
    /// Panics if no runtime was given and this is called outside a Tokio
    /// runtime context.
    pub fn build(self) -> ImageLoader {
        let runtime = self.runtime.unwrap_or_else(Handle::current);
        let permits = self.options.max_concurrent_fetches.max(1);

        ImageLoader {
            inner: Arc::new(LoaderInner {
                transport: self.transport,
                stylers: self.stylers,
                cache: MemoryCache::new(),
                registry: FetchRegistry::new(),
                permits: Semaphore::new(permits),
                runtime,
                generation: AtomicU64::new(0),
            }),
        }
    }
}

impl ImageLoader {
    /// Create a loader with default options and only the default styler.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime context.
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self::builder(transport).build()
    }

    pub fn builder(transport: impl Transport + 'static) -> ImageLoaderBuilder {
        Self::builder_shared(Arc::new(transport))
    }

    /// Builder for a transport already behind an `Arc`.
    pub fn builder_shared(transport: Arc<dyn Transport>) -> ImageLoaderBuilder {
        ImageLoaderBuilder {
            transport,
            stylers: StylerRegistry::new(),
            options: LoaderOptions::default(),
            runtime: None,
        }
    }

    /// Request an image; the result is delivered to `waiter`.
    ///
    /// Returns immediately. On a cache hit the waiter is notified before this
    /// returns. Otherwise the waiter joins the fetch in flight for the same
    /// variant, or a new fetch is spawned. Every waiter that is not removed
    /// receives exactly one outcome.
    pub fn request_image(&self, request: ImageRequest, waiter: Waiter) -> RequestOutcome {
        let key = request.key();

        if request.use_memory_cache {
            if let Some(image) = self.inner.cache.get(&key) {
                debug!("Cache hit for {}", key);
                waiter.deliver(LoadOutcome {
                    key,
                    result: Ok(image),
                });
                return RequestOutcome::CacheHit;
            }
        }

        match self.inner.registry.register_or_join(&key, waiter) {
            Role::JoinedExisting => {
                debug!("Joined in-flight fetch for {}", key);
                RequestOutcome::Joined
            }
            Role::NewFetchOwner => {
                debug!("Starting fetch for {}", key);
                let generation = self.inner.generation.load(Ordering::Acquire);
                let inner = self.inner.clone();
                let guard = CompleteOnDrop {
                    inner: self.inner.clone(),
                    key: Some(key.clone()),
                };
                self.inner.runtime.spawn(async move {
                    inner.run_fetch(key, request, generation, guard).await;
                });
                RequestOutcome::Started
            }
        }
    }

    /// Return the cached image, or start loading it for `waiter`.
    ///
    /// On a cache hit the image is returned and `waiter` is dropped without
    /// being notified. On a miss `None` is returned and the request proceeds
    /// as in [`request_image`](Self::request_image).
    pub fn image_or_load(&self, request: ImageRequest, waiter: Waiter) -> Option<Image> {
        if request.use_memory_cache {
            if let Some(image) = self.inner.cache.get(&request.key()) {
                return Some(image);
            }
        }
        self.request_image(request, waiter);
        None
    }

    /// Load one variant and wait for it.
    pub async fn load(&self, url: Url, style: Option<&str>) -> Result<Image, LoadError> {
        let mut request = ImageRequest::new(url);
        request.style = style.map(str::to_owned);
        self.load_request(request).await
    }

    /// Same as [`load`](Self::load) for a full request.
    ///
    /// Returns [`LoadError::Detached`] if the waiter is removed (for example
    /// by [`cancel_load`](Self::cancel_load)) before the fetch completes.
    pub async fn load_request(&self, request: ImageRequest) -> Result<Image, LoadError> {
        let (tx, rx) = oneshot::channel();
        self.request_image(
            request,
            Waiter::callback(move |outcome: LoadOutcome| {
                // The receiver may have been dropped by a cancelled caller
                let _ = tx.send(outcome.result);
            }),
        );
        rx.await.unwrap_or(Err(LoadError::Detached))
    }

    /// Whether any style of `url` is currently being fetched.
    pub fn is_loading(&self, url: &Url) -> bool {
        self.inner.registry.is_in_flight(url)
    }

    /// Stop delivering results for every style of `url`.
    ///
    /// In-flight fetches are not aborted; they still fill the cache. Returns
    /// the number of detached waiters.
    pub fn cancel_load(&self, url: &Url) -> usize {
        let detached = self.inner.registry.detach_all(url);
        debug!("Cancelled {} waiter(s) for {}", detached, url);
        detached
    }

    /// Whether the variant is in the memory cache.
    pub fn has_loaded(&self, url: &Url, style: Option<&str>) -> bool {
        self.inner
            .cache
            .contains(&VariantKey::new(url.clone(), style))
    }

    /// The cached image for a variant, without loading it.
    pub fn cached_image(&self, url: &Url, style: Option<&str>) -> Option<Image> {
        self.inner.cache.get(&VariantKey::new(url.clone(), style))
    }

    /// Drop cached images.
    ///
    /// With a style, removes exactly that variant. Without one, removes every
    /// cached style of `url`, including the default variant.
    pub fn clear_cache(&self, url: &Url, style: Option<&str>) {
        match style {
            Some(style) => {
                self.inner
                    .cache
                    .remove(&VariantKey::new(url.clone(), Some(style)));
            }
            None => {
                self.inner.cache.remove_all(url);
            }
        }
    }

    /// Detach a waiter before its result arrives.
    ///
    /// Without a URL the waiter is removed from every pending fetch. With a
    /// URL but no style it is removed from every style of that URL; with both
    /// only from that variant. Returns the number of detachments.
    pub fn remove_waiter(&self, id: WaiterId, url: Option<&Url>, style: Option<&str>) -> usize {
        with_scope(url, style, |scope| {
            self.inner.registry.remove_waiter(id, scope)
        })
    }

    /// Detach every waiter notifying `observer`, scoped like
    /// [`remove_waiter`](Self::remove_waiter).
    pub fn remove_observer<O>(
        &self,
        observer: &Arc<O>,
        url: Option<&Url>,
        style: Option<&str>,
    ) -> usize
    where
        O: ImageObserver + ?Sized,
    {
        with_scope(url, style, |scope| {
            self.inner.registry.remove_observer(observer, scope)
        })
    }

    /// Clear the cache and detach every waiter.
    ///
    /// Fetches already running are not aborted and their results are never
    /// cached. Their registry entries stay until they finish, so a request
    /// for the same variant made in the meantime joins the old fetch and
    /// receives its result instead of starting a second one.
    pub fn reset(&self) {
        // Bump before clearing so a concurrent put is either cleared or undone
        self.inner.generation.fetch_add(1, Ordering::AcqRel);
        let detached = self.inner.registry.clear();
        self.inner.cache.clear();
        debug!("Loader reset, {} waiter(s) detached", detached);
    }

    pub fn stats(&self) -> LoaderStats {
        LoaderStats {
            cached: self.inner.cache.len(),
            pending: self.inner.registry.pending_count(),
        }
    }

    pub fn stylers(&self) -> &StylerRegistry {
        &self.inner.stylers
    }
}

impl fmt::Debug for ImageLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageLoader")
            .field("stats", &self.stats())
            .field("stylers", &self.inner.stylers)
            .finish_non_exhaustive()
    }
}

fn with_scope<R>(
    url: Option<&Url>,
    style: Option<&str>,
    f: impl FnOnce(WaiterScope<'_>) -> R,
) -> R {
    match (url, style) {
        (None, _) => f(WaiterScope::All),
        (Some(url), None) => f(WaiterScope::Url(url)),
        (Some(url), Some(style)) => {
            let key = VariantKey::new(url.clone(), Some(style));
            f(WaiterScope::Key(&key))
        }
    }
}

// =============================================================================
// Fetch Task
// =============================================================================

/// Completes a pending fetch with [`LoadError::Aborted`] if its owning task
/// ends without completing it (panic or runtime shutdown).
struct CompleteOnDrop {
    inner: Arc<LoaderInner>,
    key: Option<VariantKey>,
}

impl CompleteOnDrop {
    fn complete(mut self, result: Result<Image, LoadError>) {
        if let Some(key) = self.key.take() {
            let completion = self.inner.registry.complete(&key, result);
            debug!(
                "Completed {} in {:?}: {} delivered, {} skipped, {} panicked",
                key,
                completion.elapsed,
                completion.delivered,
                completion.skipped,
                completion.panicked
            );
        }
    }
}

impl Drop for CompleteOnDrop {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            warn!("Fetch task for {} ended without a result", key);
            self.inner.registry.complete(
                &key,
                Err(LoadError::Aborted("fetch task ended without a result".to_string())),
            );
        }
    }
}

impl LoaderInner {
    async fn run_fetch(
        &self,
        key: VariantKey,
        request: ImageRequest,
        generation: u64,
        guard: CompleteOnDrop,
    ) {
        let result = self.fetch_and_style(&key, request).await;

        match &result {
            Ok(image) => self.cache_unless_reset(&key, image, generation),
            Err(e) => warn!("Failed to load {}: {}", key, e),
        }

        guard.complete(result);
    }

    /// Cache a fetched image unless the loader was reset since the fetch
    /// started.
    ///
    /// Only the owner of `key` puts it while its fetch is pending, so undoing
    /// the put cannot remove another fetch's entry.
    fn cache_unless_reset(&self, key: &VariantKey, image: &Image, generation: u64) {
        self.cache.put(key.clone(), image.clone());
        if self.generation.load(Ordering::Acquire) != generation {
            self.cache.remove(key);
            debug!("Discarded result for {} fetched before reset", key);
        }
    }

    async fn fetch_and_style(
        &self,
        key: &VariantKey,
        request: ImageRequest,
    ) -> Result<Image, LoadError> {
        // Configuration errors fail before any network traffic
        let styler = match request.styler {
            Some(styler) => styler,
            None => self.stylers.resolve(key.style())?,
        };

        // The semaphore is never closed, so acquiring cannot fail
        let _permit = self.permits.acquire().await.ok();

        // A previous owner may have completed between our cache miss and
        // our registration
        if request.use_memory_cache {
            if let Some(image) = self.cache.get(key) {
                debug!("Cache filled while queued for {}", key);
                return Ok(image);
            }
        }

        let data = self.transport.fetch(key.url()).await?;

        let style = key.style().map(str::to_owned);
        let image = tokio::task::spawn_blocking(move || styler.style(&data, style.as_deref()))
            .await
            .map_err(|e| LoadError::Aborted(e.to_string()))??;

        Ok(Arc::new(image))
    }
}
