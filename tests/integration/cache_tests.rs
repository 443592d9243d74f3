//! Memory cache and waiter management integration tests.
//!
//! Tests verify:
//! - Cache hits are delivered synchronously and never reach the transport
//! - clear_cache removes one variant or every variant of a URL
//! - Removed, cancelled and dropped waiters are never notified
//! - reset detaches waiters and keeps older fetches out of the cache

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use image_loader::error::LoadError;
use image_loader::{
    builtin_stylers, ImageLoader, ImageRequest, LoaderStats, RequestOutcome, Waiter,
    GRAYSCALE_STYLE, THUMBNAIL_STYLE,
};

use super::test_utils::{eventually, url, MockTransport, RecordingObserver};

fn counting_waiter(counter: &Arc<AtomicUsize>) -> Waiter {
    let counter = counter.clone();
    Waiter::callback(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    })
}

fn styled_loader(transport: &MockTransport) -> ImageLoader {
    ImageLoader::builder(transport.clone())
        .stylers(builtin_stylers(8))
        .build()
}

// =============================================================================
// Cache Hits
// =============================================================================

#[tokio::test]
async fn test_cache_hit_delivered_synchronously() {
    let img = url("img.png");
    let transport = MockTransport::new().with_png(&img, 4, 4);
    let loader = ImageLoader::new(transport.clone());

    loader.load(img.clone(), None).await.unwrap();
    assert_eq!(transport.fetch_count(), 1);

    let delivered = Arc::new(AtomicBool::new(false));
    let flag = delivered.clone();
    let outcome = loader.request_image(
        ImageRequest::new(img.clone()),
        Waiter::callback(move |outcome| {
            assert!(outcome.image().is_some());
            flag.store(true, Ordering::SeqCst);
        }),
    );

    assert_eq!(outcome, RequestOutcome::CacheHit);
    assert!(delivered.load(Ordering::SeqCst), "Hit must be delivered before returning");
    assert_eq!(transport.fetch_count(), 1, "Cache hit must not fetch");
}

#[tokio::test]
async fn test_cached_image_is_shared() {
    let img = url("img.png");
    let transport = MockTransport::new().with_png(&img, 4, 4);
    let loader = ImageLoader::new(transport);

    let loaded = loader.load(img.clone(), None).await.unwrap();
    let cached = loader.cached_image(&img, None).unwrap();
    let again = loader.load(img.clone(), None).await.unwrap();

    assert!(Arc::ptr_eq(&loaded, &cached));
    assert!(Arc::ptr_eq(&loaded, &again));
}

#[tokio::test]
async fn test_bypass_memory_cache_refetches() {
    let img = url("img.png");
    let transport = MockTransport::new().with_png(&img, 4, 4);
    let loader = ImageLoader::new(transport.clone());

    loader.load(img.clone(), None).await.unwrap();
    loader
        .load_request(ImageRequest::new(img.clone()).bypass_memory_cache())
        .await
        .unwrap();

    assert_eq!(transport.fetch_count(), 2);
}

#[tokio::test]
async fn test_image_or_load() {
    let img = url("img.png");
    let transport = MockTransport::new().with_png(&img, 4, 4);
    let loader = ImageLoader::new(transport.clone());
    let observer = RecordingObserver::new();

    let first = loader.image_or_load(ImageRequest::new(img.clone()), Waiter::observer(&observer));
    assert!(first.is_none());
    observer.wait_for(1).await;

    let second = loader.image_or_load(ImageRequest::new(img.clone()), Waiter::observer(&observer));
    assert!(second.is_some());

    // The hit is returned directly, not delivered to the waiter
    assert_eq!(observer.count(), 1);
    assert_eq!(transport.fetch_count(), 1);
}

// =============================================================================
// Clearing
// =============================================================================

#[tokio::test]
async fn test_clear_one_style_keeps_default() {
    let img = url("img.png");
    let transport = MockTransport::new().with_png(&img, 32, 32);
    let loader = styled_loader(&transport);

    loader.load(img.clone(), None).await.unwrap();
    loader.load(img.clone(), Some(THUMBNAIL_STYLE)).await.unwrap();

    loader.clear_cache(&img, Some(THUMBNAIL_STYLE));

    assert!(loader.has_loaded(&img, None));
    assert!(!loader.has_loaded(&img, Some(THUMBNAIL_STYLE)));
}

#[tokio::test]
async fn test_clear_style_never_loaded_keeps_default() {
    let img = url("img.png");
    let transport = MockTransport::new().with_png(&img, 32, 32);
    let loader = styled_loader(&transport);

    loader.load(img.clone(), None).await.unwrap();
    loader.clear_cache(&img, Some(THUMBNAIL_STYLE));

    assert!(loader.has_loaded(&img, None));
    assert!(!loader.has_loaded(&img, Some(THUMBNAIL_STYLE)));
}

#[tokio::test]
async fn test_clear_without_style_removes_every_variant() {
    let img = url("img.png");
    let other = url("other.png");
    let transport = MockTransport::new()
        .with_png(&img, 32, 32)
        .with_png(&other, 4, 4);
    let loader = styled_loader(&transport);

    loader.load(img.clone(), None).await.unwrap();
    loader.load(img.clone(), Some(THUMBNAIL_STYLE)).await.unwrap();
    loader.load(img.clone(), Some(GRAYSCALE_STYLE)).await.unwrap();
    loader.load(other.clone(), None).await.unwrap();

    loader.clear_cache(&img, None);

    assert!(!loader.has_loaded(&img, None));
    assert!(!loader.has_loaded(&img, Some(THUMBNAIL_STYLE)));
    assert!(!loader.has_loaded(&img, Some(GRAYSCALE_STYLE)));
    assert!(loader.has_loaded(&other, None));
}

#[tokio::test]
async fn test_cleared_variant_is_fetched_again() {
    let img = url("img.png");
    let transport = MockTransport::new().with_png(&img, 4, 4);
    let loader = ImageLoader::new(transport.clone());

    loader.load(img.clone(), None).await.unwrap();
    loader.clear_cache(&img, None);
    loader.load(img.clone(), None).await.unwrap();

    assert_eq!(transport.fetch_count(), 2);
}

// =============================================================================
// Waiter Removal
// =============================================================================

#[tokio::test]
async fn test_removed_waiter_is_not_notified() {
    let img = url("img.png");
    let transport = MockTransport::new().with_png(&img, 4, 4).gated();
    let loader = ImageLoader::new(transport.clone());

    let removed = Arc::new(AtomicUsize::new(0));
    let kept = Arc::new(AtomicUsize::new(0));

    let waiter = counting_waiter(&removed);
    let id = waiter.id();
    loader.request_image(ImageRequest::new(img.clone()), waiter);
    loader.request_image(ImageRequest::new(img.clone()), counting_waiter(&kept));

    assert_eq!(loader.remove_waiter(id, Some(&img), None), 1);
    // Already gone
    assert_eq!(loader.remove_waiter(id, None, None), 0);

    transport.release();
    eventually(|| kept.load(Ordering::SeqCst) == 1).await;

    assert_eq!(removed.load(Ordering::SeqCst), 0);
    assert!(loader.has_loaded(&img, None));
}

#[tokio::test]
async fn test_remove_waiter_scoped_to_style() {
    let img = url("img.png");
    let transport = MockTransport::new().with_png(&img, 16, 16).gated();
    let loader = styled_loader(&transport);
    let observer = RecordingObserver::new();

    loader.request_image(ImageRequest::new(img.clone()), Waiter::observer(&observer));
    loader.request_image(
        ImageRequest::new(img.clone()).with_style(THUMBNAIL_STYLE),
        Waiter::observer(&observer),
    );

    // Only the thumbnail fetch loses the observer
    assert_eq!(
        loader.remove_observer(&observer, Some(&img), Some(THUMBNAIL_STYLE)),
        1
    );

    transport.release();
    observer.wait_for(1).await;
    eventually(|| loader.has_loaded(&img, Some(THUMBNAIL_STYLE))).await;

    let outcomes = observer.outcomes();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].style(), None);
}

#[tokio::test]
async fn test_remove_observer_everywhere() {
    let a = url("a.png");
    let b = url("b.png");
    let transport = MockTransport::new()
        .with_png(&a, 4, 4)
        .with_png(&b, 4, 4)
        .gated();
    let loader = ImageLoader::new(transport.clone());
    let observer = RecordingObserver::new();

    loader.request_image(ImageRequest::new(a.clone()), Waiter::observer(&observer));
    loader.request_image(ImageRequest::new(b.clone()), Waiter::observer(&observer));

    assert_eq!(loader.remove_observer(&observer, None, None), 2);

    transport.release();
    eventually(|| loader.has_loaded(&a, None) && loader.has_loaded(&b, None)).await;

    assert_eq!(observer.count(), 0);
}

#[tokio::test]
async fn test_dropped_observer_is_skipped() {
    let img = url("img.png");
    let transport = MockTransport::new().with_png(&img, 4, 4).gated();
    let loader = ImageLoader::new(transport.clone());

    let gone = RecordingObserver::new();
    let alive = RecordingObserver::new();
    loader.request_image(ImageRequest::new(img.clone()), Waiter::observer(&gone));
    loader.request_image(ImageRequest::new(img.clone()), Waiter::observer(&alive));

    // The loader holds no strong reference to observers
    assert_eq!(Arc::strong_count(&gone), 1);
    drop(gone);

    transport.release();
    alive.wait_for(1).await;
    assert!(alive.outcomes()[0].image().is_some());
}

#[tokio::test]
async fn test_cancel_load_detaches_every_style() {
    let img = url("img.png");
    let transport = MockTransport::new().with_png(&img, 16, 16).gated();
    let loader = styled_loader(&transport);
    let notified = Arc::new(AtomicUsize::new(0));

    loader.request_image(ImageRequest::new(img.clone()), counting_waiter(&notified));
    loader.request_image(ImageRequest::new(img.clone()), counting_waiter(&notified));
    loader.request_image(
        ImageRequest::new(img.clone()).with_style(THUMBNAIL_STYLE),
        counting_waiter(&notified),
    );

    assert_eq!(loader.cancel_load(&img), 3);
    // Fetches keep running
    assert!(loader.is_loading(&img));

    transport.release();
    eventually(|| {
        loader.has_loaded(&img, None) && loader.has_loaded(&img, Some(THUMBNAIL_STYLE))
    })
    .await;

    assert_eq!(notified.load(Ordering::SeqCst), 0);
    assert_eq!(transport.fetch_count(), 2);
    assert!(!loader.is_loading(&img));
}

#[tokio::test]
async fn test_cancelled_load_returns_detached() {
    let img = url("img.png");
    let transport = MockTransport::new().with_png(&img, 4, 4).gated();
    let loader = ImageLoader::new(transport.clone());

    let task = {
        let loader = loader.clone();
        let img = img.clone();
        tokio::spawn(async move { loader.load(img, None).await })
    };
    eventually(|| loader.is_loading(&img)).await;

    loader.cancel_load(&img);
    transport.release();

    assert_eq!(task.await.unwrap().unwrap_err(), LoadError::Detached);
}

#[tokio::test]
async fn test_waiter_joining_after_cancel_is_notified() {
    let img = url("img.png");
    let transport = MockTransport::new().with_png(&img, 4, 4).gated();
    let loader = ImageLoader::new(transport.clone());
    let early = Arc::new(AtomicUsize::new(0));
    let late = Arc::new(AtomicUsize::new(0));

    loader.request_image(ImageRequest::new(img.clone()), counting_waiter(&early));
    loader.cancel_load(&img);

    let outcome = loader.request_image(ImageRequest::new(img.clone()), counting_waiter(&late));
    assert_eq!(outcome, RequestOutcome::Joined);

    transport.release();
    eventually(|| late.load(Ordering::SeqCst) == 1).await;

    assert_eq!(early.load(Ordering::SeqCst), 0);
    assert_eq!(transport.fetch_count(), 1);
}

// =============================================================================
// Reset
// =============================================================================

#[tokio::test]
async fn test_reset_clears_cache_and_detaches_waiters() {
    let cached = url("cached.png");
    let pending = url("pending.png");
    let transport = MockTransport::new()
        .with_png(&cached, 4, 4)
        .with_png(&pending, 4, 4)
        .gated();
    let loader = ImageLoader::new(transport.clone());

    transport.release_one();
    loader.load(cached.clone(), None).await.unwrap();

    let notified = Arc::new(AtomicUsize::new(0));
    loader.request_image(ImageRequest::new(pending.clone()), counting_waiter(&notified));

    loader.reset();

    // The in-flight entry survives so no duplicate fetch can start
    assert_eq!(
        loader.stats(),
        LoaderStats {
            cached: 0,
            pending: 1
        }
    );
    assert!(!loader.has_loaded(&cached, None));
    assert!(loader.is_loading(&pending));

    transport.release();
    eventually(|| !loader.is_loading(&pending)).await;

    // A fetch started before the reset finishes without filling the cache
    assert!(!loader.has_loaded(&pending, None));
    assert_eq!(notified.load(Ordering::SeqCst), 0);
    assert_eq!(transport.fetch_count(), 2);

    loader.load(pending.clone(), None).await.unwrap();
    assert!(loader.has_loaded(&pending, None));
    assert_eq!(transport.fetch_count(), 3);
}

#[tokio::test]
async fn test_request_after_reset_joins_running_fetch() {
    let img = url("img.png");
    let transport = MockTransport::new().with_png(&img, 4, 4).gated();
    let loader = ImageLoader::new(transport.clone());
    let notified = Arc::new(AtomicUsize::new(0));

    loader.request_image(ImageRequest::new(img.clone()), counting_waiter(&notified));
    loader.reset();

    let outcome = loader.request_image(ImageRequest::new(img.clone()), counting_waiter(&notified));
    assert_eq!(outcome, RequestOutcome::Joined);

    transport.release();
    eventually(|| notified.load(Ordering::SeqCst) == 1).await;

    assert_eq!(transport.fetch_count(), 1);
    assert!(!loader.has_loaded(&img, None));
}
