use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

use crate::error::TransportError;

/// Trait for fetching the raw bytes behind an image URL.
///
/// The loader calls `fetch` at most once per in-flight variant, from the
/// task that owns the fetch. Implementations must be thread-safe; they are
/// shared across every owning task through an `Arc`.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch the full body of the resource at `url`.
    ///
    /// Returns an error for network failures, non-success responses, and
    /// timeouts. The loader never retries a failed fetch.
    async fn fetch(&self, url: &Url) -> Result<Bytes, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    async fn fetch(&self, url: &Url) -> Result<Bytes, TransportError> {
        (**self).fetch(url).await
    }
}
