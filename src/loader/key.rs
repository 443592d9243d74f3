//! Cache and coalescing key.
//!
//! Every style of a URL is a separate [`VariantKey`], so variants are cached
//! and fetched independently.

use std::fmt;
use std::sync::Arc;

use url::Url;

/// Identity of one cacheable rendering of an image.
///
/// A key combines the resource URL with an optional style name. Two keys are
/// equal iff both match exactly; a key without a style is the default
/// variant, distinct from every named style of the same URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VariantKey {
    url: Url,
    style: Option<Arc<str>>,
}

impl VariantKey {
    /// Create a key for `url` rendered with `style`.
    pub fn new(url: Url, style: Option<&str>) -> Self {
        Self {
            url,
            style: style.map(Arc::from),
        }
    }

    /// Key for the default (unstyled) variant.
    pub fn default_variant(url: Url) -> Self {
        Self { url, style: None }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn style(&self) -> Option<&str> {
        self.style.as_deref()
    }

    /// Whether this is the default variant.
    pub fn is_default(&self) -> bool {
        self.style.is_none()
    }
}

impl fmt::Display for VariantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.style {
            Some(style) => write!(f, "{} [{}]", self.url, style),
            None => write!(f, "{}", self.url),
        }
    }
}
