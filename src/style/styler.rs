use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use image::DynamicImage;

use super::builtin::DecodeStyler;
use crate::error::DecodeError;

/// Turns fetched bytes into the decoded image for one variant.
///
/// Stylers must be pure: the same bytes and style always produce the same
/// image. They run on the blocking pool and may be called from any worker.
pub trait Styler: Send + Sync {
    fn style(&self, data: &[u8], style: Option<&str>) -> Result<DynamicImage, DecodeError>;
}

impl<F> Styler for F
where
    F: Fn(&[u8], Option<&str>) -> Result<DynamicImage, DecodeError> + Send + Sync,
{
    fn style(&self, data: &[u8], style: Option<&str>) -> Result<DynamicImage, DecodeError> {
        self(data, style)
    }
}

/// Named stylers known to a loader.
///
/// The default variant (no style) always resolves to the default styler, a
/// plain [`DecodeStyler`] unless replaced. Named styles only resolve if they
/// were registered.
#[derive(Clone)]
pub struct StylerRegistry {
    default: Arc<dyn Styler>,
    named: HashMap<String, Arc<dyn Styler>>,
}

impl StylerRegistry {
    /// Create a registry with only the default decoder.
    pub fn new() -> Self {
        Self {
            default: Arc::new(DecodeStyler::new()),
            named: HashMap::new(),
        }
    }

    /// Replace the styler used for the default variant.
    pub fn with_default(mut self, styler: impl Styler + 'static) -> Self {
        self.default = Arc::new(styler);
        self
    }

    /// Register a styler under `name`, replacing any previous one.
    pub fn with_style(mut self, name: impl Into<String>, styler: impl Styler + 'static) -> Self {
        self.register(name, Arc::new(styler));
        self
    }

    /// Register a shared styler under `name`.
    pub fn register(&mut self, name: impl Into<String>, styler: Arc<dyn Styler>) {
        self.named.insert(name.into(), styler);
    }

    /// Look up the styler for a variant.
    ///
    /// Returns [`DecodeError::MissingStyler`] for an unregistered style name.
    pub fn resolve(&self, style: Option<&str>) -> Result<Arc<dyn Styler>, DecodeError> {
        match style {
            None => Ok(self.default.clone()),
            Some(name) => self
                .named
                .get(name)
                .cloned()
                .ok_or_else(|| DecodeError::MissingStyler {
                    style: name.to_string(),
                }),
        }
    }

    /// Whether a styler is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.named.contains_key(name)
    }

    /// Registered style names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.named.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for StylerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StylerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StylerRegistry")
            .field("named", &self.names())
            .finish_non_exhaustive()
    }
}
