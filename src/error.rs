use thiserror::Error;

/// Errors raised while fetching raw image bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Network or connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Server answered with a non-success status
    #[error("HTTP {status} for {url}")]
    Status { status: u16, url: String },

    /// Request did not finish within the transport timeout
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// The transport cannot fetch URLs with this scheme
    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),
}

/// Errors raised while turning raw bytes into a decoded image.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Bytes could not be decoded
    #[error("Malformed image data: {0}")]
    Malformed(String),

    /// Bytes are in a format we cannot decode
    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// No styler is registered for the requested style
    #[error("No styler registered for style '{style}'")]
    MissingStyler { style: String },
}

/// Terminal failure delivered to every waiter of a fetch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// The task owning the fetch panicked or was cancelled
    #[error("Load aborted: {0}")]
    Aborted(String),

    /// The waiter was removed before a result was delivered
    #[error("Waiter detached before the load completed")]
    Detached,
}

impl LoadError {
    /// Whether this failure came from the transport layer.
    pub fn is_transport(&self) -> bool {
        matches!(self, LoadError::Transport(_))
    }

    /// Whether this failure came from decoding or styling.
    pub fn is_decode(&self) -> bool {
        matches!(self, LoadError::Decode(_))
    }
}

/// Invalid command-line or environment configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{field} must be greater than 0")]
    Zero { field: &'static str },

    #[error("Unknown style '{0}' (expected one of: thumbnail, grayscale)")]
    UnknownStyle(String),

    #[error("At least one URL is required")]
    NoUrls,
}
