//! Configuration for the `image-loader` command-line tool.
//!
//! Options come from command-line arguments, with environment variable
//! fallbacks using the `IMAGE_LOADER_` prefix:
//!
//! - `IMAGE_LOADER_STYLE` - Style to request (thumbnail, grayscale)
//! - `IMAGE_LOADER_THUMBNAIL_SIZE` - Thumbnail bounding box edge (default: 128)
//! - `IMAGE_LOADER_WORKERS` - Max concurrent fetches (default: 6)
//! - `IMAGE_LOADER_TIMEOUT_SECS` - Per-request timeout (default: 30)
//! - `IMAGE_LOADER_USER_AGENT` - User-Agent header

use std::time::Duration;

use clap::{Parser, ValueEnum};
use url::Url;

use crate::error::ConfigError;
use crate::io::{HttpTransport, DEFAULT_REQUEST_TIMEOUT, DEFAULT_USER_AGENT};
use crate::loader::{LoaderOptions, DEFAULT_MAX_CONCURRENT_FETCHES};
use crate::style::{
    builtin_stylers, StylerRegistry, DEFAULT_THUMBNAIL_SIZE, GRAYSCALE_STYLE, THUMBNAIL_STYLE,
};

/// Default per-request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = DEFAULT_REQUEST_TIMEOUT.as_secs();

/// Styles the command-line tool knows how to produce.
pub const KNOWN_STYLES: &[&str] = &[THUMBNAIL_STYLE, GRAYSCALE_STYLE];

/// How results are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One human-readable line per URL
    Text,
    /// A JSON array of reports
    Json,
}

/// image-loader - fetch and decode images with request coalescing.
///
/// Every URL is requested `--repeat` times at once through one loader, so
/// only one fetch per URL reaches the network.
#[derive(Parser, Debug, Clone)]
#[command(name = "image-loader")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Image URLs to load.
    #[arg(required = true)]
    pub urls: Vec<Url>,

    /// Style variant to request (thumbnail, grayscale). Default variant if omitted.
    #[arg(short, long, env = "IMAGE_LOADER_STYLE")]
    pub style: Option<String>,

    /// Bounding box edge for the thumbnail style, in pixels.
    #[arg(long, default_value_t = DEFAULT_THUMBNAIL_SIZE, env = "IMAGE_LOADER_THUMBNAIL_SIZE")]
    pub thumbnail_size: u32,

    /// Maximum number of fetches running at once.
    #[arg(
        short,
        long,
        default_value_t = DEFAULT_MAX_CONCURRENT_FETCHES,
        env = "IMAGE_LOADER_WORKERS"
    )]
    pub workers: usize,

    /// Per-request timeout in seconds.
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS, env = "IMAGE_LOADER_TIMEOUT_SECS")]
    pub timeout_secs: u64,

    /// User-Agent header sent with every request.
    #[arg(long, default_value = DEFAULT_USER_AGENT, env = "IMAGE_LOADER_USER_AGENT")]
    pub user_agent: String,

    /// Number of simultaneous requests issued per URL.
    #[arg(long, default_value_t = 1)]
    pub repeat: usize,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl Config {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.urls.is_empty() {
            return Err(ConfigError::NoUrls);
        }

        if let Some(ref style) = self.style {
            if !KNOWN_STYLES.contains(&style.as_str()) {
                return Err(ConfigError::UnknownStyle(style.clone()));
            }
        }

        if self.workers == 0 {
            return Err(ConfigError::Zero { field: "workers" });
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Zero {
                field: "timeout_secs",
            });
        }
        if self.thumbnail_size == 0 {
            return Err(ConfigError::Zero {
                field: "thumbnail_size",
            });
        }
        if self.repeat == 0 {
            return Err(ConfigError::Zero { field: "repeat" });
        }

        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn loader_options(&self) -> LoaderOptions {
        LoaderOptions {
            max_concurrent_fetches: self.workers,
        }
    }

    /// HTTP transport configured from these options.
    pub fn transport(&self) -> HttpTransport {
        HttpTransport::new()
            .with_timeout(self.timeout())
            .with_user_agent(self.user_agent.clone())
    }

    /// Built-in stylers sized from these options.
    pub fn stylers(&self) -> StylerRegistry {
        builtin_stylers(self.thumbnail_size)
    }
}

// =============================================================================
// Tests
// =============================================================================
