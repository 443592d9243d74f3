use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{header, Client};
use url::Url;

use super::Transport;
use crate::error::TransportError;

/// Default per-request timeout: 30 seconds.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default `User-Agent` header sent with every request.
pub const DEFAULT_USER_AGENT: &str = concat!("image-loader/", env!("CARGO_PKG_VERSION"));

/// HTTP(S) implementation of [`Transport`] backed by `reqwest`.
///
/// Each fetch is a single GET request. Responses outside the 2xx range are
/// reported as [`TransportError::Status`]; the body is never inspected.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    timeout: Duration,
    user_agent: String,
}

impl HttpTransport {
    /// Create a transport with the default timeout and user agent.
    pub fn new() -> Self {
        Self::with_client(Client::new())
    }

    /// Create a transport around an existing client.
    ///
    /// Useful for sharing one connection pool with the rest of an application.
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            timeout: DEFAULT_REQUEST_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the `User-Agent` header.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Get the configured timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn map_error(url: &Url, e: reqwest::Error) -> TransportError {
        if e.is_timeout() {
            TransportError::Timeout(url.to_string())
        } else {
            TransportError::Connection(e.to_string())
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, url: &Url) -> Result<Bytes, TransportError> {
        match url.scheme() {
            "http" | "https" => {}
            other => return Err(TransportError::UnsupportedScheme(other.to_string())),
        }

        tracing::debug!("Fetching image from `{}`", url);

        let response = self
            .client
            .get(url.clone())
            .header(header::USER_AGENT, self.user_agent.as_str())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| Self::map_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        response.bytes().await.map_err(|e| Self::map_error(url, e))
    }
}
