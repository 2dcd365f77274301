//! HTTP network implementation for the cache worker.
//!
//! - Plain GET per request identity; redirects followed up to a limit
//! - Max body bytes: 5MB (configurable)
//! - Non-2xx responses are returned as captured responses, not errors;
//!   the worker decides whether they may be stored

use reqwest::{Client, header};
use std::time::{Duration, Instant};

use offcache_core::{AppConfig, CapturedResponse, Error, Network, RequestIdentity};

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "offcache/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "offcache/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            ..Default::default()
        }
    }
}

/// reqwest-backed [`Network`].
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::HttpError(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    fn too_large(&self, len: usize) -> Error {
        Error::FetchTooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes))
    }
}

fn map_send_error(request: &RequestIdentity, err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::FetchTimeout(format!("{request}: {err}"))
    } else {
        Error::HttpError(format!("network error: {request}: {err}"))
    }
}

/// Collect header name/value pairs, skipping values that are not valid UTF-8.
fn collect_headers(headers: &header::HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
        .collect()
}

#[async_trait::async_trait]
impl Network for FetchClient {
    async fn fetch(&self, request: &RequestIdentity) -> Result<CapturedResponse, Error> {
        let start = Instant::now();

        let response = self
            .http
            .get(request.url().clone())
            .send()
            .await
            .map_err(|e| map_send_error(request, e))?;

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(self.too_large(len as usize));
        }

        let status = response.status();
        let headers = response.headers().clone();
        let final_url = response.url().clone();

        let body = response.bytes().await.map_err(|e| map_send_error(request, e))?;
        if body.len() > self.config.max_bytes {
            return Err(self.too_large(body.len()));
        }

        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        tracing::debug!(
            "fetched {} -> {} ({}) in {}ms ({} bytes)",
            request,
            final_url,
            status.as_u16(),
            start.elapsed().as_millis(),
            body.len()
        );

        Ok(CapturedResponse {
            url: final_url.to_string(),
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            content_type,
            headers: collect_headers(&headers),
            body,
        })
    }
}
