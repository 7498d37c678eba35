use crate::config::SourceConfig;
use crate::types::{DEFAULT_MIME, PageBlob};
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Anything that can produce the content of a 1-based page number.
///
/// The loader and the prefetcher depend on this trait rather than on HTTP so
/// both can be exercised against in-process sources. Implementations must not
/// retry; retry policy belongs to callers.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetch page `page_number` (1-based) from the origin.
    async fn fetch(&self, page_number: usize) -> Result<PageBlob>;
}

/// HTTP client fetching page scans from `<origin>/<segment>/<n>.<ext>`
pub struct HttpFetcher {
    client: Client,
    base: Url,
    extension: String,
}

impl HttpFetcher {
    /// Creates a fetcher for `origin` using the default `scan/<n>.jpg` layout
    pub fn new(origin: &str) -> Result<Self> {
        Self::with_layout(origin, "scan", "jpg", Duration::from_secs(30))
    }

    /// Creates a fetcher from the `[source]` configuration section
    pub fn from_config(config: &SourceConfig) -> Result<Self> {
        Self::with_layout(
            &config.origin,
            &config.path_segment,
            &config.extension,
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// Creates a fetcher with an explicit URL layout and request timeout
    pub fn with_layout(
        origin: &str,
        path_segment: &str,
        extension: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let mut base =
            Url::parse(origin).map_err(|e| Error::InvalidUrl(format!("'{origin}': {e}")))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(Error::InvalidUrl(format!(
                "'{origin}': only http and https origins are supported"
            )));
        }

        // Url::join treats the last segment as a file unless the path ends in '/'
        let segment = path_segment.trim_matches('/');
        let path = format!("{}/{segment}/", base.path().trim_end_matches('/'));
        base.set_path(&path);

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("folio/", env!("CARGO_PKG_VERSION")))
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(Error::Network)?;

        Ok(Self {
            client,
            base,
            extension: extension.trim_start_matches('.').to_string(),
        })
    }

    /// URL of the scan for a 1-based page number
    pub fn page_url(&self, page_number: usize) -> Result<Url> {
        self.base
            .join(&format!("{page_number}.{}", self.extension))
            .map_err(|e| Error::InvalidUrl(e.to_string()))
    }
}

#[async_trait]
impl PageSource for HttpFetcher {
    async fn fetch(&self, page_number: usize) -> Result<PageBlob> {
        let url = self.page_url(page_number)?;
        debug!(%url, page = page_number, "fetching page");

        let response = self.client.get(url.clone()).send().await?;
        // Any non-success status is a network failure for the caller
        let response = response.error_for_status()?;

        let mime = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_MIME.to_string());

        let bytes = response.bytes().await?;
        debug!(page = page_number, bytes = bytes.len(), "fetched page");

        Ok(PageBlob::new(mime, bytes.to_vec()))
    }
}
