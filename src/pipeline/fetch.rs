//! Document download: one GET per URL, redirects followed, bounded timeout.
//!
//! A single attempt is made. Any failure is job-fatal because the page
//! counter needs every document before rendering can start.

use crate::error::Pdf2ImgError;
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use tracing::{debug, info};

/// Retrieves the raw bytes behind a URL.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Bytes, Pdf2ImgError>;
}

/// [`Fetcher`] backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout_secs: u64,
}

impl HttpFetcher {
    /// Build a fetcher with the given per-request timeout.
    pub fn new(timeout: Duration) -> Result<Self, Pdf2ImgError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| Pdf2ImgError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            timeout_secs: timeout.as_secs(),
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes, Pdf2ImgError> {
        info!("Downloading document from: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify(url, self.timeout_secs, e))?;

        if !response.status().is_success() {
            return Err(Pdf2ImgError::DownloadFailed {
                url: url.to_string(),
                reason: format!("HTTP {}", response.status()),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| classify(url, self.timeout_secs, e))?;

        debug!("Downloaded {} bytes from {}", bytes.len(), url);
        Ok(bytes)
    }
}

fn classify(url: &str, timeout_secs: u64, e: reqwest::Error) -> Pdf2ImgError {
    if e.is_timeout() {
        Pdf2ImgError::DownloadTimeout {
            url: url.to_string(),
            secs: timeout_secs,
        }
    } else {
        Pdf2ImgError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        }
    }
}
