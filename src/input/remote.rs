//! HTTP access to remote images.

use crate::config::HttpConfig;
use crate::error::{Error, Result};
use futures_util::StreamExt;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use tracing::debug;

/// Reachability probe and bounded downloads for image URLs.
#[derive(Debug, Clone)]
pub struct RemoteImages {
    client: Client,
    probe_timeout: Duration,
    fetch_timeout: Duration,
    max_bytes: u64,
}

impl RemoteImages {
    /// Create a client from the HTTP settings.
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.probe_timeout_secs))
            .build()
            .map_err(|e| Error::Internal {
                message: format!("Failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            probe_timeout: Duration::from_secs(config.probe_timeout_secs),
            fetch_timeout: Duration::from_secs(config.fetch_timeout_secs),
            max_bytes: config.max_image_bytes,
        })
    }

    /// Largest accepted image in bytes.
    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Issue a HEAD request and check that the URL serves an image.
    ///
    /// Only the primary type of the reported content type is checked; the
    /// status code is not.
    pub async fn probe(&self, url: &str) -> Result<()> {
        let response = self
            .client
            .head(url)
            .timeout(self.probe_timeout)
            .send()
            .await
            .map_err(|e| Error::UnreachableUrl {
                url: url.to_string(),
                source: Box::new(e),
            })?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        debug!("Probed {url}: {} {content_type}", response.status());

        if primary_type(&content_type) != "image" {
            return Err(Error::NotAnImage {
                url: url.to_string(),
                content_type,
            });
        }
        Ok(())
    }

    /// Download an image body, refusing anything over the size limit.
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let fetch_err = |e: Box<dyn std::error::Error + Send + Sync>| Error::UnreachableUrl {
            url: url.to_string(),
            source: e,
        };

        let response = self
            .client
            .get(url)
            .timeout(self.fetch_timeout)
            .send()
            .await
            .map_err(|e| fetch_err(Box::new(e)))?
            .error_for_status()
            .map_err(|e| fetch_err(Box::new(e)))?;

        if response.content_length().is_some_and(|len| len > self.max_bytes) {
            return Err(self.too_large(url));
        }

        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| fetch_err(Box::new(e)))?;
            body.extend_from_slice(&chunk);
            if body.len() as u64 > self.max_bytes {
                return Err(self.too_large(url));
            }
        }

        debug!("Fetched {} bytes from {url}", body.len());
        Ok(body)
    }

    fn too_large(&self, url: &str) -> Error {
        Error::ImageTooLarge {
            source_name: url.to_string(),
            limit: self.max_bytes,
        }
    }
}

/// `image` for `image/png; charset=binary`.
fn primary_type(content_type: &str) -> &str {
    content_type
        .split(';')
        .next()
        .and_then(|mime| mime.split('/').next())
        .map_or("", str::trim)
}
