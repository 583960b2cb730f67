//! Checking whether a feed URL actually loads.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use tracing::trace;

use crate::error::{Error, Result};

/// Decides whether a feed source loads.
///
/// A probe resolving with an error is the equivalent of the image element's
/// load-failure callback.
#[async_trait]
pub trait FeedProbe: Send + Sync + std::fmt::Debug {
    /// Attempt to load `url`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FeedLoadFailure`] if the feed does not load.
    async fn probe(&self, url: &str) -> Result<()>;
}

/// Probes a feed over HTTP.
///
/// The feed counts as loaded once the response is a success status with a
/// streaming image content type and the first bytes of the body arrive
/// within the timeout.
#[derive(Debug, Clone)]
pub struct HttpFeedProbe {
    client: Client,
    timeout: Duration,
}

impl HttpFeedProbe {
    /// Create a probe that waits at most `timeout` for the first bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder().connect_timeout(timeout).build()?;
        Ok(Self { client, timeout })
    }

    async fn first_bytes(&self, url: &str) -> Result<usize> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::feed_load(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::feed_load(format!("feed answered with HTTP {status}")));
        }

        if let Some(content_type) = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
        {
            if !is_stream_content_type(content_type) {
                return Err(Error::feed_load(format!(
                    "unexpected content type: {content_type}"
                )));
            }
        }

        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| Error::feed_load(format!("stream broke: {e}")))?;
            if !chunk.is_empty() {
                return Ok(chunk.len());
            }
        }
        Err(Error::feed_load("stream ended before any data arrived"))
    }
}

#[async_trait]
impl FeedProbe for HttpFeedProbe {
    async fn probe(&self, url: &str) -> Result<()> {
        let received = tokio::time::timeout(self.timeout, self.first_bytes(url))
            .await
            .map_err(|_| {
                Error::feed_load(format!(
                    "no feed data within {} ms",
                    self.timeout.as_millis()
                ))
            })??;
        trace!(url, received, "Feed delivered data");
        Ok(())
    }
}

/// MJPEG streams use `multipart/x-mixed-replace`; single images are `image/*`.
fn is_stream_content_type(value: &str) -> bool {
    let mime = value
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    mime == "multipart/x-mixed-replace" || mime.starts_with("image/")
}
