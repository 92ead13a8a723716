//! HTTP client for asset downloads with retry logic.

use crate::error::{CloudError, Result};
use reqwest::header::RANGE;
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};

/// Downloads band assets, whole or by byte range.
pub struct HttpClient {
    client: Client,
    max_retries: u32,
    request_timeout: Duration,
}

impl HttpClient {
    /// Create a new HTTP client.
    pub fn new(request_timeout: Duration, max_retries: u32) -> Result<Self> {
        let client = Client::builder().timeout(request_timeout).build()?;

        Ok(Self {
            client,
            max_retries,
            request_timeout,
        })
    }

    /// Fetch the full body of `url`.
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let resp = self.send(url, None).await?;
        Ok(resp.bytes().await?.to_vec())
    }

    /// Fetch `length` bytes of `url` starting at `offset`.
    ///
    /// Servers that answer with the whole body, or reject the range, give
    /// [`CloudError::RangeNotSupported`]. A range running past the end of
    /// the file comes back short.
    pub async fn fetch_range(&self, url: &str, offset: u64, length: u64) -> Result<Vec<u8>> {
        if length == 0 {
            return Ok(Vec::new());
        }
        let range = format!("bytes={}-{}", offset, offset + length - 1);
        let resp = self.send(url, Some(&range)).await?;
        if resp.status() != StatusCode::PARTIAL_CONTENT {
            return Err(CloudError::RangeNotSupported {
                url: url.to_string(),
            });
        }
        Ok(resp.bytes().await?.to_vec())
    }

    /// GET `url`, retrying timeouts, connection failures and 5xx/429
    /// responses with exponential backoff. Other client errors fail
    /// immediately.
    async fn send(&self, url: &str, range: Option<&str>) -> Result<Response> {
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = backoff_delay(attempt);
                debug!("Retrying {} in {:?} (attempt {})", url, backoff, attempt + 1);
                tokio::time::sleep(backoff).await;
            }

            let mut req = self.client.get(url);
            if let Some(range) = range {
                req = req.header(RANGE, range);
            }

            match req.send().await {
                Ok(resp) if resp.status().is_success() => return Ok(resp),
                Ok(resp) if range.is_some() && resp.status() == StatusCode::RANGE_NOT_SATISFIABLE => {
                    return Err(CloudError::RangeNotSupported {
                        url: url.to_string(),
                    });
                }
                Ok(resp) => {
                    let status = resp.status();
                    last_err = Some(CloudError::Network(format!("HTTP {} fetching {}", status, url)));
                    if !is_retryable(status) {
                        break;
                    }
                }
                Err(e) if e.is_timeout() || e.is_connect() => {
                    warn!("Request to {} failed: {}", url, e);
                    last_err = Some(CloudError::Http(e));
                }
                Err(e) => return Err(CloudError::Http(e)),
            }
        }

        Err(last_err.unwrap_or_else(|| CloudError::Network(format!("fetching {} failed", url))))
    }

    /// Getter for the timeout duration.
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }
}

/// 500 ms, 1 s, 2 s, ...
pub(crate) fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(500u64.saturating_mul(1 << attempt.saturating_sub(1).min(16)))
}

fn is_retryable(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}
