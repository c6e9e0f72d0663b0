// src/fetch/conditional.rs

//! Conditional HTTP fetching.
//!
//! Performs a lightweight GET, replaying the last entity tag as
//! `If-None-Match` so the origin can confirm "unchanged" with a 304 before
//! a body is ever transferred.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, header};

use crate::config::FetchConfig;
use crate::error::{AppError, Result};

/// Outcome of a conditional fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchResponse {
    /// Origin returned 304: content is unchanged, skip fingerprinting.
    NotModified,
    /// Origin returned a success status with a body.
    Body {
        body: String,
        /// New entity tag to replay on the next check, if the origin sent one
        etag: Option<String>,
    },
}

/// Lightweight retrieval with optional ETag revalidation.
///
/// No internal retry: a failed fetch is reported to the caller, which simply
/// waits for the site's next scheduled interval.
#[async_trait]
pub trait ConditionalFetch: Send {
    async fn fetch(&self, url: &str, prior_etag: Option<&str>) -> Result<FetchResponse>;
}

/// HTTP fetcher over a shared reqwest client.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Create a fetcher with the configured user agent and timeout.
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ConditionalFetch for HttpFetcher {
    async fn fetch(&self, url: &str, prior_etag: Option<&str>) -> Result<FetchResponse> {
        let mut request = self.client.get(url);
        if let Some(tag) = prior_etag {
            request = request.header(header::IF_NONE_MATCH, tag);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::NOT_MODIFIED {
            return Ok(FetchResponse::NotModified);
        }
        if !status.is_success() {
            return Err(AppError::Transport {
                status: status.as_u16(),
            });
        }

        let etag = response
            .headers()
            .get(header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = response.text().await?;

        Ok(FetchResponse::Body { body, etag })
    }
}
