//! HTTP-based fetcher implementation.

use async_trait::async_trait;
use chrono::Utc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::FetchConfig;
use crate::error::{FetchCause, FetchError, FetchResult};
use crate::traits::fetcher::Fetcher;
use crate::types::document::RawDocument;

/// Fetcher that retrieves documents over HTTP with a per-request timeout.
///
/// # Example
///
/// ```rust,ignore
/// use country_knowledge::{FetchConfig, Fetcher, HttpFetcher};
///
/// let fetcher = HttpFetcher::new(&FetchConfig::default())?;
/// let doc = fetcher.fetch("https://ru.wikipedia.org/wiki/Италия").await?;
/// ```
pub struct HttpFetcher {
    client: reqwest::Client,
    user_agent: String,
    timeout: Duration,
}

impl HttpFetcher {
    /// Create a fetcher from settings.
    pub fn new(config: &FetchConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            client,
            user_agent: config.user_agent.clone(),
            timeout: config.timeout(),
        })
    }

    fn classify(&self, locator: &str, err: reqwest::Error) -> FetchError {
        let cause = if err.is_timeout() {
            FetchCause::Timeout(self.timeout)
        } else if let Some(status) = err.status() {
            FetchCause::Status(status.as_u16())
        } else {
            FetchCause::Http(Box::new(err))
        };
        FetchError::new(locator, cause)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, locator: &str) -> FetchResult<RawDocument> {
        let url = reqwest::Url::parse(locator)
            .map_err(|e| FetchError::new(locator, FetchCause::InvalidLocator(e)))?;

        debug!(locator = %locator, "HTTP fetch starting");
        let response = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .send()
            .await
            .map_err(|e| {
                warn!(locator = %locator, error = %e, "HTTP request failed");
                self.classify(locator, e)
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(locator, FetchCause::Status(status.as_u16())));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::new(locator, FetchCause::Timeout(self.timeout))
            } else {
                FetchError::new(locator, FetchCause::Body(Box::new(e)))
            }
        })?;

        debug!(
            locator = %locator,
            status = status.as_u16(),
            content_length = body.len(),
            "HTTP fetch completed"
        );

        let mut document = RawDocument::new(locator, body)
            .with_status(status.as_u16())
            .with_fetched_at(Utc::now());
        if let Some(ct) = content_type {
            document = document.with_content_type(ct);
        }
        Ok(document)
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_invalid_locator_is_typed_error() {
        let fetcher = HttpFetcher::new(&FetchConfig::default()).unwrap();
        let err = fetcher.fetch("not a url").await.unwrap_err();

        assert_eq!(err.locator, "not a url");
        assert!(matches!(err.cause, FetchCause::InvalidLocator(_)));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_connection_failure_is_typed_error() {
        let fetcher = HttpFetcher::new(&FetchConfig::default().with_timeout_secs(2)).unwrap();
        // Port 9 (discard) on localhost is closed in test environments
        let err = fetcher.fetch("http://127.0.0.1:9/").await.unwrap_err();

        assert_eq!(err.locator, "http://127.0.0.1:9/");
        assert!(err.is_transient());
    }

    #[test]
    fn test_name() {
        let fetcher = HttpFetcher::new(&FetchConfig::default()).unwrap();
        assert_eq!(fetcher.name(), "http");
    }
}
