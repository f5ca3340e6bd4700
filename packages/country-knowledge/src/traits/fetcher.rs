//! Fetcher trait for pluggable document retrieval.
//!
//! A fetcher turns a locator into a [`RawDocument`] or a typed
//! [`FetchError`]. It never retries: whether to retry, skip or abort is the
//! caller's decision.
//!
//! # Usage
//!
//! ```rust,ignore
//! use country_knowledge::{Fetcher, HttpFetcher, FetchConfig};
//!
//! let fetcher = HttpFetcher::new(&FetchConfig::default())?;
//! let doc = fetcher.fetch("https://ru.wikipedia.org/wiki/Франция").await?;
//! ```

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::FetchResult;
use crate::types::document::RawDocument;

/// Source of raw documents.
///
/// Implementations:
/// - `HttpFetcher` - reqwest with a per-request timeout
/// - `RateLimitedFetcher` - wraps another fetcher with a request quota
/// - `MockFetcher` - canned documents for tests
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Retrieve one document.
    ///
    /// Non-2xx responses, timeouts and transport failures all come back as
    /// `FetchError` carrying the locator.
    async fn fetch(&self, locator: &str) -> FetchResult<RawDocument>;

    /// Get the fetcher name (for logging/debugging).
    fn name(&self) -> &str {
        "unknown"
    }
}

#[async_trait]
impl<F: Fetcher + ?Sized> Fetcher for Arc<F> {
    async fn fetch(&self, locator: &str) -> FetchResult<RawDocument> {
        (**self).fetch(locator).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
