//! Rate-limited fetcher wrapper.
//!
//! Wraps any Fetcher with a request quota using the governor crate. This
//! spaces requests out over time; the population pool separately caps how
//! many are in flight.

use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;

use crate::error::FetchResult;
use crate::traits::fetcher::Fetcher;
use crate::types::document::RawDocument;

type DefaultRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// A fetcher wrapper that enforces a request quota.
pub struct RateLimitedFetcher<F: Fetcher> {
    inner: F,
    limiter: Arc<DefaultRateLimiter>,
}

impl<F: Fetcher> RateLimitedFetcher<F> {
    /// Allow `requests_per_second` sustained, bursting to the same amount.
    pub fn new(fetcher: F, requests_per_second: NonZeroU32) -> Self {
        Self::with_quota(fetcher, Quota::per_second(requests_per_second))
    }

    /// Create with a custom quota.
    pub fn with_quota(fetcher: F, quota: Quota) -> Self {
        Self {
            inner: fetcher,
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    pub fn inner(&self) -> &F {
        &self.inner
    }
}

#[async_trait]
impl<F: Fetcher> Fetcher for RateLimitedFetcher<F> {
    async fn fetch(&self, locator: &str) -> FetchResult<RawDocument> {
        self.limiter.until_ready().await;
        self.inner.fetch(locator).await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

/// Extension trait for easy rate limiting.
pub trait FetcherExt: Fetcher + Sized {
    /// Wrap this fetcher with a per-second quota.
    fn rate_limited(self, requests_per_second: NonZeroU32) -> RateLimitedFetcher<Self> {
        RateLimitedFetcher::new(self, requests_per_second)
    }
}

impl<F: Fetcher + Sized> FetcherExt for F {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetchers::mock::MockFetcherBuilder;
    use std::time::Instant;

    #[tokio::test]
    async fn test_rate_limiting() {
        let mock = MockFetcherBuilder::new()
            .page("https://example.com/1", "Page 1")
            .page("https://example.com/2", "Page 2")
            .page("https://example.com/3", "Page 3")
            .build();

        // 2 requests per second, burst of 1
        let quota = Quota::per_second(NonZeroU32::new(2).unwrap())
            .allow_burst(NonZeroU32::new(1).unwrap());
        let fetcher = RateLimitedFetcher::with_quota(mock, quota);

        let start = Instant::now();
        for i in 1..=3 {
            fetcher
                .fetch(&format!("https://example.com/{}", i))
                .await
                .unwrap();
        }
        let elapsed = start.elapsed();

        // first is immediate, 2nd and 3rd wait ~500ms each
        assert!(elapsed.as_millis() >= 900, "Rate limiting not working: {:?}", elapsed);
        assert_eq!(fetcher.inner().fetch_count(), 3);
    }

    #[tokio::test]
    async fn test_extension_trait_keeps_name() {
        let mock = MockFetcherBuilder::new().build();
        let fetcher = mock.rate_limited(NonZeroU32::new(10).unwrap());
        assert_eq!(fetcher.name(), "mock");
    }
}
