//! Mock fetcher for testing.
//!
//! Serves canned documents, fails chosen locators, and records what was
//! requested and how many requests overlapped.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use crate::error::{FetchCause, FetchError, FetchResult};
use crate::traits::fetcher::Fetcher;
use crate::types::document::RawDocument;

/// Failure a mock locator should produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    Status(u16),
    Timeout,
    Network,
}

impl MockFailure {
    fn into_cause(self) -> FetchCause {
        match self {
            MockFailure::Status(code) => FetchCause::Status(code),
            MockFailure::Timeout => FetchCause::Timeout(Duration::from_secs(0)),
            MockFailure::Network => FetchCause::Http("connection reset by peer".into()),
        }
    }
}

/// Mock fetcher for testing.
///
/// Unknown locators answer with HTTP 404.
///
/// # Example
///
/// ```rust
/// use country_knowledge::fetchers::{MockFailure, MockFetcher};
///
/// let mock = MockFetcher::new();
/// mock.add_page("https://example.com/list", "<table>...</table>");
/// mock.fail("https://example.com/broken", MockFailure::Network);
/// ```
#[derive(Default, Clone)]
pub struct MockFetcher {
    pages: Arc<RwLock<HashMap<String, String>>>,
    failures: Arc<RwLock<HashMap<String, MockFailure>>>,
    calls: Arc<RwLock<Vec<String>>>,
    latency: Arc<RwLock<Option<Duration>>>,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
}

impl MockFetcher {
    /// Create a new empty mock fetcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` for `locator`. Clears any failure set for it.
    pub fn add_page(&self, locator: impl Into<String>, body: impl Into<String>) {
        let locator = locator.into();
        self.failures
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&locator);
        self.pages
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(locator, body.into());
    }

    /// Make `locator` fail.
    pub fn fail(&self, locator: impl Into<String>, failure: MockFailure) {
        self.failures
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(locator.into(), failure);
    }

    /// Delay every response by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.write().unwrap_or_else(PoisonError::into_inner) = Some(latency);
    }

    /// Number of fetches made so far.
    pub fn fetch_count(&self) -> usize {
        self.calls.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// How many times `locator` was requested.
    pub fn calls_for(&self, locator: &str) -> usize {
        self.calls
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|l| l.as_str() == locator)
            .count()
    }

    /// Highest number of fetches that were in flight at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Clear recorded calls and the in-flight peak.
    pub fn reset_calls(&self) {
        self.calls.write().unwrap_or_else(PoisonError::into_inner).clear();
        self.peak_in_flight.store(0, Ordering::SeqCst);
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, locator: &str) -> FetchResult<RawDocument> {
        self.calls
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(locator.to_string());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlight(&self.in_flight);
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        let latency = *self.latency.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let failure = self
            .failures
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(locator)
            .copied();
        if let Some(failure) = failure {
            return Err(FetchError::new(locator, failure.into_cause()));
        }

        let body = self
            .pages
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(locator)
            .cloned();
        match body {
            Some(body) => Ok(RawDocument::new(locator, body).with_content_type("text/html")),
            None => Err(FetchError::new(locator, FetchCause::Status(404))),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Builder for creating test scenarios with the mock fetcher.
pub struct MockFetcherBuilder {
    mock: MockFetcher,
}

impl MockFetcherBuilder {
    /// Start building a mock fetcher.
    pub fn new() -> Self {
        Self {
            mock: MockFetcher::new(),
        }
    }

    pub fn page(self, locator: &str, body: &str) -> Self {
        self.mock.add_page(locator, body);
        self
    }

    pub fn failing(self, locator: &str, failure: MockFailure) -> Self {
        self.mock.fail(locator, failure);
        self
    }

    pub fn latency(self, latency: Duration) -> Self {
        self.mock.set_latency(latency);
        self
    }

    pub fn build(self) -> MockFetcher {
        self.mock
    }
}

impl Default for MockFetcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}
