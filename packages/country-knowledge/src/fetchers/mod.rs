//! Fetcher implementations.
//!
//! # Available Fetchers
//!
//! - `HttpFetcher` - reqwest with per-request timeout and user agent
//! - `RateLimitedFetcher` - request quota around any fetcher
//! - `MockFetcher` - for testing

mod http;
mod mock;
mod rate_limited;

pub use http::HttpFetcher;
pub use mock::{MockFailure, MockFetcher, MockFetcherBuilder};
pub use rate_limited::{FetcherExt, RateLimitedFetcher};

// Re-export from traits for convenience
pub use crate::traits::fetcher::Fetcher;
