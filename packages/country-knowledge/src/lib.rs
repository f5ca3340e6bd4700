//! Country Knowledge Cache
//!
//! Answers "what is the capital of X" and "which country has capital Y" from
//! an in-memory store that is filled lazily from public reference pages.
//!
//! # Overview
//!
//! - One listing page gives every country and its capital
//! - One detail page per country gives population, region, area, currency,
//!   language and a short summary
//! - Capitals are stored as aliases resolving to their country
//! - The first query triggers a single bulk population; detail pages are
//!   fetched by a bounded worker pool and a failed page only degrades its
//!   own entity
//!
//! # Usage
//!
//! ```rust,ignore
//! use country_knowledge::{KnowledgeConfig, LookupService, QueryHandler};
//!
//! let service = LookupService::with_http(KnowledgeConfig::default())?;
//! let handler = QueryHandler::new(service);
//!
//! let reply = handler.handle_query("Италия").await;
//! ```
//!
//! # Modules
//!
//! - [`traits`] - The `Fetcher` seam
//! - [`fetchers`] - HTTP, rate-limited and mock fetchers
//! - [`extract`] - Listing and detail page extraction
//! - [`normalize`] - Key canonicalization and text cleanup
//! - [`store`] - Concurrency-safe knowledge store
//! - [`lookup`] - Population state machine and query resolution
//! - [`format`] - Chat reply formatting

pub mod config;
pub mod error;
pub mod extract;
pub mod fetchers;
pub mod format;
pub mod lookup;
pub mod normalize;
pub mod store;
pub mod traits;
pub mod types;

// Re-export core types at crate root
pub use config::{FetchConfig, KnowledgeConfig};
pub use error::{
    ConfigError, FetchCause, FetchError, FetchResult, LookupError, LookupResult, ParseError,
};
pub use traits::fetcher::Fetcher;
pub use types::{
    document::RawDocument,
    record::{
        AliasRecord, EntityRecord, EntityStub, Field, FieldValue, FieldValues, Resolution,
        UNKNOWN_TEXT,
    },
};

pub use extract::{extract_detail, extract_listing, FieldRule, FieldRules, ListingRules};
pub use fetchers::{HttpFetcher, MockFailure, MockFetcher, MockFetcherBuilder, RateLimitedFetcher};
pub use format::{format_entity, QueryHandler};
pub use lookup::{LookupService, PopulationReport, PopulationState};
pub use normalize::{normalize_key, Normalizer};
pub use store::{AliasOutcome, KnowledgeStore};
