//! Typed errors for the knowledge cache.
//!
//! Uses `thiserror` for library errors (not `anyhow`) so callers can
//! match on the failure taxonomy: fetch, parse, broken alias, not found.

use std::time::Duration;
use thiserror::Error;

/// A document could not be retrieved.
#[derive(Debug, Error)]
#[error("fetch failed for {locator}: {cause}")]
pub struct FetchError {
    /// Locator that was requested
    pub locator: String,

    /// Why the fetch failed
    #[source]
    pub cause: FetchCause,
}

impl FetchError {
    pub fn new(locator: impl Into<String>, cause: FetchCause) -> Self {
        Self {
            locator: locator.into(),
            cause,
        }
    }

    /// Whether a later attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match &self.cause {
            FetchCause::Http(_) | FetchCause::Timeout(_) => true,
            FetchCause::Status(code) => *code >= 500 || *code == 429,
            FetchCause::InvalidLocator(_) | FetchCause::Body(_) => false,
        }
    }
}

/// Underlying reason for a [`FetchError`].
#[derive(Debug, Error)]
pub enum FetchCause {
    /// Transport-level failure (DNS, connection reset, TLS)
    #[error("HTTP error: {0}")]
    Http(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Server answered with a non-2xx status
    #[error("HTTP status {0}")]
    Status(u16),

    /// Request did not complete in time
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Locator is not a valid URL
    #[error("invalid locator: {0}")]
    InvalidLocator(#[from] url::ParseError),

    /// Response body could not be read
    #[error("unreadable body: {0}")]
    Body(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// An expected structural element was absent from a document.
#[derive(Debug, Error)]
#[error("parse error in {locator}: {reason}")]
pub struct ParseError {
    pub locator: String,
    pub reason: String,
}

impl ParseError {
    pub fn new(locator: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
            reason: reason.into(),
        }
    }
}

/// Outcomes of a lookup that did not produce a record.
#[derive(Debug, Error)]
pub enum LookupError {
    /// Key absent from the store after any refresh attempt
    #[error("not found: {key}")]
    NotFound { key: String },

    /// Alias points at an entity that is not in the store
    #[error("alias {alias} points at missing entity {target}")]
    BrokenAlias { alias: String, target: String },

    /// Bulk population is running and the caller chose not to wait
    #[error("population in progress, try again")]
    Populating,

    /// Bulk population could not load the listing
    #[error("population failed: {reason}")]
    PopulationFailed { reason: String },

    /// Population was cancelled before completion
    #[error("operation cancelled")]
    Cancelled,
}

impl LookupError {
    /// True for the ordinary "nothing known about this" outcome.
    pub fn is_not_found(&self) -> bool {
        matches!(self, LookupError::NotFound { .. })
    }
}

/// Invalid configuration values.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid URL for {field}: {source}")]
    InvalidUrl {
        field: &'static str,
        #[source]
        source: url::ParseError,
    },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("rule table has no patterns for {0}")]
    EmptyRules(&'static str),

    #[error("failed to read rules: {0}")]
    Rules(#[from] serde_json::Error),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Result type alias for fetch operations.
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Result type alias for lookup operations.
pub type LookupResult<T> = std::result::Result<T, LookupError>;
