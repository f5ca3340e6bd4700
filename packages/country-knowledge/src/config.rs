//! Configuration for sources, fetching and population.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::ConfigError;
use crate::extract::{FieldRules, ListingRules};
use crate::normalize::{capitalize_first, collapse_whitespace, Normalizer};

/// HTTP fetch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Per-request timeout
    pub timeout_secs: u64,

    pub user_agent: String,

    /// Outbound request quota; `None` disables rate limiting
    pub requests_per_second: Option<u32>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            user_agent: "CapitalBot/1.0".to_string(),
            requests_per_second: Some(5),
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_requests_per_second(mut self, rps: Option<u32>) -> Self {
        self.requests_per_second = rps;
        self
    }
}

/// Configuration for the knowledge cache.
///
/// Every field has a default, so a JSON override file only needs the keys
/// it changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeConfig {
    /// Page listing every country and its capital
    pub listing_url: String,

    /// Prefix of per-country pages
    pub detail_base_url: String,

    /// Replaces spaces in names when building detail locators
    pub locator_separator: String,

    pub listing: ListingRules,

    pub fields: FieldRules,

    pub fetch: FetchConfig,

    /// Cap on detail fetches in flight during bulk population
    pub max_concurrent_fetches: usize,

    /// Block while population runs (`false`: answer "try again")
    pub wait_for_population: bool,

    /// How long a failed targeted refresh suppresses refetching the same key
    pub miss_ttl_secs: u64,

    /// User spelling to canonical entity name
    pub synonyms: BTreeMap<String, String>,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            listing_url: "https://ru.wikipedia.org/wiki/Список_столиц_государств".to_string(),
            detail_base_url: "https://ru.wikipedia.org/wiki/".to_string(),
            locator_separator: "_".to_string(),
            listing: ListingRules::default(),
            fields: FieldRules::default(),
            fetch: FetchConfig::default(),
            max_concurrent_fetches: 4,
            wait_for_population: true,
            miss_ttl_secs: 600,
            synonyms: BTreeMap::new(),
        }
    }
}

impl KnowledgeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON document; absent keys keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_listing_url(mut self, url: impl Into<String>) -> Self {
        self.listing_url = url.into();
        self
    }

    pub fn with_detail_base_url(mut self, url: impl Into<String>) -> Self {
        self.detail_base_url = url.into();
        self
    }

    pub fn with_listing_rules(mut self, rules: ListingRules) -> Self {
        self.listing = rules;
        self
    }

    pub fn with_field_rules(mut self, rules: FieldRules) -> Self {
        self.fields = rules;
        self
    }

    pub fn with_fetch(mut self, fetch: FetchConfig) -> Self {
        self.fetch = fetch;
        self
    }

    pub fn with_max_concurrent_fetches(mut self, max: usize) -> Self {
        self.max_concurrent_fetches = max;
        self
    }

    pub fn with_wait_for_population(mut self, wait: bool) -> Self {
        self.wait_for_population = wait;
        self
    }

    pub fn with_miss_ttl_secs(mut self, secs: u64) -> Self {
        self.miss_ttl_secs = secs;
        self
    }

    pub fn with_synonym(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.synonyms.insert(from.into(), to.into());
        self
    }

    pub fn miss_ttl(&self) -> Duration {
        Duration::from_secs(self.miss_ttl_secs)
    }

    /// Detail page locator for an entity name.
    ///
    /// Whitespace runs become the separator and the first letter is
    /// upper-cased, so "южная  корея" and "Южная Корея" map to the same page.
    pub fn detail_locator(&self, name: &str) -> String {
        let titled = capitalize_first(&collapse_whitespace(name));
        format!(
            "{}{}",
            self.detail_base_url,
            titled.replace(' ', &self.locator_separator)
        )
    }

    /// Query canonicalizer carrying the configured synonyms.
    pub fn normalizer(&self) -> Normalizer {
        self.synonyms
            .iter()
            .fold(Normalizer::new(), |n, (from, to)| n.with_synonym(from, to))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        url::Url::parse(&self.listing_url).map_err(|source| ConfigError::InvalidUrl {
            field: "listing_url",
            source,
        })?;
        url::Url::parse(&self.detail_base_url).map_err(|source| ConfigError::InvalidUrl {
            field: "detail_base_url",
            source,
        })?;
        if self.max_concurrent_fetches == 0 {
            return Err(ConfigError::Zero {
                field: "max_concurrent_fetches",
            });
        }
        if self.fetch.timeout_secs == 0 {
            return Err(ConfigError::Zero {
                field: "fetch.timeout_secs",
            });
        }
        if self.fetch.requests_per_second == Some(0) {
            return Err(ConfigError::Zero {
                field: "fetch.requests_per_second",
            });
        }
        self.fields.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = KnowledgeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.fields.summary_max_chars, 300);
        assert!(config.wait_for_population);
    }

    #[test]
    fn test_detail_locator() {
        let config = KnowledgeConfig::default();
        assert_eq!(
            config.detail_locator("Южная Корея"),
            "https://ru.wikipedia.org/wiki/Южная_Корея"
        );
        assert_eq!(
            config.detail_locator("  южная   корея "),
            "https://ru.wikipedia.org/wiki/Южная_корея"
        );
    }

    #[test]
    fn test_from_json_keeps_defaults() {
        let config = KnowledgeConfig::from_json(
            r#"{"max_concurrent_fetches": 2, "fetch": {"timeout_secs": 5}, "synonyms": {"США": "Соединённые Штаты Америки"}}"#,
        )
        .unwrap();

        assert_eq!(config.max_concurrent_fetches, 2);
        assert_eq!(config.fetch.timeout(), Duration::from_secs(5));
        assert_eq!(config.fetch.user_agent, "CapitalBot/1.0");
        assert_eq!(config.listing.capital_column, 2);
        assert_eq!(
            config.normalizer().canonicalize("сша"),
            "соединённые штаты америки"
        );
    }

    #[test]
    fn test_validation_rejects_zero_concurrency() {
        let config = KnowledgeConfig::default().with_max_concurrent_fetches(0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Zero {
                field: "max_concurrent_fetches"
            })
        ));
    }

    #[test]
    fn test_validation_rejects_bad_url() {
        let config = KnowledgeConfig::default().with_listing_url("not a url");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidUrl { field: "listing_url", .. })
        ));
    }
}
