use anyhow::{Context, Result};
use country_knowledge::KnowledgeConfig;
use std::env;
use std::str::FromStr;

/// Bot configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub knowledge: KnowledgeConfig,

    /// Populate at startup instead of on the first query
    pub eager_population: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from any variable source; `KNOWLEDGE_RULES_PATH` is read first,
    /// individual variables override it.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut knowledge = match var("KNOWLEDGE_RULES_PATH") {
            Some(path) => {
                let json = std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read rules file {}", path))?;
                KnowledgeConfig::from_json(&json)
                    .with_context(|| format!("invalid rules file {}", path))?
            }
            None => KnowledgeConfig::default(),
        };

        if let Some(url) = var("COUNTRY_LISTING_URL") {
            knowledge.listing_url = url;
        }
        if let Some(url) = var("COUNTRY_DETAIL_BASE_URL") {
            knowledge.detail_base_url = url;
        }
        if let Some(secs) = parse_var(&var, "FETCH_TIMEOUT_SECS")? {
            knowledge.fetch.timeout_secs = secs;
        }
        if let Some(raw) = var("FETCH_REQUESTS_PER_SECOND") {
            // 0 or "off" disables the quota
            knowledge.fetch.requests_per_second = match raw.trim() {
                "off" | "0" => None,
                value => Some(
                    value
                        .parse()
                        .context("FETCH_REQUESTS_PER_SECOND must be a valid number")?,
                ),
            };
        }
        if let Some(max) = parse_var(&var, "MAX_CONCURRENT_FETCHES")? {
            knowledge.max_concurrent_fetches = max;
        }

        let eager_population = parse_var(&var, "EAGER_POPULATION")?.unwrap_or(false);

        knowledge.validate().context("invalid knowledge configuration")?;

        Ok(Self {
            knowledge,
            eager_population,
        })
    }
}

fn parse_var<T: FromStr>(var: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    var(name)
        .map(|raw| raw.trim().parse::<T>())
        .transpose()
        .with_context(|| format!("{} has an invalid value", name))
}
