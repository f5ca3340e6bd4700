//! Lookup service: lazy bulk population, alias resolution, targeted refresh.
//!
//! The service moves through `Empty -> Populating -> Ready`. The first query
//! against an empty store starts exactly one population task; concurrent
//! queries wait for it (or get [`LookupError::Populating`] when waiting is
//! disabled). A failed or cancelled population returns the service to
//! `Empty` when nothing is stored, so a later query retries, and to `Ready`
//! when the store still holds records, which keep being served.

use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::KnowledgeConfig;
use crate::error::{ConfigError, LookupError, LookupResult};
use crate::extract::{extract_detail, extract_listing};
use crate::fetchers::{FetcherExt, HttpFetcher};
use crate::normalize::{capitalize_first, collapse_whitespace, normalize_key, Normalizer};
use crate::store::{AliasOutcome, KnowledgeStore};
use crate::traits::fetcher::Fetcher;
use crate::types::record::{AliasRecord, EntityRecord, EntityStub, Resolution};

/// Lifecycle of the store contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopulationState {
    Empty,
    Populating,
    Ready,
}

impl fmt::Display for PopulationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PopulationState::Empty => "empty",
            PopulationState::Populating => "populating",
            PopulationState::Ready => "ready",
        };
        write!(f, "{}", s)
    }
}

/// Summary of one completed bulk population.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PopulationReport {
    /// Entities written to the store
    pub entities_loaded: usize,

    /// Entities stored from listing data only (detail fetch failed)
    pub entities_degraded: usize,

    /// Listing rows that could not be used
    pub rows_skipped: usize,

    pub aliases_stored: usize,

    /// Aliases rejected on collision or skipped as identical to their entity
    pub aliases_skipped: usize,

    pub elapsed: Duration,
}

/// Why the last population did not reach `Ready`.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PopulationFailure {
    Cancelled,
    Failed(String),
}

impl PopulationFailure {
    fn to_error(&self) -> LookupError {
        match self {
            PopulationFailure::Cancelled => LookupError::Cancelled,
            PopulationFailure::Failed(reason) => LookupError::PopulationFailed {
                reason: reason.clone(),
            },
        }
    }
}

/// Per-stub result inside a population run.
struct StubOutcome {
    stored: bool,
    degraded: bool,
    alias: AliasOutcome,
}

struct Inner {
    store: Arc<KnowledgeStore>,
    fetcher: Arc<dyn Fetcher>,
    config: KnowledgeConfig,
    normalizer: Normalizer,
    state: watch::Sender<PopulationState>,
    last_failure: RwLock<Option<PopulationFailure>>,
    last_report: RwLock<Option<PopulationReport>>,
    cancel: Mutex<CancellationToken>,
    /// Keys whose targeted refresh found nothing, and when
    misses: RwLock<HashMap<String, Instant>>,
}

/// Answers queries against the knowledge store, populating it on demand.
///
/// Cheap to clone; clones share the store and the population state.
#[derive(Clone)]
pub struct LookupService {
    inner: Arc<Inner>,
}

impl LookupService {
    /// Create a service over `store`, fetching with `fetcher`.
    ///
    /// A `max_concurrent_fetches` of 0 is treated as 1.
    pub fn new(
        store: Arc<KnowledgeStore>,
        fetcher: impl Fetcher + 'static,
        config: KnowledgeConfig,
    ) -> Self {
        let normalizer = config.normalizer();
        let initial = if store.is_empty() {
            PopulationState::Empty
        } else {
            PopulationState::Ready
        };
        let (state, _) = watch::channel(initial);

        Self {
            inner: Arc::new(Inner {
                store,
                fetcher: Arc::new(fetcher),
                config,
                normalizer,
                state,
                last_failure: RwLock::new(None),
                last_report: RwLock::new(None),
                cancel: Mutex::new(CancellationToken::new()),
                misses: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Build a service fetching over HTTP, rate limited when the config
    /// sets a quota.
    pub fn with_http(config: KnowledgeConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let http = HttpFetcher::new(&config.fetch)?;
        let store = Arc::new(KnowledgeStore::new());

        let quota = config
            .fetch
            .requests_per_second
            .and_then(std::num::NonZeroU32::new);
        Ok(match quota {
            Some(rps) => Self::new(store, http.rate_limited(rps), config),
            None => Self::new(store, http, config),
        })
    }

    pub fn state(&self) -> PopulationState {
        *self.inner.state.borrow()
    }

    pub fn store(&self) -> &Arc<KnowledgeStore> {
        &self.inner.store
    }

    pub fn config(&self) -> &KnowledgeConfig {
        &self.inner.config
    }

    /// Report of the last population that reached `Ready`.
    pub fn last_report(&self) -> Option<PopulationReport> {
        self.inner
            .last_report
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Resolve a user query to an entity.
    ///
    /// Populates the store first if needed. A key missing from a ready store
    /// triggers one targeted fetch of that entity's page before reporting
    /// [`LookupError::NotFound`].
    pub async fn lookup(&self, query: &str) -> LookupResult<Resolution> {
        let key = self.inner.normalizer.canonicalize(query);
        if key.is_empty() {
            return Err(LookupError::NotFound { key });
        }

        self.ensure_populated().await?;

        match self.inner.store.get(&key) {
            Ok(resolution) => Ok(resolution),
            Err(LookupError::NotFound { .. }) => self.refresh_entity(query, &key).await,
            Err(e) => {
                warn!(key = %key, error = %e, "Lookup hit a broken alias");
                Err(e)
            }
        }
    }

    /// Make sure the store is populated.
    ///
    /// Starts population if the store is empty. Waits for a running
    /// population unless `wait_for_population` is off, in which case
    /// [`LookupError::Populating`] is returned instead.
    pub async fn ensure_populated(&self) -> LookupResult<()> {
        self.start_population();

        if !self.inner.config.wait_for_population && self.state() == PopulationState::Populating {
            return Err(LookupError::Populating);
        }
        self.wait_for_population().await
    }

    /// Start population if the store is empty, without waiting.
    ///
    /// Returns `true` if this call started it.
    pub fn start_population(&self) -> bool {
        self.begin_population(|state| state == PopulationState::Empty)
    }

    /// Repopulate from the sources, keeping current records readable until
    /// replaced. Returns `false` if a population is already running.
    ///
    /// If the refresh fails or is cancelled, the records already stored stay
    /// and the service stays `Ready`.
    pub fn refresh(&self) -> bool {
        let started = self.begin_population(|state| state != PopulationState::Populating);
        if started {
            info!("Refresh requested");
        }
        started
    }

    /// Populate (or join the running population) and wait for the outcome.
    ///
    /// Reports the last run's failure even when earlier records keep the
    /// service `Ready`.
    pub async fn populate(&self) -> LookupResult<PopulationReport> {
        self.start_population();
        self.wait_for_population().await?;
        if let Some(failure) = self.inner.last_failure() {
            return Err(failure.to_error());
        }
        Ok(self.last_report().unwrap_or_default())
    }

    /// Cancel the running population, if any.
    ///
    /// Entities already written stay in the store. The state becomes `Empty`
    /// if nothing was stored, in which case waiters get
    /// [`LookupError::Cancelled`], and `Ready` otherwise.
    pub fn cancel(&self) {
        self.inner
            .cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .cancel();
    }

    async fn wait_for_population(&self) -> LookupResult<()> {
        let mut rx = self.inner.state.subscribe();
        let state = *rx
            .wait_for(|state| *state != PopulationState::Populating)
            .await
            .map_err(|_| LookupError::Cancelled)?;

        match state {
            PopulationState::Ready => Ok(()),
            _ => Err(self.inner.failure_error()),
        }
    }

    /// Move to `Populating` if `from` accepts the current state, and spawn
    /// the population task.
    ///
    /// The cancel lock is held across the transition so a `cancel()` racing
    /// with it always reaches the new run's token.
    fn begin_population(&self, from: impl FnOnce(PopulationState) -> bool) -> bool {
        let mut cancel = self
            .inner
            .cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let started = self.inner.state.send_if_modified(|state| {
            if from(*state) {
                *state = PopulationState::Populating;
                true
            } else {
                false
            }
        });
        if !started {
            return false;
        }

        let token = CancellationToken::new();
        *cancel = token.clone();
        drop(cancel);

        self.spawn_population(token);
        true
    }

    fn spawn_population(&self, token: CancellationToken) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let mut guard = PopulationGuard {
                inner: &inner,
                finished: false,
            };
            let result = inner.run_population(&token).await;
            guard.finish(result);
        });
    }

    /// Fetch one entity's page after a store miss.
    ///
    /// A page is accepted only if its infobox names a capital. Misses are
    /// remembered for `miss_ttl_secs` so repeated queries for nonsense do
    /// not refetch.
    async fn refresh_entity(&self, query: &str, key: &str) -> LookupResult<Resolution> {
        let not_found = || LookupError::NotFound {
            key: key.to_string(),
        };

        if self.inner.recently_missed(key) {
            debug!(key = %key, "Skipping targeted refresh, recent miss");
            return Err(not_found());
        }

        // A synonym rewrote the query; look the canonical name up instead
        let name = if normalize_key(query) == key {
            collapse_whitespace(query)
        } else {
            capitalize_first(key)
        };
        let locator = self.inner.config.detail_locator(&name);
        info!(key = %key, locator = %locator, "Targeted refresh");

        let document = match self.inner.fetcher.fetch(&locator).await {
            Ok(document) => document,
            Err(e) => {
                info!(key = %key, error = %e, "Targeted refresh found nothing");
                self.inner.remember_miss(key);
                return Err(not_found());
            }
        };

        let detail = extract_detail(&document, &self.inner.config.fields);
        let Some(capital) = detail.capital else {
            info!(key = %key, "Page has no capital, not a country");
            self.inner.remember_miss(key);
            return Err(not_found());
        };

        let mut record = EntityRecord::new(capitalize_first(&name), capital.clone())
            .with_fields(detail.fields)
            .with_summary(detail.summary);
        record.name = key.to_string();

        self.inner.store.put_entity(record);
        self.inner.store.put_alias(AliasRecord::new(capital, key));
        self.inner.store.get(key)
    }
}

impl Inner {
    fn last_failure(&self) -> Option<PopulationFailure> {
        self.last_failure
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn failure_error(&self) -> LookupError {
        self.last_failure()
            .as_ref()
            .map(PopulationFailure::to_error)
            .unwrap_or_else(|| LookupError::PopulationFailed {
                reason: "population did not complete".to_string(),
            })
    }

    fn recently_missed(&self, key: &str) -> bool {
        let ttl = self.config.miss_ttl();
        self.misses
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .is_some_and(|at| at.elapsed() < ttl)
    }

    fn remember_miss(&self, key: &str) {
        if self.config.miss_ttl_secs == 0 {
            return;
        }
        let ttl = self.config.miss_ttl();
        let mut misses = self.misses.write().unwrap_or_else(PoisonError::into_inner);
        misses.retain(|_, at| at.elapsed() < ttl);
        misses.insert(key.to_string(), Instant::now());
    }

    async fn run_population(
        &self,
        token: &CancellationToken,
    ) -> Result<PopulationReport, PopulationFailure> {
        let started = Instant::now();
        let listing_url = &self.config.listing_url;
        info!(source = %listing_url, fetcher = %self.fetcher.name(), "Population starting");

        let document = tokio::select! {
            result = self.fetcher.fetch(listing_url) => result.map_err(|e| {
                warn!(error = %e, "Listing fetch failed");
                PopulationFailure::Failed(e.to_string())
            })?,
            _ = token.cancelled() => return Err(PopulationFailure::Cancelled),
        };

        let listing = extract_listing(&document, &self.config.listing).map_err(|e| {
            warn!(error = %e, "Listing could not be parsed");
            PopulationFailure::Failed(e.to_string())
        })?;
        info!(
            entities = listing.stubs.len(),
            skipped = listing.skipped_rows,
            "Listing parsed"
        );

        let outcomes: Vec<StubOutcome> = stream::iter(listing.stubs)
            .map(|stub| self.load_stub(stub))
            .buffer_unordered(self.config.max_concurrent_fetches.max(1))
            .take_until(token.cancelled())
            .collect()
            .await;

        if token.is_cancelled() {
            info!(loaded = outcomes.len(), "Population cancelled");
            return Err(PopulationFailure::Cancelled);
        }

        let mut report = PopulationReport {
            rows_skipped: listing.skipped_rows,
            ..Default::default()
        };
        for outcome in &outcomes {
            report.entities_loaded += usize::from(outcome.stored);
            report.entities_degraded += usize::from(outcome.degraded);
            match outcome.alias {
                AliasOutcome::Inserted | AliasOutcome::Dangling => report.aliases_stored += 1,
                _ => report.aliases_skipped += 1,
            }
        }
        report.elapsed = started.elapsed();

        info!(
            loaded = report.entities_loaded,
            degraded = report.entities_degraded,
            aliases = report.aliases_stored,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Population complete"
        );
        Ok(report)
    }

    /// Build one entity from its detail page and store it with its alias.
    ///
    /// A failed detail fetch still stores the entity, with listing data only.
    async fn load_stub(&self, stub: EntityStub) -> StubOutcome {
        let locator = self.config.detail_locator(&stub.country_name);
        let record = EntityRecord::new(&stub.country_name, &stub.capital_name);

        let (record, degraded) = match self.fetcher.fetch(&locator).await {
            Ok(document) => {
                let detail = extract_detail(&document, &self.config.fields);
                if !detail.has_infobox {
                    debug!(entity = %stub.country_name, "Detail page has no infobox");
                }
                (
                    record.with_fields(detail.fields).with_summary(detail.summary),
                    false,
                )
            }
            Err(e) => {
                warn!(
                    entity = %stub.country_name,
                    error = %e,
                    transient = e.is_transient(),
                    "Detail fetch failed, storing listing data only"
                );
                (record, true)
            }
        };

        let stored = self.store.put_entity(record);
        let alias = self
            .store
            .put_alias(AliasRecord::new(&stub.capital_name, &stub.country_name));

        StubOutcome {
            stored,
            degraded: stored && degraded,
            alias,
        }
    }
}

/// Moves the state out of `Populating` however the population task ends.
struct PopulationGuard<'a> {
    inner: &'a Inner,
    finished: bool,
}

impl PopulationGuard<'_> {
    fn finish(&mut self, result: Result<PopulationReport, PopulationFailure>) {
        self.finished = true;
        match result {
            Ok(report) => {
                *self
                    .inner
                    .last_report
                    .write()
                    .unwrap_or_else(PoisonError::into_inner) = Some(report);
                *self
                    .inner
                    .last_failure
                    .write()
                    .unwrap_or_else(PoisonError::into_inner) = None;
                self.inner
                    .misses
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clear();
                self.inner.state.send_replace(PopulationState::Ready);
            }
            Err(failure) => self.fail(failure),
        }
    }

    fn fail(&self, failure: PopulationFailure) {
        *self
            .inner
            .last_failure
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(failure);

        let state = if self.inner.store.is_empty() {
            PopulationState::Empty
        } else {
            info!(
                entities = self.inner.store.entity_count(),
                "Population did not complete, serving stored records"
            );
            PopulationState::Ready
        };
        self.inner.state.send_replace(state);
    }
}

impl Drop for PopulationGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            warn!("Population task ended without a result");
            self.fail(PopulationFailure::Failed(
                "population task aborted".to_string(),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetchers::{MockFailure, MockFetcher, MockFetcherBuilder};
    use tokio_test::{assert_err, assert_ok};

    const LISTING: &str = "https://example.org/wiki/Список";
    const BASE: &str = "https://example.org/wiki/";

    fn config() -> KnowledgeConfig {
        KnowledgeConfig::default()
            .with_listing_url(LISTING)
            .with_detail_base_url(BASE)
    }

    fn listing_page() -> &'static str {
        r#"<table class="wikitable">
            <tr><th>№</th><th>Государство</th><th>Столица</th></tr>
            <tr><td>1</td><td>Италия</td><td>Рим</td></tr>
        </table>"#
    }

    fn italy_page() -> &'static str {
        r#"<table class="infobox">
            <tr><th>Столица</th><td>Рим</td></tr>
            <tr><th>Валюта</th><td>Евро</td></tr>
        </table>
        <div class="mw-parser-output"><p>Италия — государство в Южной Европе.</p></div>"#
    }

    fn service(mock: MockFetcher, config: KnowledgeConfig) -> LookupService {
        LookupService::new(Arc::new(KnowledgeStore::new()), mock, config)
    }

    #[test]
    fn test_state_display() {
        assert_eq!(PopulationState::Populating.to_string(), "populating");
    }

    #[tokio::test]
    async fn test_starts_empty_and_becomes_ready() {
        let mock = MockFetcherBuilder::new()
            .page(LISTING, listing_page())
            .page("https://example.org/wiki/Италия", italy_page())
            .build();
        let service = service(mock, config());
        assert_eq!(service.state(), PopulationState::Empty);

        let report = assert_ok!(service.populate().await);
        assert_eq!(service.state(), PopulationState::Ready);
        assert_eq!(report.entities_loaded, 1);
        assert_eq!(report.entities_degraded, 0);
        assert_eq!(report.aliases_stored, 1);
    }

    #[tokio::test]
    async fn test_prepopulated_store_is_ready() {
        let store = Arc::new(KnowledgeStore::new());
        store.put_entity(EntityRecord::new("Италия", "Рим"));
        let service = LookupService::new(store, MockFetcher::new(), config());

        assert_eq!(service.state(), PopulationState::Ready);
        assert!(service.lookup("италия").await.is_ok());
    }

    #[tokio::test]
    async fn test_listing_failure_returns_to_empty() {
        let mock = MockFetcherBuilder::new()
            .failing(LISTING, MockFailure::Status(503))
            .build();
        let service = service(mock.clone(), config());

        let err = assert_err!(service.lookup("Италия").await);
        assert!(matches!(err, LookupError::PopulationFailed { .. }));
        assert_eq!(service.state(), PopulationState::Empty);

        mock.add_page(LISTING, listing_page());
        mock.add_page("https://example.org/wiki/Италия", italy_page());
        assert_ok!(service.lookup("Италия").await);
        assert_eq!(mock.calls_for(LISTING), 2);
    }

    #[tokio::test]
    async fn test_empty_query_is_not_found_without_fetching() {
        let mock = MockFetcher::new();
        let service = service(mock.clone(), config());

        assert!(service.lookup("   ").await.unwrap_err().is_not_found());
        assert_eq!(mock.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_cancel_returns_to_empty() {
        let mock = MockFetcherBuilder::new()
            .page(LISTING, listing_page())
            .latency(Duration::from_millis(200))
            .build();
        let service = service(mock, config());

        assert!(service.start_population());
        service.cancel();

        let err = service.ensure_populated().await.unwrap_err();
        assert!(matches!(err, LookupError::Cancelled));
        assert_eq!(service.state(), PopulationState::Empty);
    }

    #[tokio::test]
    async fn test_cancel_right_after_refresh_stops_that_refresh() {
        let store = Arc::new(KnowledgeStore::new());
        store.put_entity(EntityRecord::new("Италия", "Рим"));
        let mock = MockFetcherBuilder::new()
            .page(LISTING, listing_page())
            .latency(Duration::from_millis(200))
            .build();
        let service = LookupService::new(store, mock.clone(), config());

        assert!(service.refresh());
        service.cancel();

        let err = assert_err!(service.populate().await);
        assert!(matches!(err, LookupError::Cancelled));
        assert_eq!(service.state(), PopulationState::Ready);
        assert!(service.last_report().is_none());
        assert_eq!(mock.calls_for("https://example.org/wiki/Италия"), 0);
    }

    #[tokio::test]
    async fn test_expired_misses_are_pruned() {
        let service = service(MockFetcher::new(), config().with_miss_ttl_secs(1));
        let long_ago = Instant::now().checked_sub(Duration::from_secs(5)).unwrap();
        service
            .inner
            .misses
            .write()
            .unwrap()
            .insert("атлантида".to_string(), long_ago);

        service.inner.remember_miss("лемурия");

        let misses = service.inner.misses.read().unwrap();
        assert!(!misses.contains_key("атлантида"));
        assert!(misses.contains_key("лемурия"));
    }
}
