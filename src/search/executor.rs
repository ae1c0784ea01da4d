//! Search execution and orchestration

use super::models::{SearchError, SearchOutcome, SearchQuery};
use crate::cache::{location_key, CacheStore};
use crate::config::SearchSettings;
use crate::evaluator::Evaluator;
use crate::library::{FlagIndex, ShopLibrary};
use crate::metrics::Metrics;
use crate::places::{LookupError, LookupSource};
use crate::results::{
    GeoPoint, PlaceDetails, ResultContainer, ScoredCandidate, ShopRecord, Timing,
};
use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Coordinates concurrent keyword lookups against a place source,
/// deduplicates and scores the candidates, and caches the outcome
pub struct Search {
    source: Arc<dyn LookupSource>,
    cache: Arc<CacheStore>,
    evaluator: Evaluator,
    variants: Vec<String>,
    radius_m: u32,
    precision: u32,
    lookup_timeout: Duration,
    result_ttl: Duration,
    details_ttl: Duration,
    metrics: Option<Arc<Metrics>>,
}

impl Search {
    /// Create a search with the default settings
    pub fn new(source: Arc<dyn LookupSource>, cache: Arc<CacheStore>) -> Self {
        Self::from_settings(source, cache, &SearchSettings::default())
    }

    pub fn from_settings(
        source: Arc<dyn LookupSource>,
        cache: Arc<CacheStore>,
        settings: &SearchSettings,
    ) -> Self {
        Self {
            source,
            cache,
            evaluator: Evaluator::new(settings.rules()),
            variants: settings.keyword_variants.clone(),
            radius_m: settings.radius_m,
            precision: settings.location_precision,
            lookup_timeout: settings.lookup_timeout(),
            result_ttl: settings.result_ttl(),
            details_ttl: settings.details_ttl(),
            metrics: None,
        }
    }

    pub fn with_evaluator(mut self, evaluator: Evaluator) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn with_variants<I, S>(mut self, variants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.variants = variants.into_iter().map(Into::into).collect();
        self
    }

    /// Set the per-lookup timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    pub fn with_result_ttl(mut self, ttl: Duration) -> Self {
        self.result_ttl = ttl;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    /// Cache key of a query's results
    pub fn cache_key(&self, query: &SearchQuery) -> String {
        location_key("places", query.origin, self.precision, &query.query)
    }

    /// Run a search: cached results when present, otherwise one lookup
    /// per keyword variant, merged first-seen and filtered by relevance
    pub async fn execute(&self, query: &SearchQuery) -> Result<SearchOutcome, SearchError> {
        if !query.origin.is_valid() {
            return Err(SearchError::InvalidOrigin {
                lat: query.origin.lat,
                lng: query.origin.lng,
            });
        }
        if let Some(metrics) = &self.metrics {
            metrics.inc_search();
        }

        let key = self.cache_key(query);
        if let Some(candidates) = self.cache.get::<Vec<ScoredCandidate>>(&key).await {
            debug!("Cache hit for {} ({} candidates)", key, candidates.len());
            if let Some(metrics) = &self.metrics {
                metrics.inc_cached();
            }
            return Ok(SearchOutcome::cached(candidates));
        }

        // (variant, keyword) pairs; metrics are keyed by the configured
        // variant so free-text queries cannot grow them
        let mut keywords: Vec<(&str, String)> = Vec::with_capacity(self.variants.len());
        for variant in self.variants.iter().map(|v| v.trim()).filter(|v| !v.is_empty()) {
            let keyword = query.keyword_for(variant);
            if !keywords.iter().any(|(_, k)| *k == keyword) {
                keywords.push((variant, keyword));
            }
        }
        if keywords.is_empty() {
            return Err(SearchError::NoKeywords);
        }

        info!(
            "Searching '{}' around ({}, {}) with {} lookups",
            query.query,
            query.origin.lat,
            query.origin.lng,
            keywords.len()
        );

        let container = ResultContainer::new();
        let lookups: Vec<_> = keywords
            .iter()
            .map(|(variant, keyword)| self.lookup(variant, keyword, query, container.clone()))
            .collect();
        join_all(lookups).await;

        let failed = container.get_failed();
        if failed.len() == keywords.len() {
            warn!("All {} lookups failed for {}", failed.len(), key);
            if let Some(metrics) = &self.metrics {
                metrics.inc_failed();
            }
            return Err(SearchError::AllLookupsFailed { failed });
        }

        let merged = container.get_candidates();
        let merged_count = merged.len();
        let candidates = self.evaluator.accept_all(merged);
        debug!(
            "Accepted {} of {} unique candidates for {}",
            candidates.len(),
            merged_count,
            key
        );

        self.cache.set(&key, &candidates, self.result_ttl).await;

        Ok(SearchOutcome {
            candidates,
            from_cache: false,
            failed_lookups: failed,
            timings: container.get_timings(),
        })
    }

    /// One bounded lookup; outcome goes to the container
    async fn lookup(
        &self,
        variant: &str,
        keyword: &str,
        query: &SearchQuery,
        container: ResultContainer,
    ) {
        let start = Instant::now();
        debug!(
            "Looking up '{}' on {} with timeout {:?}",
            keyword,
            self.source.name(),
            self.lookup_timeout
        );

        let result = timeout(
            self.lookup_timeout,
            self.source.search(query.origin, self.radius_m, keyword),
        )
        .await
        .unwrap_or(Err(LookupError::Timeout));
        let elapsed = start.elapsed();

        match result {
            Ok(candidates) => {
                let result_count = candidates.len();
                let added = container.extend_candidates(candidates);
                container.add_timing(Timing {
                    keyword: keyword.to_string(),
                    time_ms: elapsed.as_millis() as u64,
                    result_count,
                });
                if let Some(metrics) = &self.metrics {
                    metrics.record_success(variant, elapsed.as_millis() as u64);
                }
                debug!(
                    "Lookup '{}' returned {} places ({} new) in {:?}",
                    keyword, result_count, added, elapsed
                );
            }
            Err(e) => {
                warn!("Lookup '{}' failed: {}", keyword, e);
                container.add_failed(keyword, e.kind());
                if let Some(metrics) = &self.metrics {
                    metrics.record_error(variant);
                }
            }
        }
    }

    /// Place details, cached per id
    pub async fn details(&self, id: &str) -> Result<PlaceDetails, SearchError> {
        let key = format!("details:{}", id);
        if let Some(details) = self.cache.get::<PlaceDetails>(&key).await {
            return Ok(details);
        }

        let details = timeout(self.lookup_timeout, self.source.details(id))
            .await
            .unwrap_or(Err(LookupError::Timeout))?;
        self.cache.set(&key, &details, self.details_ttl).await;
        Ok(details)
    }

    /// Search and shape the accepted places as shop records, in merge
    /// order, marked with the user's library flags
    pub async fn perform_search(
        &self,
        query: &SearchQuery,
        library: Option<&ShopLibrary>,
    ) -> Result<Vec<ShopRecord>, SearchError> {
        let outcome = self.execute(query).await?;
        let flags = match library {
            Some(library) => library.flag_index().await,
            None => FlagIndex::default(),
        };
        Ok(shop_records(&outcome, query.origin, &flags))
    }
}

/// Shop records for an outcome's candidates, keeping their order
pub fn shop_records(outcome: &SearchOutcome, origin: GeoPoint, flags: &FlagIndex) -> Vec<ShopRecord> {
    outcome
        .candidates
        .iter()
        .map(|scored| ShopRecord::from_scored(scored, origin, flags.flags(&scored.candidate.id)))
        .collect()
}
