//! Application state shared across handlers

use crate::cache::{CacheLimits, CacheStore, FileMedium, SystemClock};
use crate::config::{CacheSettings, Settings};
use crate::feedback::FeedbackInbox;
use crate::library::ShopLibrary;
use crate::metrics::Metrics;
use crate::places::LookupSource;
use crate::search::Search;
use crate::summary::{CachedSummarizer, Summarizer};
use anyhow::Context;
use std::sync::Arc;
use tracing::info;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub search: Arc<Search>,
    pub summarizer: Arc<CachedSummarizer>,
    pub library: Arc<ShopLibrary>,
    pub feedback: Arc<FeedbackInbox>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    /// Open the caches and wire the services around the given providers
    pub async fn build(
        settings: Settings,
        source: Arc<dyn LookupSource>,
        summarizer: Arc<dyn Summarizer>,
    ) -> anyhow::Result<Self> {
        let places = open_store("places", &settings.cache, settings.cache.places).await?;
        let summaries = open_store("summaries", &settings.cache, settings.cache.summaries).await?;
        let library_store = open_store("library", &settings.cache, CacheLimits::default()).await?;
        let feedback_store = open_store("feedback", &settings.cache, settings.cache.feedback).await?;

        let metrics = Arc::new(Metrics::new());
        let mut search = Search::from_settings(source, places, &settings.search);
        if settings.general.enable_metrics {
            search = search.with_metrics(metrics.clone());
        }
        let summarizer =
            CachedSummarizer::new(summarizer, summaries).with_ttl(settings.summarizer.ttl());
        let library = ShopLibrary::new(library_store).with_settings(&settings.library);
        let feedback = FeedbackInbox::with_settings(feedback_store, &settings.feedback);

        Ok(Self {
            settings: Arc::new(settings),
            search: Arc::new(search),
            summarizer: Arc::new(summarizer),
            library: Arc::new(library),
            feedback: Arc::new(feedback),
            metrics,
        })
    }

    /// Get instance name
    pub fn instance_name(&self) -> &str {
        &self.settings.general.instance_name
    }

    pub fn places_cache(&self) -> &Arc<CacheStore> {
        self.search.cache()
    }

    pub fn summary_cache(&self) -> &Arc<CacheStore> {
        self.summarizer.cache()
    }
}

/// File-backed under the cache directory when one is configured,
/// in-process otherwise
async fn open_store(
    name: &str,
    settings: &CacheSettings,
    limits: CacheLimits,
) -> anyhow::Result<Arc<CacheStore>> {
    let Some(dir) = &settings.directory else {
        return Ok(Arc::new(CacheStore::in_memory(name, limits)));
    };

    let path = dir.join(name);
    let medium = FileMedium::open(&path, settings.quota_bytes)
        .await
        .with_context(|| format!("opening cache directory {}", path.display()))?;
    let store = CacheStore::open(name, Arc::new(medium), limits, Arc::new(SystemClock))
        .await
        .with_context(|| format!("loading cache {}", name))?;
    info!("Cache '{}' stored in {}", name, path.display());
    Ok(Arc::new(store))
}
