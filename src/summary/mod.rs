//! Review summaries and feature tags
//!
//! A [`Summarizer`] turns a shop's review text into short feature tags
//! and a good/bad/tips digest. Results are cached per place.

mod gemini;

pub use gemini::GeminiSummarizer;

use crate::cache::CacheStore;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("invalid summarizer URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("HTTP status {0}")]
    Http(u16),
    #[error("summarizer rate limit reached")]
    RateLimited,
    #[error("could not parse summarizer response: {0}")]
    Parse(String),
}

/// Digest of a shop's reviews
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewSummary {
    #[serde(default)]
    pub good_points: Vec<String>,
    #[serde(default)]
    pub bad_points: Vec<String>,
    #[serde(default)]
    pub tips: Vec<String>,
}

impl ReviewSummary {
    pub fn is_empty(&self) -> bool {
        self.good_points.is_empty() && self.bad_points.is_empty() && self.tips.is_empty()
    }
}

#[async_trait]
pub trait Summarizer: Send + Sync {
    fn name(&self) -> &str;

    /// A handful of short tags describing the shop
    async fn feature_tags(&self, place_id: &str, review_text: &str) -> Result<Vec<String>, SummaryError>;

    async fn review_summary(&self, place_id: &str, review_text: &str) -> Result<ReviewSummary, SummaryError>;
}

/// Canned output for running without an API key
#[derive(Debug, Clone, Copy, Default)]
pub struct SampleSummarizer;

#[async_trait]
impl Summarizer for SampleSummarizer {
    fn name(&self) -> &str {
        "sample"
    }

    async fn feature_tags(&self, _place_id: &str, _review_text: &str) -> Result<Vec<String>, SummaryError> {
        Ok(vec![
            "濃厚スープ".to_string(),
            "チャーシューが絶品".to_string(),
            "行列必至".to_string(),
        ])
    }

    async fn review_summary(&self, _place_id: &str, _review_text: &str) -> Result<ReviewSummary, SummaryError> {
        Ok(ReviewSummary {
            good_points: vec![
                "濃厚でクリーミーな豚骨スープ".to_string(),
                "とろけるチャーシューが高評価".to_string(),
            ],
            bad_points: vec![
                "週末は行列が長くなることがある".to_string(),
                "店内はカウンター席のみで狭め".to_string(),
            ],
            tips: vec![
                "「替え玉」を「バリカタ」で頼むのが人気".to_string(),
                "卓上の無料トッピング（高菜、紅生姜）を活用すべし".to_string(),
            ],
        })
    }
}

/// Caches another summarizer's output under `tags:{id}` / `summary:{id}`
pub struct CachedSummarizer {
    inner: Arc<dyn Summarizer>,
    cache: Arc<CacheStore>,
    ttl: Duration,
}

impl CachedSummarizer {
    pub fn new(inner: Arc<dyn Summarizer>, cache: Arc<CacheStore>) -> Self {
        Self {
            inner,
            cache,
            ttl: Duration::from_secs(24 * 60 * 60),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }
}

#[async_trait]
impl Summarizer for CachedSummarizer {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn feature_tags(&self, place_id: &str, review_text: &str) -> Result<Vec<String>, SummaryError> {
        if review_text.trim().is_empty() {
            return Ok(Vec::new());
        }
        let key = format!("tags:{}", place_id);
        if let Some(tags) = self.cache.get(&key).await {
            debug!("Feature tags for {} served from cache", place_id);
            return Ok(tags);
        }

        let tags = self.inner.feature_tags(place_id, review_text).await?;
        if !tags.is_empty() {
            self.cache.set(&key, &tags, self.ttl).await;
        }
        Ok(tags)
    }

    async fn review_summary(&self, place_id: &str, review_text: &str) -> Result<ReviewSummary, SummaryError> {
        if review_text.trim().is_empty() {
            return Ok(ReviewSummary::default());
        }
        let key = format!("summary:{}", place_id);
        if let Some(summary) = self.cache.get(&key).await {
            debug!("Review summary for {} served from cache", place_id);
            return Ok(summary);
        }

        let summary = self.inner.review_summary(place_id, review_text).await?;
        if !summary.is_empty() {
            self.cache.set(&key, &summary, self.ttl).await;
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheLimits;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingSummarizer {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Summarizer for CountingSummarizer {
        fn name(&self) -> &str {
            "counting"
        }

        async fn feature_tags(&self, place_id: &str, _review_text: &str) -> Result<Vec<String>, SummaryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![format!("tag-{}", place_id)])
        }

        async fn review_summary(&self, _place_id: &str, _review_text: &str) -> Result<ReviewSummary, SummaryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(SummaryError::RateLimited)
        }
    }

    fn cached(inner: Arc<CountingSummarizer>) -> CachedSummarizer {
        let cache = Arc::new(CacheStore::in_memory("summaries", CacheLimits::default()));
        CachedSummarizer::new(inner, cache)
    }

    #[tokio::test]
    async fn test_tags_cached_per_place() {
        let inner = Arc::new(CountingSummarizer::default());
        let summarizer = cached(inner.clone());

        assert_eq!(summarizer.feature_tags("p1", "great soup").await.unwrap(), vec!["tag-p1"]);
        assert_eq!(summarizer.feature_tags("p1", "great soup").await.unwrap(), vec!["tag-p1"]);
        assert_eq!(summarizer.feature_tags("p2", "thin noodles").await.unwrap(), vec!["tag-p2"]);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_empty_reviews_skip_provider() {
        let inner = Arc::new(CountingSummarizer::default());
        let summarizer = cached(inner.clone());

        assert!(summarizer.feature_tags("p1", "  ").await.unwrap().is_empty());
        assert!(summarizer.review_summary("p1", "").await.unwrap().is_empty());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let inner = Arc::new(CountingSummarizer::default());
        let summarizer = cached(inner.clone());

        assert!(summarizer.review_summary("p1", "text").await.is_err());
        assert!(summarizer.review_summary("p1", "text").await.is_err());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
        assert!(summarizer.cache().is_empty().await);
    }

    #[test]
    fn test_sample_summarizer() {
        let sample = SampleSummarizer;
        let tags = tokio_test::block_on(sample.feature_tags("p1", "text")).unwrap();
        assert_eq!(tags.len(), 3);
        let summary = tokio_test::block_on(sample.review_summary("p1", "text")).unwrap();
        assert_eq!(summary.tips.len(), 2);
    }
}
