//! Metrics collection module
//!
//! Tracks per-keyword lookup performance, failure rates and search volume.

use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

/// Response times kept per keyword
const WINDOW: usize = 100;

#[derive(Debug, Default)]
struct KeywordCounters {
    lookups: u64,
    successes: u64,
    errors: u64,
    response_times: VecDeque<u64>,
}

/// Search metrics collector
#[derive(Debug, Default)]
pub struct Metrics {
    total_searches: AtomicU64,
    cached_searches: AtomicU64,
    failed_searches: AtomicU64,
    keywords: RwLock<HashMap<String, KeywordCounters>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a search request
    pub fn inc_search(&self) {
        self.total_searches.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a search answered from the cache
    pub fn inc_cached(&self) {
        self.cached_searches.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a search where every lookup failed
    pub fn inc_failed(&self) {
        self.failed_searches.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successful lookup and its latency under its keyword
    /// variant. Callers pass the configured variant, never user text.
    pub fn record_success(&self, keyword: &str, time_ms: u64) {
        let mut keywords = self.keywords.write().unwrap_or_else(PoisonError::into_inner);
        let counters = keywords.entry(keyword.to_string()).or_default();
        counters.lookups += 1;
        counters.successes += 1;
        if counters.response_times.len() >= WINDOW {
            counters.response_times.pop_front();
        }
        counters.response_times.push_back(time_ms);
    }

    /// Record a failed lookup
    pub fn record_error(&self, keyword: &str) {
        let mut keywords = self.keywords.write().unwrap_or_else(PoisonError::into_inner);
        let counters = keywords.entry(keyword.to_string()).or_default();
        counters.lookups += 1;
        counters.errors += 1;
    }

    pub fn total_searches(&self) -> u64 {
        self.total_searches.load(Ordering::Relaxed)
    }

    /// Average response time over the recent window
    pub fn avg_response_time(&self, keyword: &str) -> Option<u64> {
        let keywords = self.keywords.read().unwrap_or_else(PoisonError::into_inner);
        keywords.get(keyword).and_then(average)
    }

    /// Success percentage for a keyword; 100 when never looked up
    pub fn reliability(&self, keyword: &str) -> f64 {
        let keywords = self.keywords.read().unwrap_or_else(PoisonError::into_inner);
        keywords.get(keyword).map_or(100.0, reliability)
    }

    /// Point-in-time copy of everything collected
    pub fn snapshot(&self) -> MetricsSnapshot {
        let keywords = self.keywords.read().unwrap_or_else(PoisonError::into_inner);
        MetricsSnapshot {
            total_searches: self.total_searches.load(Ordering::Relaxed),
            cached_searches: self.cached_searches.load(Ordering::Relaxed),
            failed_searches: self.failed_searches.load(Ordering::Relaxed),
            keywords: keywords
                .iter()
                .map(|(keyword, counters)| {
                    (
                        keyword.clone(),
                        KeywordStats {
                            lookups: counters.lookups,
                            errors: counters.errors,
                            avg_response_time: average(counters),
                            reliability: reliability(counters),
                        },
                    )
                })
                .collect(),
        }
    }
}

fn average(counters: &KeywordCounters) -> Option<u64> {
    let times = &counters.response_times;
    if times.is_empty() {
        None
    } else {
        Some(times.iter().sum::<u64>() / times.len() as u64)
    }
}

fn reliability(counters: &KeywordCounters) -> f64 {
    if counters.lookups == 0 {
        100.0
    } else {
        counters.successes as f64 / counters.lookups as f64 * 100.0
    }
}

/// Statistics for a single keyword variant
#[derive(Debug, Clone, Serialize)]
pub struct KeywordStats {
    pub lookups: u64,
    pub errors: u64,
    pub avg_response_time: Option<u64>,
    pub reliability: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub total_searches: u64,
    pub cached_searches: u64,
    pub failed_searches: u64,
    pub keywords: HashMap<String, KeywordStats>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics() {
        let metrics = Metrics::new();

        metrics.inc_search();
        metrics.record_success("ramen", 100);
        metrics.record_success("ramen", 300);
        metrics.record_error("ramen");

        assert_eq!(metrics.total_searches(), 1);
        assert_eq!(metrics.avg_response_time("ramen"), Some(200));
        assert!((metrics.reliability("ramen") - 66.666).abs() < 0.01);
        assert_eq!(metrics.reliability("unknown"), 100.0);
    }

    #[test]
    fn test_response_window() {
        let metrics = Metrics::new();
        for _ in 0..WINDOW {
            metrics.record_success("ramen", 1000);
        }
        for _ in 0..WINDOW {
            metrics.record_success("ramen", 10);
        }
        assert_eq!(metrics.avg_response_time("ramen"), Some(10));
    }

    #[test]
    fn test_snapshot() {
        let metrics = Metrics::new();
        metrics.inc_search();
        metrics.inc_cached();
        metrics.record_error("つけ麺");

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.cached_searches, 1);
        let stats = &snapshot.keywords["つけ麺"];
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.reliability, 0.0);
        assert!(stats.avg_response_time.is_none());
    }
}
