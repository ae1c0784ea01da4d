//! Search query, outcome and error models

use crate::places::LookupError;
use crate::results::{FailedLookup, GeoPoint, ScoredCandidate, Timing};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A place search around a point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Search origin
    pub origin: GeoPoint,
    /// Free-text term narrowing the search; may be empty
    #[serde(default)]
    pub query: String,
}

impl SearchQuery {
    pub fn new(origin: GeoPoint) -> Self {
        Self {
            origin,
            query: String::new(),
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    /// True when there is no free-text term
    pub fn is_empty(&self) -> bool {
        self.query.trim().is_empty()
    }

    /// Keyword sent to the provider for one variant
    pub fn keyword_for(&self, variant: &str) -> String {
        let query = self.query.trim();
        if query.is_empty() {
            variant.to_string()
        } else if query.to_lowercase().contains(&variant.to_lowercase()) {
            query.to_string()
        } else {
            format!("{} {}", query, variant)
        }
    }
}

/// Result of a completed search
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchOutcome {
    /// Accepted candidates in merge order
    pub candidates: Vec<ScoredCandidate>,
    /// Served from the cache without any lookup
    pub from_cache: bool,
    pub failed_lookups: Vec<FailedLookup>,
    pub timings: Vec<Timing>,
}

impl SearchOutcome {
    pub fn cached(candidates: Vec<ScoredCandidate>) -> Self {
        Self {
            candidates,
            from_cache: true,
            ..Default::default()
        }
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid search origin ({lat}, {lng})")]
    InvalidOrigin { lat: f64, lng: f64 },
    #[error("no keyword variants configured")]
    NoKeywords,
    #[error("all {} lookups failed", .failed.len())]
    AllLookupsFailed { failed: Vec<FailedLookup> },
    #[error(transparent)]
    Lookup(#[from] LookupError),
}
