//! Result container for merging candidates from concurrent lookups

use super::types::*;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

#[derive(Debug, Default)]
struct Merged {
    /// Candidates in first-seen order
    order: Vec<PlaceCandidate>,
    /// id -> position in `order`
    positions: HashMap<String, usize>,
}

/// Container shared by the lookups of one search
///
/// Candidates are deduplicated by id; the first sighting keeps its
/// position, so the final order follows lookup completion order.
#[derive(Debug, Clone, Default)]
pub struct ResultContainer {
    merged: Arc<RwLock<Merged>>,
    /// Lookups that failed or timed out
    failed_lookups: Arc<RwLock<Vec<FailedLookup>>>,
    /// Per-lookup timings
    timings: Arc<RwLock<Vec<Timing>>>,
}

impl ResultContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a candidate. Returns false for duplicates and records
    /// without an id. Ids are compared trimmed.
    pub fn add_candidate(&self, mut candidate: PlaceCandidate) -> bool {
        let id = candidate.id.trim();
        if id.len() != candidate.id.len() {
            candidate.id = id.to_string();
        }
        if candidate.id.is_empty() {
            debug!("Skipping candidate without id: {}", candidate.name);
            return false;
        }

        let mut merged = self.merged.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(&pos) = merged.positions.get(&candidate.id) {
            merged.order[pos].merge(&candidate);
            return false;
        }

        let pos = merged.order.len();
        merged.positions.insert(candidate.id.clone(), pos);
        merged.order.push(candidate);
        true
    }

    /// Add a batch, returning how many were new
    pub fn extend_candidates(&self, candidates: Vec<PlaceCandidate>) -> usize {
        candidates
            .into_iter()
            .map(|c| self.add_candidate(c))
            .filter(|added| *added)
            .count()
    }

    pub fn add_failed(&self, keyword: impl Into<String>, kind: LookupFailureKind) {
        self.failed_lookups
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(FailedLookup {
                keyword: keyword.into(),
                kind,
            });
    }

    pub fn add_timing(&self, timing: Timing) {
        self.timings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(timing);
    }

    /// Unique candidates in merge order
    pub fn get_candidates(&self) -> Vec<PlaceCandidate> {
        self.merged
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .order
            .clone()
    }

    pub fn get_failed(&self) -> Vec<FailedLookup> {
        self.failed_lookups
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn get_timings(&self) -> Vec<Timing> {
        self.timings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn candidate_count(&self) -> usize {
        self.merged
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .order
            .len()
    }
}
