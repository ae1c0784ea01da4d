//! Relevance scoring of place candidates
//!
//! A rule-based classifier: weighted keyword tiers add points, any
//! exclusion term rejects outright, and the total is normalized into a
//! confidence in [0, 1].

mod rules;

pub use rules::*;

use crate::results::{PlaceCandidate, ScoredCandidate};

/// Breakdown of how a candidate scored
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub points: u32,
    pub confidence: f64,
    pub accepted: bool,
    /// Terms that contributed points
    pub matched: Vec<String>,
    /// Exclusion term that rejected the candidate
    pub excluded_by: Option<String>,
}

/// Scores candidates against a [`RuleSet`]
#[derive(Debug, Clone)]
pub struct Evaluator {
    rules: RuleSet,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new(RuleSet::default())
    }
}

impl Evaluator {
    /// Terms are matched case-insensitively; duplicates within a tier
    /// are collapsed.
    pub fn new(mut rules: RuleSet) -> Self {
        for tier in &mut rules.tiers {
            tier.terms = normalize_terms(&tier.terms);
        }
        rules.exclusions = normalize_terms(&rules.exclusions);
        rules.generic_categories = normalize_terms(&rules.generic_categories);
        if rules.normalizer.is_nan() || rules.normalizer <= 0.0 {
            rules.normalizer = NORMALIZER;
        }
        Self { rules }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Score a candidate without copying it
    pub fn verdict(&self, candidate: &PlaceCandidate) -> Verdict {
        let text = Self::haystack(candidate);

        if let Some(term) = self.rules.exclusions.iter().find(|t| text.contains(t.as_str())) {
            return Verdict {
                points: 0,
                confidence: 0.0,
                accepted: false,
                matched: Vec::new(),
                excluded_by: Some(term.clone()),
            };
        }

        let mut points = 0;
        let mut matched = Vec::new();
        for tier in &self.rules.tiers {
            for term in tier.terms.iter().filter(|t| text.contains(t.as_str())) {
                points += tier.weight;
                matched.push(term.clone());
            }
        }

        let generic = candidate
            .category_tags
            .iter()
            .any(|tag| self.rules.generic_categories.contains(&tag.to_lowercase()));
        if generic {
            points += self.rules.generic_bonus;
        }

        Verdict {
            points,
            confidence: (points as f64 / self.rules.normalizer).min(1.0),
            accepted: points >= self.rules.accept_threshold,
            matched,
            excluded_by: None,
        }
    }

    pub fn evaluate(&self, candidate: PlaceCandidate) -> ScoredCandidate {
        let verdict = self.verdict(&candidate);
        ScoredCandidate {
            candidate,
            confidence: verdict.confidence,
            is_accepted: verdict.accepted,
        }
    }

    /// Score every candidate and keep the accepted ones, order preserved
    pub fn accept_all(&self, candidates: Vec<PlaceCandidate>) -> Vec<ScoredCandidate> {
        candidates
            .into_iter()
            .map(|c| self.evaluate(c))
            .filter(|s| s.is_accepted)
            .collect()
    }

    /// Name, vicinity and categories as one lowercase string
    fn haystack(candidate: &PlaceCandidate) -> String {
        let mut parts = vec![candidate.name.as_str(), candidate.vicinity.as_str()];
        parts.extend(candidate.category_tags.iter().map(String::as_str));
        parts.join(" ").to_lowercase()
    }
}

fn normalize_terms(terms: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(terms.len());
    for term in terms {
        let term = term.trim().to_lowercase();
        if !term.is_empty() && !out.contains(&term) {
            out.push(term);
        }
    }
    out
}
