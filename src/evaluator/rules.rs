//! Keyword rule tables for relevance scoring

use serde::{Deserialize, Serialize};

/// Points awarded per high-tier term
pub const HIGH_WEIGHT: u32 = 10;
/// Points awarded per medium-tier term
pub const MEDIUM_WEIGHT: u32 = 5;
/// Points awarded per low-tier term
pub const LOW_WEIGHT: u32 = 2;
/// Bonus when a candidate carries a generic venue category
pub const GENERIC_BONUS: u32 = 3;
/// Minimum points for acceptance
pub const ACCEPT_THRESHOLD: u32 = 5;
/// Points that map to full confidence
pub const NORMALIZER: f64 = 10.0;

/// A weighted group of terms
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordTier {
    pub name: String,
    pub weight: u32,
    pub terms: Vec<String>,
}

impl KeywordTier {
    pub fn new<I, S>(name: impl Into<String>, weight: u32, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            weight,
            terms: terms.into_iter().map(Into::into).collect(),
        }
    }
}

/// Complete rule table handed to the evaluator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleSet {
    pub tiers: Vec<KeywordTier>,
    /// Any of these rejects a candidate outright
    pub exclusions: Vec<String>,
    /// Provider categories worth the generic bonus
    pub generic_categories: Vec<String>,
    pub generic_bonus: u32,
    pub accept_threshold: u32,
    pub normalizer: f64,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::ramen()
    }
}

impl RuleSet {
    /// Standard weights with caller-supplied term lists
    pub fn with_terms<S: Into<String>>(
        high: impl IntoIterator<Item = S>,
        medium: impl IntoIterator<Item = S>,
        low: impl IntoIterator<Item = S>,
        exclusions: impl IntoIterator<Item = S>,
        generic_categories: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            tiers: vec![
                KeywordTier::new("high", HIGH_WEIGHT, high),
                KeywordTier::new("medium", MEDIUM_WEIGHT, medium),
                KeywordTier::new("low", LOW_WEIGHT, low),
            ],
            exclusions: exclusions.into_iter().map(Into::into).collect(),
            generic_categories: generic_categories.into_iter().map(Into::into).collect(),
            generic_bonus: GENERIC_BONUS,
            accept_threshold: ACCEPT_THRESHOLD,
            normalizer: NORMALIZER,
        }
    }

    /// Rules for telling ramen shops apart from other eateries
    pub fn ramen() -> Self {
        Self::with_terms(
            [
                "ラーメン", "らーめん", "拉麺", "ramen", "中華そば", "つけ麺", "つけめん",
                "担々麺", "油そば", "まぜそば",
            ],
            [
                "麺", "noodle", "豚骨", "とんこつ", "tonkotsu", "味噌", "醤油", "家系",
                "二郎", "tsukemen",
            ],
            ["中華", "chinese", "食堂", "ヌードル", "soup"],
            [
                "うどん", "udon", "蕎麦", "そば処", "手打ちそば", "寿司", "すし", "sushi",
                "焼肉", "yakiniku", "居酒屋", "izakaya", "カフェ", "cafe", "coffee",
                "bakery", "コンビニ", "convenience_store", "supermarket", "lodging",
            ],
            ["restaurant", "food", "meal_takeaway", "meal_delivery"],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_ramen() {
        let rules = RuleSet::default();
        assert_eq!(rules.tiers.len(), 3);
        assert_eq!(rules.tiers[0].weight, 10);
        assert_eq!(rules.tiers[1].weight, 5);
        assert_eq!(rules.tiers[2].weight, 2);
        assert_eq!(rules.accept_threshold, 5);
        assert!(rules.exclusions.iter().any(|t| t == "sushi"));
    }

    #[test]
    fn test_rules_from_yaml() {
        let yaml = r#"
tiers:
  - name: high
    weight: 10
    terms: [pho]
exclusions: [bakery]
"#;
        let rules: RuleSet = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(rules.tiers.len(), 1);
        assert_eq!(rules.exclusions, vec!["bakery"]);
        // Unspecified fields fall back to the ramen defaults
        assert_eq!(rules.generic_bonus, GENERIC_BONUS);
        assert!(rules.generic_categories.contains(&"restaurant".to_string()));
    }
}
