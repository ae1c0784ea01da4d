//! Place and shop type definitions

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;

/// A coordinate pair in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    const EARTH_RADIUS_M: f64 = 6_371_000.0;

    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Finite and inside the usual lat/lng ranges
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }

    /// Great-circle distance in meters (haversine)
    pub fn distance_to(&self, other: &GeoPoint) -> f64 {
        let (lat1, lat2) = (self.lat.to_radians(), other.lat.to_radians());
        let d_lat = (other.lat - self.lat).to_radians();
        let d_lng = (other.lng - self.lng).to_radians();

        let a = (d_lat / 2.0).sin().powi(2)
            + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
        2.0 * Self::EARTH_RADIUS_M * a.sqrt().asin()
    }
}

/// A raw place returned by a lookup, before relevance filtering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceCandidate {
    /// Provider place id
    pub id: String,
    pub name: String,
    /// Short locality / address text
    pub vicinity: String,
    /// Provider categories ("restaurant", "food", ...)
    #[serde(default)]
    pub category_tags: BTreeSet<String>,
    #[serde(default)]
    pub location: Option<GeoPoint>,
    #[serde(default)]
    pub rating: Option<f32>,
    #[serde(default)]
    pub user_ratings_total: Option<u32>,
    #[serde(default)]
    pub open_now: Option<bool>,
}

impl PlaceCandidate {
    pub fn new(id: impl Into<String>, name: impl Into<String>, vicinity: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            vicinity: vicinity.into(),
            category_tags: BTreeSet::new(),
            location: None,
            rating: None,
            user_ratings_total: None,
            open_now: None,
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.category_tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn with_location(mut self, location: GeoPoint) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_rating(mut self, rating: f32) -> Self {
        self.rating = Some(rating);
        self
    }

    /// Fill fields this record lacks from a later duplicate.
    /// Name, vicinity and tags of the first sighting win.
    pub fn merge(&mut self, other: &PlaceCandidate) {
        if self.location.is_none() {
            self.location = other.location;
        }
        if self.rating.is_none() {
            self.rating = other.rating;
        }
        if self.user_ratings_total.is_none() {
            self.user_ratings_total = other.user_ratings_total;
        }
        if self.open_now.is_none() {
            self.open_now = other.open_now;
        }
    }
}

/// A candidate with its relevance verdict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    #[serde(flatten)]
    pub candidate: PlaceCandidate,
    /// Normalized score in [0, 1]
    pub confidence: f64,
    pub is_accepted: bool,
}

/// A single user review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub author: String,
    pub text: String,
    pub rating: Option<f32>,
}

/// Full record for one place
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaceDetails {
    pub id: String,
    pub name: String,
    pub address: String,
    pub location: Option<GeoPoint>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub rating: Option<f32>,
    pub user_ratings_total: Option<u32>,
    pub open_now: Option<bool>,
    /// One line per weekday, as the provider formats them
    #[serde(default)]
    pub opening_hours: Vec<String>,
    #[serde(default)]
    pub reviews: Vec<Review>,
    /// Provider photo references
    #[serde(default)]
    pub photos: Vec<String>,
    pub maps_url: Option<String>,
}

impl PlaceDetails {
    /// All review text, one review per line, for summarization
    pub fn review_text(&self) -> String {
        self.reviews
            .iter()
            .map(|r| r.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Per-user markers on a shop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopFlags {
    pub bookmarked: bool,
    pub visited: bool,
    pub favorite: bool,
}

/// A search hit shaped for display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShopRecord {
    pub id: String,
    pub name: String,
    pub address: String,
    pub location: Option<GeoPoint>,
    /// Meters from the search origin
    pub distance_m: Option<f64>,
    pub rating: Option<f32>,
    pub user_ratings_total: Option<u32>,
    pub open_now: Option<bool>,
    /// Provider categories
    #[serde(default)]
    pub categories: Vec<String>,
    pub confidence: f64,
    pub flags: ShopFlags,
}

impl ShopRecord {
    pub fn from_scored(scored: &ScoredCandidate, origin: GeoPoint, flags: ShopFlags) -> Self {
        let candidate = &scored.candidate;
        Self {
            id: candidate.id.clone(),
            name: candidate.name.clone(),
            address: candidate.vicinity.clone(),
            location: candidate.location,
            distance_m: candidate.location.map(|loc| origin.distance_to(&loc)),
            rating: candidate.rating,
            user_ratings_total: candidate.user_ratings_total,
            open_now: candidate.open_now,
            categories: candidate.category_tags.iter().cloned().collect(),
            confidence: scored.confidence,
            flags,
        }
    }

    /// Case-insensitive match of `term` against the name, address and
    /// categories. A blank term matches everything.
    pub fn mentions(&self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return true;
        }
        std::iter::once(&self.name)
            .chain(std::iter::once(&self.address))
            .chain(self.categories.iter())
            .any(|text| text.to_lowercase().contains(&term))
    }
}

/// Soup styles offered as search filters
pub const SOUP_TYPES: [&str; 11] = [
    "醤油", "豚骨", "家系", "味噌", "担々麺", "鶏白湯", "煮干", "昆布水", "貝出汁", "鴨出汁", "二郎",
];

/// Display ordering for shop lists
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Distance,
    Rating,
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "distance" => Ok(Self::Distance),
            "rating" => Ok(Self::Rating),
            other => Err(format!("unknown sort key: {}", other)),
        }
    }
}

/// Stable sort; shops missing the sort field go last
pub fn sort_shops(shops: &mut [ShopRecord], key: SortKey) {
    match key {
        SortKey::Distance => shops.sort_by(|a, b| match (a.distance_m, b.distance_m) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        }),
        SortKey::Rating => shops.sort_by(|a, b| match (a.rating, b.rating) {
            (Some(x), Some(y)) => y.total_cmp(&x),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        }),
    }
}

/// Lookup timing information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timing {
    /// Keyword variant the lookup ran with
    pub keyword: String,
    /// Response time in milliseconds
    pub time_ms: u64,
    /// Number of candidates returned
    pub result_count: usize,
}

/// Why a lookup contributed nothing
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LookupFailureKind {
    Timeout,
    NetworkError,
    HttpError(u16),
    ParseError,
    AccessDenied,
    TooManyRequests,
    ApiError,
}

impl std::fmt::Display for LookupFailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout => write!(f, "Lookup timed out"),
            Self::NetworkError => write!(f, "Network error"),
            Self::HttpError(code) => write!(f, "HTTP error: {}", code),
            Self::ParseError => write!(f, "Failed to parse response"),
            Self::AccessDenied => write!(f, "Access denied"),
            Self::TooManyRequests => write!(f, "Too many requests"),
            Self::ApiError => write!(f, "Provider error"),
        }
    }
}

/// A lookup that failed or timed out
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedLookup {
    pub keyword: String,
    pub kind: LookupFailureKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shop(id: &str, distance: Option<f64>, rating: Option<f32>) -> ShopRecord {
        ShopRecord {
            id: id.to_string(),
            name: id.to_string(),
            address: String::new(),
            location: None,
            distance_m: distance,
            rating,
            user_ratings_total: None,
            open_now: None,
            categories: Vec::new(),
            confidence: 1.0,
            flags: ShopFlags::default(),
        }
    }

    #[test]
    fn test_distance() {
        let tokyo = GeoPoint::new(35.681236, 139.767125);
        let yurakucho = GeoPoint::new(35.675069, 139.763328);
        let d = tokyo.distance_to(&yurakucho);
        assert!((700.0..800.0).contains(&d), "got {}", d);
        assert_eq!(tokyo.distance_to(&tokyo), 0.0);
    }

    #[test]
    fn test_point_validity() {
        assert!(GeoPoint::new(35.0, 139.0).is_valid());
        assert!(!GeoPoint::new(91.0, 0.0).is_valid());
        assert!(!GeoPoint::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn test_merge_keeps_first_identity() {
        let mut first = PlaceCandidate::new("p1", "Menya A", "Chiyoda").with_tags(["restaurant"]);
        let later = PlaceCandidate::new("p1", "Other name", "Elsewhere")
            .with_tags(["bar"])
            .with_rating(4.2);

        first.merge(&later);
        assert_eq!(first.name, "Menya A");
        assert_eq!(first.category_tags.len(), 1);
        assert_eq!(first.rating, Some(4.2));
    }

    #[test]
    fn test_sort_by_distance_then_rating() {
        let mut shops = vec![
            shop("far", Some(900.0), Some(3.0)),
            shop("unknown", None, Some(4.9)),
            shop("near", Some(100.0), None),
        ];

        sort_shops(&mut shops, SortKey::Distance);
        let ids: Vec<_> = shops.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["near", "far", "unknown"]);

        sort_shops(&mut shops, SortKey::Rating);
        let ids: Vec<_> = shops.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["unknown", "far", "near"]);
    }

    #[test]
    fn test_mentions() {
        let mut record = shop("p1", None, None);
        record.name = "Menya 豚骨 Ichiban".to_string();
        record.address = "Hakata".to_string();
        record.categories = vec!["restaurant".to_string()];

        assert!(record.mentions("豚骨"));
        assert!(record.mentions("ICHIBAN"));
        assert!(record.mentions("hakata"));
        assert!(record.mentions("Restaurant"));
        assert!(record.mentions("  "));
        assert!(!record.mentions("味噌"));
    }

    #[test]
    fn test_sort_key_parse() {
        assert_eq!("Rating".parse::<SortKey>(), Ok(SortKey::Rating));
        assert!("stars".parse::<SortKey>().is_err());
    }

    #[test]
    fn test_scored_serializes_flat() {
        let scored = ScoredCandidate {
            candidate: PlaceCandidate::new("p1", "Menya", "Shibuya"),
            confidence: 0.5,
            is_accepted: true,
        };
        let value = serde_json::to_value(&scored).unwrap();
        assert_eq!(value["id"], "p1");
        assert_eq!(value["confidence"], 0.5);
        let back: ScoredCandidate = serde_json::from_value(value).unwrap();
        assert_eq!(back, scored);
    }
}
