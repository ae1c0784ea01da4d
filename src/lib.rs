//! Ramen Compass: nearby ramen shop discovery
//!
//! Place lookups fan out over several keyword variants, get merged and
//! scored for relevance, and land in a TTL/LRU cache. A personal library
//! keeps favorites, bookmarks, visits and shop posts on top of the same
//! cache, and a feedback inbox collects reports from users.

pub mod cache;
pub mod config;
pub mod evaluator;
pub mod feedback;
pub mod library;
pub mod metrics;
pub mod network;
pub mod places;
pub mod results;
pub mod search;
pub mod summary;
pub mod web;

pub use cache::CacheStore;
pub use config::Settings;
pub use evaluator::{Evaluator, RuleSet};
pub use places::LookupSource;
pub use results::{PlaceCandidate, ScoredCandidate, ShopRecord};
pub use search::{Search, SearchError, SearchOutcome};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default timeout for a single place lookup in seconds
pub const DEFAULT_TIMEOUT: u64 = 5;

/// Maximum timeout that can be set
pub const MAX_TIMEOUT: u64 = 30;
