//! Settings structures for Ramen Compass configuration

use crate::cache::CacheLimits;
use crate::evaluator::RuleSet;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main settings structure matching settings.yml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub server: ServerSettings,
    pub outgoing: OutgoingSettings,
    pub cache: CacheSettings,
    pub search: SearchSettings,
    pub places: PlacesSettings,
    pub summarizer: SummarizerSettings,
    pub library: LibrarySettings,
    pub feedback: FeedbackSettings,
}

impl Settings {
    /// Load settings from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: Settings = serde_yaml::from_str(&content)?;
        Ok(settings)
    }

    /// Merge with environment variables (RAMEN_* prefix)
    pub fn merge_env(&mut self) {
        self.merge_vars(|name| std::env::var(name).ok());
    }

    fn merge_vars(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(val) = var("RAMEN_PORT") {
            if let Ok(port) = val.parse() {
                self.server.port = port;
            }
        }
        if let Some(val) = var("RAMEN_BIND_ADDRESS") {
            self.server.bind_address = val;
        }
        if let Some(val) = var("RAMEN_PLACES_API_KEY") {
            self.places.api_key = Some(val);
        }
        if let Some(val) = var("RAMEN_GEMINI_API_KEY") {
            self.summarizer.api_key = Some(val);
        }
        if let Some(val) = var("RAMEN_CACHE_DIR") {
            self.cache.directory = Some(PathBuf::from(val));
        }
    }
}

/// General settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Instance name reported by the API
    pub instance_name: String,
    /// Enable metrics collection
    pub enable_metrics: bool,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            instance_name: "Ramen Compass".to_string(),
            enable_metrics: true,
        }
    }
}

/// Server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Server port
    pub port: u16,
    /// Bind address
    pub bind_address: String,
    /// Gzip responses
    pub compression: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            port: 8080,
            bind_address: "127.0.0.1".to_string(),
            compression: true,
        }
    }
}

/// Outgoing request settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutgoingSettings {
    /// Default request timeout in seconds
    pub request_timeout: f64,
    /// Pool max size
    pub pool_maxsize: usize,
    /// Verify SSL certificates
    pub verify_ssl: bool,
    /// Proxy settings
    pub proxies: ProxySettings,
    /// Extra headers to send
    pub extra_headers: HashMap<String, String>,
}

impl Default for OutgoingSettings {
    fn default() -> Self {
        Self {
            request_timeout: 10.0,
            pool_maxsize: 20,
            verify_ssl: true,
            proxies: ProxySettings::default(),
            extra_headers: HashMap::new(),
        }
    }
}

/// Proxy settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxySettings {
    pub http: Option<String>,
    pub https: Option<String>,
    pub all: Option<String>,
}

/// Cache storage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Directory for file-backed stores; in-memory when unset
    pub directory: Option<PathBuf>,
    /// Byte quota per store directory
    pub quota_bytes: Option<u64>,
    /// Limits of the place results/details store
    pub places: CacheLimits,
    /// Limits of the AI summary store
    pub summaries: CacheLimits,
    /// Limits of the feedback store; screenshots make records large
    pub feedback: CacheLimits,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            directory: None,
            quota_bytes: None,
            places: CacheLimits::default(),
            summaries: CacheLimits {
                max_entries: 500,
                max_bytes: 2 * 1024 * 1024,
                min_eviction_batch: 1,
            },
            feedback: CacheLimits {
                max_entries: 1000,
                max_bytes: 64 * 1024 * 1024,
                min_eviction_batch: 1,
            },
        }
    }
}

/// Search behavior settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Synonyms looked up concurrently for every search
    pub keyword_variants: Vec<String>,
    /// Lookup radius in meters
    pub radius_m: u32,
    /// Decimal places kept when keying the cache by location
    pub location_precision: u32,
    /// Per-lookup timeout in seconds
    pub lookup_timeout: f64,
    /// Upper bound for any lookup timeout
    pub max_lookup_timeout: f64,
    /// Lifetime of cached search results in seconds
    pub result_ttl: u64,
    /// Lifetime of cached place details in seconds
    pub details_ttl: u64,
    /// Relevance rules; the built-in ramen table when unset
    pub rules: Option<RuleSet>,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            keyword_variants: vec![
                "ラーメン".to_string(),
                "ramen".to_string(),
                "つけ麺".to_string(),
                "中華そば".to_string(),
            ],
            radius_m: 1500,
            location_precision: 3,
            lookup_timeout: crate::DEFAULT_TIMEOUT as f64,
            max_lookup_timeout: crate::MAX_TIMEOUT as f64,
            result_ttl: 300,
            details_ttl: 3600,
            rules: None,
        }
    }
}

impl SearchSettings {
    /// Per-lookup timeout, clamped to `[0.1, max_lookup_timeout]`.
    /// Non-finite values fall back to the defaults.
    pub fn lookup_timeout(&self) -> Duration {
        let finite_or = |value: f64, default: u64| {
            if value.is_finite() {
                value
            } else {
                default as f64
            }
        };
        let max = finite_or(self.max_lookup_timeout, crate::MAX_TIMEOUT).max(0.1);
        let secs = finite_or(self.lookup_timeout, crate::DEFAULT_TIMEOUT).clamp(0.1, max);
        Duration::from_secs_f64(secs)
    }

    pub fn result_ttl(&self) -> Duration {
        Duration::from_secs(self.result_ttl)
    }

    pub fn details_ttl(&self) -> Duration {
        Duration::from_secs(self.details_ttl)
    }

    pub fn rules(&self) -> RuleSet {
        self.rules.clone().unwrap_or_default()
    }
}

/// Places provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacesSettings {
    pub api_key: Option<String>,
    /// Base of the Places web service
    pub base_url: String,
    /// Response language
    pub language: String,
}

impl Default for PlacesSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://maps.googleapis.com/maps/api/place".to_string(),
            language: "ja".to_string(),
        }
    }
}

/// Generative summarizer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizerSettings {
    /// Canned summaries are served when unset
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    /// Lifetime of cached tags and summaries in seconds
    pub ttl: u64,
}

impl Default for SummarizerSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            model: "gemini-2.5-flash".to_string(),
            ttl: 24 * 60 * 60,
        }
    }
}

impl SummarizerSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl)
    }
}

/// Personal shop library settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibrarySettings {
    /// Lifetime of stored user data in days
    pub retention_days: u64,
    /// Visit records kept
    pub max_visits: usize,
}

impl Default for LibrarySettings {
    fn default() -> Self {
        Self {
            retention_days: 365,
            max_visits: 100,
        }
    }
}

impl LibrarySettings {
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_days.saturating_mul(24 * 60 * 60))
    }
}

/// Feedback intake settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackSettings {
    /// Days a submission is kept
    pub retention_days: u64,
    /// Largest accepted screenshot, in bytes of its data URL
    pub max_screenshot_bytes: usize,
}

impl Default for FeedbackSettings {
    fn default() -> Self {
        Self {
            retention_days: 180,
            max_screenshot_bytes: 5 * 1024 * 1024,
        }
    }
}

impl FeedbackSettings {
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_days.saturating_mul(24 * 60 * 60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.server.port, 8080);
        assert!(settings.general.enable_metrics);
        assert_eq!(settings.search.location_precision, 3);
        assert_eq!(settings.cache.places.max_entries, 1000);
        assert!(!settings.search.keyword_variants.is_empty());
    }

    #[test]
    fn test_partial_yaml() {
        let yaml = r#"
server:
  port: 9000
search:
  keyword_variants: [ramen, tsukemen]
  result_ttl: 60
cache:
  places:
    max_entries: 50
"#;
        let settings: Settings = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(settings.server.port, 9000);
        assert_eq!(settings.server.bind_address, "127.0.0.1");
        assert_eq!(settings.search.keyword_variants, vec!["ramen", "tsukemen"]);
        assert_eq!(settings.search.result_ttl(), Duration::from_secs(60));
        assert_eq!(settings.cache.places.max_entries, 50);
        assert_eq!(settings.cache.places.min_eviction_batch, 1);
    }

    #[test]
    fn test_env_overrides() {
        let mut settings = Settings::default();
        settings.merge_vars(|name| match name {
            "RAMEN_PORT" => Some("3000".to_string()),
            "RAMEN_PLACES_API_KEY" => Some("key".to_string()),
            "RAMEN_CACHE_DIR" => Some("/tmp/ramen".to_string()),
            _ => None,
        });
        assert_eq!(settings.server.port, 3000);
        assert_eq!(settings.places.api_key.as_deref(), Some("key"));
        assert_eq!(settings.cache.directory, Some(PathBuf::from("/tmp/ramen")));
    }

    #[test]
    fn test_lookup_timeout_clamped() {
        let search = SearchSettings {
            lookup_timeout: 120.0,
            ..Default::default()
        };
        assert_eq!(search.lookup_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_non_finite_lookup_timeout_uses_default() {
        let settings: Settings = serde_yaml::from_str("search:\n  lookup_timeout: .nan\n").unwrap();
        assert_eq!(settings.search.lookup_timeout(), Duration::from_secs(crate::DEFAULT_TIMEOUT));

        let search = SearchSettings {
            lookup_timeout: 2.0,
            max_lookup_timeout: f64::INFINITY,
            ..Default::default()
        };
        assert_eq!(search.lookup_timeout(), Duration::from_secs(2));
    }

    #[test]
    fn test_retention_saturates() {
        let library = LibrarySettings {
            retention_days: u64::MAX,
            ..Default::default()
        };
        assert_eq!(library.retention(), Duration::from_secs(u64::MAX));
    }
}
