//! Place lookup sources
//!
//! Defines the [`LookupSource`] trait the search orchestrator fans out
//! over, and the Google Places implementation.

mod google;

pub use google::GooglePlaces;

use crate::results::{GeoPoint, LookupFailureKind, PlaceCandidate, PlaceDetails};
use async_trait::async_trait;
use thiserror::Error;

/// Failure of a single lookup
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("lookup timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("HTTP status {0}")]
    Http(u16),
    #[error("could not parse provider response: {0}")]
    Parse(String),
    #[error("provider rate limit reached")]
    RateLimited,
    #[error("provider denied the request: {0}")]
    AccessDenied(String),
    #[error("provider error {status}: {message}")]
    Api { status: String, message: String },
    #[error("place not found: {0}")]
    NotFound(String),
    #[error("no API key configured for {0}")]
    MissingApiKey(&'static str),
}

impl LookupError {
    /// Coarse classification for result reporting
    pub fn kind(&self) -> LookupFailureKind {
        match self {
            Self::Timeout => LookupFailureKind::Timeout,
            Self::Network(e) if e.is_timeout() => LookupFailureKind::Timeout,
            Self::Network(_) => LookupFailureKind::NetworkError,
            Self::Http(code) => LookupFailureKind::HttpError(*code),
            Self::Parse(_) => LookupFailureKind::ParseError,
            Self::RateLimited => LookupFailureKind::TooManyRequests,
            Self::AccessDenied(_) | Self::MissingApiKey(_) => LookupFailureKind::AccessDenied,
            Self::Api { .. } | Self::NotFound(_) => LookupFailureKind::ApiError,
        }
    }
}

/// An external source of places
#[async_trait]
pub trait LookupSource: Send + Sync {
    /// Source name for logs and metrics
    fn name(&self) -> &str;

    /// Places around `location` matching `keyword`
    async fn search(
        &self,
        location: GeoPoint,
        radius_m: u32,
        keyword: &str,
    ) -> Result<Vec<PlaceCandidate>, LookupError>;

    /// Full record for one place
    async fn details(&self, id: &str) -> Result<PlaceDetails, LookupError>;
}
