//! Caching module for Ramen Compass
//!
//! A TTL + LRU key/value store persisted through a pluggable medium.
//! Search results, place details, AI summaries and the user's shop
//! library each get their own store instance.

mod clock;
mod entry;
mod medium;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::CacheEntry;
pub use medium::{CacheMedium, FileMedium, MediumError, MemoryMedium};
pub use store::{CacheLimits, CacheStats, CacheStore};

use crate::results::GeoPoint;

/// Generate a cache key for a location-bound query
///
/// Coordinates are rounded to `precision` decimals so nearby searches
/// share an entry; the query is trimmed and lowercased.
pub fn location_key(prefix: &str, point: GeoPoint, precision: u32, query: &str) -> String {
    let precision = precision.min(10);
    format!(
        "{}:{:.*}:{:.*}:{}",
        prefix,
        precision as usize,
        quantize(point.lat, precision),
        precision as usize,
        quantize(point.lng, precision),
        query.trim().to_lowercase()
    )
}

fn quantize(value: f64, precision: u32) -> f64 {
    let factor = 10f64.powi(precision as i32);
    let rounded = (value * factor).round() / factor;
    // -0.0 would print as "-0.000"
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_key_quantizes() {
        let a = location_key("places", GeoPoint::new(35.68123, 139.76712), 3, "Tonkotsu ");
        let b = location_key("places", GeoPoint::new(35.68149, 139.76698), 3, "tonkotsu");
        assert_eq!(a, "places:35.681:139.767:tonkotsu");
        assert_eq!(a, b);
    }

    #[test]
    fn test_location_key_negative_zero() {
        let key = location_key("places", GeoPoint::new(-0.0001, 0.0), 3, "");
        assert_eq!(key, "places:0.000:0.000:");
    }

    #[test]
    fn test_location_key_distinguishes_cells() {
        let a = location_key("places", GeoPoint::new(35.681, 139.767), 3, "");
        let b = location_key("places", GeoPoint::new(35.682, 139.767), 3, "");
        assert_ne!(a, b);
    }
}
