//! Cache entry record

use serde::{Deserialize, Serialize};

/// A stored value with its expiry and access bookkeeping
///
/// All timestamps are epoch milliseconds. `seq` orders entries by
/// insertion and breaks ties between equal `last_accessed_at` values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheEntry {
    pub key: String,
    pub data: serde_json::Value,
    pub created_at: i64,
    pub expires_at: i64,
    pub access_count: u64,
    pub last_accessed_at: i64,
    pub size_bytes: u64,
    #[serde(default)]
    pub seq: u64,
}

impl CacheEntry {
    /// Build a fresh entry. `ttl_ms` must be positive.
    pub fn new(key: String, data: serde_json::Value, now_ms: i64, ttl_ms: i64, seq: u64) -> Self {
        let size_bytes = (key.len() + serde_json::to_vec(&data).map(|v| v.len()).unwrap_or(0)) as u64;
        Self {
            key,
            data,
            created_at: now_ms,
            expires_at: now_ms.saturating_add(ttl_ms.max(1)),
            access_count: 0,
            last_accessed_at: now_ms,
            size_bytes,
            seq,
        }
    }

    /// Expired once `now` reaches the deadline
    pub fn is_expired(&self, now_ms: i64) -> bool {
        now_ms >= self.expires_at
    }

    /// Record a read
    pub fn touch(&mut self, now_ms: i64) {
        self.access_count += 1;
        self.last_accessed_at = now_ms;
    }

    /// LRU ordering key
    pub(crate) fn lru_rank(&self) -> (i64, u64) {
        (self.last_accessed_at, self.seq)
    }
}
