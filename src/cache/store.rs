//! TTL + LRU cache store over a pluggable medium

use super::clock::{Clock, SystemClock};
use super::entry::CacheEntry;
use super::medium::{CacheMedium, MediumError, MemoryMedium};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Capacity ceilings of a store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheLimits {
    /// Maximum number of live entries
    pub max_entries: usize,
    /// Maximum summed `size_bytes` of live entries
    pub max_bytes: u64,
    /// Once eviction starts, remove at least this many entries
    pub min_eviction_batch: usize,
}

impl Default for CacheLimits {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            max_bytes: 5 * 1024 * 1024,
            min_eviction_batch: 1,
        }
    }
}

impl CacheLimits {
    fn normalized(self) -> Self {
        Self {
            max_entries: self.max_entries.max(1),
            max_bytes: self.max_bytes.max(1),
            min_eviction_batch: self.min_eviction_batch.max(1),
        }
    }
}

/// Aggregate view of a store
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CacheStats {
    pub entry_count: usize,
    pub total_bytes: u64,
    /// Expired but not yet purged
    pub expired_count: usize,
    pub average_access_count: f64,
    pub oldest_created_at: Option<i64>,
    pub newest_created_at: Option<i64>,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub max_entries: usize,
    pub max_bytes: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
struct Index {
    entries: HashMap<String, CacheEntry>,
    total_bytes: u64,
    next_seq: u64,
}

impl Index {
    fn insert(&mut self, entry: CacheEntry) {
        self.total_bytes += entry.size_bytes;
        self.next_seq = self.next_seq.max(entry.seq + 1);
        if let Some(old) = self.entries.insert(entry.key.clone(), entry) {
            self.total_bytes -= old.size_bytes;
        }
    }

    fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        self.total_bytes -= entry.size_bytes;
        Some(entry)
    }

    fn expired_keys(&self, now_ms: i64) -> Vec<String> {
        self.entries
            .values()
            .filter(|e| e.is_expired(now_ms))
            .map(|e| e.key.clone())
            .collect()
    }

    /// Keys from least to most recently used
    fn lru_order(&self) -> Vec<String> {
        let mut ranked: Vec<_> = self
            .entries
            .values()
            .map(|e| (e.lru_rank(), e.key.clone()))
            .collect();
        ranked.sort();
        ranked.into_iter().map(|(_, key)| key).collect()
    }
}

/// Key/value cache with per-entry TTL and approximate LRU eviction
///
/// Values are stored as JSON. Every mutation is written through to the
/// medium; the in-memory index is authoritative for capacity and
/// recency. Storage failures never reach callers.
pub struct CacheStore {
    name: String,
    medium: Arc<dyn CacheMedium>,
    clock: Arc<dyn Clock>,
    limits: CacheLimits,
    index: Mutex<Index>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl CacheStore {
    /// Open a store, loading whatever the medium already holds
    pub async fn open(
        name: impl Into<String>,
        medium: Arc<dyn CacheMedium>,
        limits: CacheLimits,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, MediumError> {
        let store = Self::with_parts(name.into(), medium, limits, clock);
        store.load().await?;
        Ok(store)
    }

    /// Empty in-process store on the wall clock
    pub fn in_memory(name: impl Into<String>, limits: CacheLimits) -> Self {
        Self::with_parts(
            name.into(),
            Arc::new(MemoryMedium::new()),
            limits,
            Arc::new(SystemClock),
        )
    }

    fn with_parts(
        name: String,
        medium: Arc<dyn CacheMedium>,
        limits: CacheLimits,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            name,
            medium,
            clock,
            limits: limits.normalized(),
            index: Mutex::new(Index::default()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn limits(&self) -> CacheLimits {
        self.limits
    }

    async fn load(&self) -> Result<(), MediumError> {
        let mut index = self.index.lock().await;
        for key in self.medium.keys().await? {
            let Some(bytes) = self.medium.read(&key).await? else {
                continue;
            };
            match serde_json::from_slice::<CacheEntry>(&bytes) {
                Ok(mut entry) => {
                    entry.key = key;
                    index.insert(entry);
                }
                Err(e) => {
                    warn!(cache = %self.name, "Dropping corrupt record {}: {}", key, e);
                    self.delete_quietly(&key).await;
                }
            }
        }

        // Limits may have shrunk since the records were written
        let evicted = self.make_room(&mut index, 0, true);
        for key in &evicted {
            self.delete_quietly(key).await;
        }

        info!(
            cache = %self.name,
            "Loaded {} entries ({} bytes)",
            index.entries.len(),
            index.total_bytes
        );
        Ok(())
    }

    /// Look up a live value. Expired entries are removed on the way.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let now = self.clock.now_ms();
        let mut index = self.index.lock().await;

        let expired = match index.entries.get(key) {
            Some(entry) => entry.is_expired(now),
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };

        if expired {
            index.remove(key);
            self.delete_quietly(key).await;
            self.misses.fetch_add(1, Ordering::Relaxed);
            debug!(cache = %self.name, "Expired entry {}", key);
            return None;
        }

        let entry = index.entries.get_mut(key)?;
        let value = match serde_json::from_value::<T>(entry.data.clone()) {
            Ok(value) => value,
            Err(e) => {
                warn!(cache = %self.name, "Entry {} has unexpected shape: {}", key, e);
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };

        entry.touch(now);
        let snapshot = entry.clone();
        self.hits.fetch_add(1, Ordering::Relaxed);

        if let Err(e) = self.write_entry(&snapshot).await {
            warn!(cache = %self.name, "Failed to persist access for {}: {}", key, e);
        }

        Some(value)
    }

    /// Store a value for `ttl`, evicting least recently used entries
    /// when a ceiling would be crossed. Never fails; dropped writes are
    /// logged.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Duration) {
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        if ttl_ms <= 0 {
            debug!(cache = %self.name, "Ignoring zero-TTL write for {}", key);
            return;
        }

        let data = match serde_json::to_value(value) {
            Ok(data) => data,
            Err(e) => {
                error!(cache = %self.name, "Cannot serialize value for {}: {}", key, e);
                return;
            }
        };

        let now = self.clock.now_ms();
        let mut index = self.index.lock().await;
        let seq = index.next_seq;
        let entry = CacheEntry::new(key.to_string(), data, now, ttl_ms, seq);

        if entry.size_bytes > self.limits.max_bytes {
            warn!(
                cache = %self.name,
                "Entry {} is {} bytes, above the {} byte ceiling; not cached",
                key,
                entry.size_bytes,
                self.limits.max_bytes
            );
            return;
        }

        index.remove(key);
        let evicted = self.make_room(&mut index, entry.size_bytes, false);
        for evicted_key in &evicted {
            self.delete_quietly(evicted_key).await;
        }

        match self.write_entry(&entry).await {
            Ok(()) => index.insert(entry),
            Err(e) => {
                warn!(cache = %self.name, "Write of {} failed ({}), evicting and retrying", key, e);
                self.relieve_pressure(&mut index, now).await;

                match self.write_entry(&entry).await {
                    Ok(()) => index.insert(entry),
                    Err(e) => {
                        error!(cache = %self.name, "Dropping write of {} after retry: {}", key, e);
                        self.delete_quietly(key).await;
                    }
                }
            }
        }
    }

    /// Delete an entry; missing keys are fine
    pub async fn remove(&self, key: &str) {
        let mut index = self.index.lock().await;
        index.remove(key);
        self.delete_quietly(key).await;
    }

    /// Purge every expired entry, returning how many went
    pub async fn clear_expired(&self) -> usize {
        let now = self.clock.now_ms();
        let mut index = self.index.lock().await;
        let removed = self.purge_expired(&mut index, now).await;
        if removed > 0 {
            debug!(cache = %self.name, "Purged {} expired entries", removed);
        }
        removed
    }

    /// Drop everything regardless of expiry
    pub async fn clear_all(&self) {
        let mut index = self.index.lock().await;
        let keys: Vec<String> = index.entries.keys().cloned().collect();
        for key in &keys {
            index.remove(key);
            self.delete_quietly(key).await;
        }
        info!(cache = %self.name, "Cleared {} entries", keys.len());
    }

    /// Whether a live entry is held, without counting a read
    pub async fn contains(&self, key: &str) -> bool {
        let now = self.clock.now_ms();
        self.index
            .lock()
            .await
            .entries
            .get(key)
            .is_some_and(|e| !e.is_expired(now))
    }

    pub async fn len(&self) -> usize {
        self.index.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn stats(&self) -> CacheStats {
        let now = self.clock.now_ms();
        let index = self.index.lock().await;
        let entries = index.entries.values();

        let entry_count = index.entries.len();
        let total_access: u64 = entries.clone().map(|e| e.access_count).sum();

        CacheStats {
            entry_count,
            total_bytes: index.total_bytes,
            expired_count: entries.clone().filter(|e| e.is_expired(now)).count(),
            average_access_count: if entry_count == 0 {
                0.0
            } else {
                total_access as f64 / entry_count as f64
            },
            oldest_created_at: entries.clone().map(|e| e.created_at).min(),
            newest_created_at: entries.map(|e| e.created_at).max(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            max_entries: self.limits.max_entries,
            max_bytes: self.limits.max_bytes,
        }
    }

    /// Evict in LRU order until an entry of `incoming` bytes fits.
    /// Returns the evicted keys; the caller deletes them from the medium.
    fn make_room(&self, index: &mut Index, incoming: u64, existing_only: bool) -> Vec<String> {
        let slots = if existing_only { 0 } else { 1 };
        let over = |index: &Index| {
            index.entries.len() + slots > self.limits.max_entries
                || index.total_bytes + incoming > self.limits.max_bytes
        };

        if !over(index) {
            return Vec::new();
        }

        let mut evicted = Vec::new();
        for key in index.lru_order() {
            if !over(index) && evicted.len() >= self.limits.min_eviction_batch {
                break;
            }
            index.remove(&key);
            evicted.push(key);
        }

        self.evictions
            .fetch_add(evicted.len() as u64, Ordering::Relaxed);
        debug!(cache = %self.name, "Evicted {} entries", evicted.len());
        evicted
    }

    /// One round of cleanup after the medium refused a write
    async fn relieve_pressure(&self, index: &mut Index, now_ms: i64) {
        self.purge_expired(index, now_ms).await;

        let batch: Vec<String> = index
            .lru_order()
            .into_iter()
            .take(self.limits.min_eviction_batch)
            .collect();
        for key in &batch {
            index.remove(key);
            self.delete_quietly(key).await;
        }
        self.evictions
            .fetch_add(batch.len() as u64, Ordering::Relaxed);
    }

    async fn purge_expired(&self, index: &mut Index, now_ms: i64) -> usize {
        let expired = index.expired_keys(now_ms);
        for key in &expired {
            index.remove(key);
            self.delete_quietly(key).await;
        }
        expired.len()
    }

    async fn write_entry(&self, entry: &CacheEntry) -> Result<(), MediumError> {
        let bytes = serde_json::to_vec(entry).map_err(|_| MediumError::Corrupt(entry.key.clone()))?;
        self.medium.write(&entry.key, bytes).await
    }

    async fn delete_quietly(&self, key: &str) {
        if let Err(e) = self.medium.delete(key).await {
            warn!(cache = %self.name, "Failed to delete {} from storage: {}", key, e);
        }
    }
}
