//! Storage media backing a cache store

use async_trait::async_trait;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::Mutex;

/// Failure reported by a cache medium
#[derive(Debug, Error)]
pub enum MediumError {
    #[error("storage quota exceeded: need {needed} bytes, {available} available")]
    QuotaExceeded { needed: u64, available: u64 },
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt record for key {0}")]
    Corrupt(String),
}

/// Durable key/value storage used by [`super::CacheStore`]
#[async_trait]
pub trait CacheMedium: Send + Sync {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, MediumError>;

    async fn write(&self, key: &str, bytes: Vec<u8>) -> Result<(), MediumError>;

    /// Deleting a missing key is not an error
    async fn delete(&self, key: &str) -> Result<(), MediumError>;

    async fn keys(&self) -> Result<Vec<String>, MediumError>;
}

/// Byte accounting shared by the media with an optional quota
#[derive(Debug, Default)]
struct Usage {
    sizes: HashMap<String, u64>,
    total: u64,
}

impl Usage {
    fn check(&self, key: &str, len: u64, quota: Option<u64>) -> Result<(), MediumError> {
        let Some(quota) = quota else {
            return Ok(());
        };
        let current = self.sizes.get(key).copied().unwrap_or(0);
        let after = self.total - current + len;
        if after > quota {
            return Err(MediumError::QuotaExceeded {
                needed: len,
                available: quota.saturating_sub(self.total - current),
            });
        }
        Ok(())
    }

    fn record(&mut self, key: &str, len: u64) {
        let previous = self.sizes.insert(key.to_string(), len).unwrap_or(0);
        self.total = self.total - previous + len;
    }

    fn forget(&mut self, key: &str) {
        if let Some(previous) = self.sizes.remove(key) {
            self.total -= previous;
        }
    }
}

/// In-process medium, optionally bounded like a browser storage quota
#[derive(Debug, Default)]
pub struct MemoryMedium {
    inner: Mutex<(HashMap<String, Vec<u8>>, Usage)>,
    quota: Option<u64>,
}

impl MemoryMedium {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota_bytes: u64) -> Self {
        Self {
            inner: Mutex::default(),
            quota: Some(quota_bytes),
        }
    }

    /// Bytes currently stored
    pub async fn used_bytes(&self) -> u64 {
        self.inner.lock().await.1.total
    }
}

#[async_trait]
impl CacheMedium for MemoryMedium {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, MediumError> {
        Ok(self.inner.lock().await.0.get(key).cloned())
    }

    async fn write(&self, key: &str, bytes: Vec<u8>) -> Result<(), MediumError> {
        let mut guard = self.inner.lock().await;
        let (records, usage) = &mut *guard;
        usage.check(key, bytes.len() as u64, self.quota)?;
        usage.record(key, bytes.len() as u64);
        records.insert(key.to_string(), bytes);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), MediumError> {
        let mut guard = self.inner.lock().await;
        guard.0.remove(key);
        guard.1.forget(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, MediumError> {
        Ok(self.inner.lock().await.0.keys().cloned().collect())
    }
}

/// One JSON file per key inside a directory
pub struct FileMedium {
    dir: PathBuf,
    quota: Option<u64>,
    usage: Mutex<Usage>,
}

impl FileMedium {
    const EXTENSION: &'static str = "json";

    /// Open (and create) the directory, measuring what is already there
    pub async fn open(dir: impl AsRef<Path>, quota: Option<u64>) -> Result<Self, MediumError> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;

        let mut usage = Usage::default();
        let mut listing = tokio::fs::read_dir(&dir).await?;
        while let Some(item) = listing.next_entry().await? {
            let path = item.path();
            if let Some(key) = Self::key_for(&path) {
                let len = item.metadata().await?.len();
                usage.record(&key, len);
            }
        }

        Ok(Self {
            dir,
            quota,
            usage: Mutex::new(usage),
        })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", urlencoding::encode(key), Self::EXTENSION))
    }

    fn key_for(path: &Path) -> Option<String> {
        if path.extension()?.to_str()? != Self::EXTENSION {
            return None;
        }
        let stem = path.file_stem()?.to_str()?;
        urlencoding::decode(stem).ok().map(|k| k.into_owned())
    }
}

#[async_trait]
impl CacheMedium for FileMedium {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, MediumError> {
        match tokio::fs::read(self.path_for(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, key: &str, bytes: Vec<u8>) -> Result<(), MediumError> {
        let mut usage = self.usage.lock().await;
        let len = bytes.len() as u64;
        usage.check(key, len, self.quota)?;
        tokio::fs::write(self.path_for(key), bytes).await?;
        usage.record(key, len);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), MediumError> {
        let mut usage = self.usage.lock().await;
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        usage.forget(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, MediumError> {
        let mut keys = Vec::new();
        let mut listing = tokio::fs::read_dir(&self.dir).await?;
        while let Some(item) = listing.next_entry().await? {
            if let Some(key) = Self::key_for(&item.path()) {
                keys.push(key);
            }
        }
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_medium_quota() {
        let medium = MemoryMedium::with_quota(10);
        medium.write("a", vec![0; 6]).await.unwrap();

        let err = medium.write("b", vec![0; 6]).await.unwrap_err();
        assert!(matches!(err, MediumError::QuotaExceeded { needed: 6, available: 4 }));

        // Rewriting the same key only counts the difference
        medium.write("a", vec![0; 10]).await.unwrap();
        assert_eq!(medium.used_bytes().await, 10);

        medium.delete("a").await.unwrap();
        medium.write("b", vec![0; 6]).await.unwrap();
        assert_eq!(medium.used_bytes().await, 6);
    }

    #[tokio::test]
    async fn test_memory_medium_delete_missing() {
        let medium = MemoryMedium::new();
        assert!(medium.delete("nothing").await.is_ok());
        assert!(medium.read("nothing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_medium_roundtrip_and_keys() {
        let dir = tempfile::tempdir().unwrap();
        let medium = FileMedium::open(dir.path(), None).await.unwrap();

        medium.write("places:35.681:139.767:tonkotsu", b"{}".to_vec()).await.unwrap();
        medium.write("details/abc", b"[]".to_vec()).await.unwrap();

        let mut keys = medium.keys().await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["details/abc", "places:35.681:139.767:tonkotsu"]);
        assert_eq!(medium.read("details/abc").await.unwrap(), Some(b"[]".to_vec()));

        medium.delete("details/abc").await.unwrap();
        assert!(medium.read("details/abc").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_medium_measures_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        {
            let medium = FileMedium::open(dir.path(), None).await.unwrap();
            medium.write("k", vec![b'x'; 8]).await.unwrap();
        }

        let medium = FileMedium::open(dir.path(), Some(10)).await.unwrap();
        let err = medium.write("other", vec![b'y'; 4]).await.unwrap_err();
        assert!(matches!(err, MediumError::QuotaExceeded { .. }));
    }
}
