//! In-process backend for ephemeral sessions and tests.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::{BlobBackend, StorageEstimate};
use crate::{Error, Result};

/// Volatile [`BlobBackend`] backed by a map.
///
/// Supports an optional byte quota so the store's evict-and-retry path behaves
/// the same as on disk.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: Mutex<BTreeMap<String, Vec<u8>>>,
    quota_bytes: Option<u64>,
}

impl MemoryBackend {
    /// Empty backend without a quota.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty backend that rejects writes once `bytes` would be exceeded.
    #[must_use]
    pub fn with_quota(bytes: u64) -> Self {
        Self {
            entries: Mutex::default(),
            quota_bytes: Some(bytes),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, Vec<u8>>>> {
        self.entries
            .lock()
            .map_err(|_| Error::Storage("memory backend lock poisoned".into()))
    }
}

fn usage(entries: &BTreeMap<String, Vec<u8>>) -> u64 {
    entries.values().map(|v| v.len() as u64).sum()
}

#[async_trait]
impl BlobBackend for MemoryBackend {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.lock()?.get(key).cloned())
    }

    async fn write(&self, key: &str, value: &[u8]) -> Result<()> {
        let mut entries = self.lock()?;
        if let Some(quota) = self.quota_bytes {
            let replaced = entries.get(key).map_or(0, |v| v.len() as u64);
            let used = usage(&entries) - replaced;
            let needed = value.len() as u64;
            if used + needed > quota {
                return Err(Error::QuotaExceeded {
                    key: key.to_string(),
                    needed,
                    available: quota.saturating_sub(used),
                });
            }
        }
        entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self.lock()?.keys().cloned().collect())
    }

    async fn estimate(&self) -> Result<Option<StorageEstimate>> {
        let usage = usage(&*self.lock()?);
        Ok(self.quota_bytes.map(|quota| StorageEstimate { usage, quota }))
    }
}
