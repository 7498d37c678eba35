//! Durable page cache with quota-driven eviction.
//!
//! The store is split in two layers:
//!
//! - a [`BlobBackend`] that persists raw bytes under string keys
//!   ([`FsBackend`] on disk, [`MemoryBackend`] for ephemeral use), and
//! - [`BlobStore`], which maps [`PageKey`]/[`PageBlob`] onto the backend and owns
//!   the eviction policy: a write rejected with [`Error::QuotaExceeded`] triggers one
//!   [`BlobStore::evict_fraction`] pass and exactly one retry.
//!
//! There is no in-memory layer; every `get` reads the backend.
//!
//! ## Example
//!
//! ```rust
//! use folio_core::store::{BlobStore, MemoryBackend};
//! use folio_core::{PageBlob, PageKey};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> folio_core::Result<()> {
//! let store = BlobStore::new(MemoryBackend::new());
//! let key = PageKey::from_index(0);
//!
//! store.put(key, &PageBlob::new("image/jpeg", vec![1, 2, 3])).await?;
//! let cached = store.get(key).await?;
//! assert_eq!(cached.map(|blob| blob.into_bytes()), Some(vec![1, 2, 3]));
//! # Ok(())
//! # }
//! ```

mod fs;
mod memory;

use std::collections::BTreeSet;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::types::{PageBlob, PageKey, StoredEntry};
use crate::{Error, Result};

pub use fs::{FsBackend, SCHEMA_VERSION};
pub use memory::MemoryBackend;

/// Fraction of entries removed when a write hits the quota.
pub const DEFAULT_EVICT_FRACTION: f64 = 0.5;

/// Used/total capacity reported by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageEstimate {
    /// Bytes in use.
    pub usage: u64,
    /// Total bytes available to the store.
    pub quota: u64,
}

impl StorageEstimate {
    /// Fraction of the quota in use, in `0.0..=1.0` for sane estimates.
    #[must_use]
    #[allow(clippy::cast_precision_loss)] // Precision loss acceptable for a ratio
    pub fn ratio(&self) -> f64 {
        if self.quota == 0 {
            1.0
        } else {
            self.usage as f64 / self.quota as f64
        }
    }
}

/// Raw key→bytes persistence used by [`BlobStore`].
///
/// Implementations report a full medium as [`Error::QuotaExceeded`] from
/// [`write`](Self::write) so the store can evict and retry; every other failure
/// should be [`Error::Storage`].
#[async_trait]
pub trait BlobBackend: Send + Sync {
    /// Read the bytes stored under `key`; `Ok(None)` when absent.
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>>;
    /// Store `value` under `key`, replacing any previous value atomically.
    async fn write(&self, key: &str, value: &[u8]) -> Result<()>;
    /// Remove `key`. Removing an absent key succeeds.
    async fn remove(&self, key: &str) -> Result<()>;
    /// All keys currently stored, in no particular order.
    async fn keys(&self) -> Result<Vec<String>>;
    /// Current usage, if the medium can report it.
    async fn estimate(&self) -> Result<Option<StorageEstimate>>;
}

/// Persistent page cache keyed by [`PageKey`].
///
/// Shared between the interactive loader and the prefetcher behind an `Arc`.
/// No lock is held across an await: concurrent writes of the same key carry the
/// same content, so the last write wins harmlessly.
pub struct BlobStore {
    backend: Box<dyn BlobBackend>,
    evict_fraction: f64,
}

impl BlobStore {
    /// Wrap a backend with the default quota eviction fraction (0.5).
    #[must_use]
    pub fn new(backend: impl BlobBackend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
            evict_fraction: DEFAULT_EVICT_FRACTION,
        }
    }

    /// Override the fraction evicted when a write hits the quota.
    pub fn with_evict_fraction(mut self, fraction: f64) -> Result<Self> {
        validate_fraction(fraction)?;
        self.evict_fraction = fraction;
        Ok(self)
    }

    /// Read a page. Absence is `Ok(None)`; an unreadable entry is a storage error.
    pub async fn get(&self, key: PageKey) -> Result<Option<PageBlob>> {
        let raw_key = key.to_string();
        let Some(raw) = self.backend.read(&raw_key).await? else {
            debug!(key = %raw_key, "cache miss");
            return Ok(None);
        };

        let entry: StoredEntry = serde_json::from_slice(&raw)
            .map_err(|e| Error::Storage(format!("Failed to parse entry {raw_key}: {e}")))?;
        let blob = entry
            .blob()
            .map_err(|e| Error::Storage(format!("Failed to decode entry {raw_key}: {e}")))?;

        debug!(key = %raw_key, bytes = blob.len(), "cache hit");
        Ok(Some(blob))
    }

    /// Store a page.
    ///
    /// On [`Error::QuotaExceeded`] runs one eviction pass and retries the write once.
    /// If the eviction pass fails the retry is skipped; either failure reaches the
    /// caller as [`Error::Storage`].
    pub async fn put(&self, key: PageKey, blob: &PageBlob) -> Result<()> {
        let raw_key = key.to_string();
        let payload = serde_json::to_vec(&StoredEntry::new(key, blob))?;

        match self.backend.write(&raw_key, &payload).await {
            Ok(()) => {
                debug!(key = %raw_key, bytes = payload.len(), "stored page");
                Ok(())
            },
            Err(quota @ Error::QuotaExceeded { .. }) => {
                warn!(key = %raw_key, "{quota}; evicting before retry");
                self.evict_fraction(self.evict_fraction)
                    .await
                    .map_err(|e| Error::Storage(format!("Eviction after quota failure: {e}")))?;
                self.backend.write(&raw_key, &payload).await.map_err(|e| {
                    Error::Storage(format!("Failed to store {raw_key} after eviction: {e}"))
                })?;
                debug!(key = %raw_key, "stored page after eviction");
                Ok(())
            },
            Err(e) => Err(e),
        }
    }

    /// Delete a page. Deleting an absent page succeeds.
    pub async fn delete(&self, key: PageKey) -> Result<()> {
        self.backend.remove(&key.to_string()).await
    }

    /// Keys of every cached page. Foreign entries in the collection are ignored.
    pub async fn list_keys(&self) -> Result<BTreeSet<PageKey>> {
        let keys = self.backend.keys().await?;
        Ok(keys.iter().filter_map(|raw| PageKey::parse(raw)).collect())
    }

    /// Remove `ceil(count * fraction)` entries, taking keys in their natural
    /// (lexicographic) order.
    ///
    /// Individual delete failures are logged and skipped. Returns the number of
    /// entries actually removed.
    pub async fn evict_fraction(&self, fraction: f64) -> Result<usize> {
        validate_fraction(fraction)?;

        let mut keys = self.backend.keys().await?;
        keys.sort();
        let target = eviction_count(keys.len(), fraction);

        let mut removed = 0;
        for key in keys.iter().take(target) {
            match self.backend.remove(key).await {
                Ok(()) => removed += 1,
                Err(e) => warn!(key = %key, error = %e, "eviction skipped entry"),
            }
        }

        info!(removed, total = keys.len(), fraction, "evicted cache entries");
        Ok(removed)
    }

    /// Remove every entry. Returns the number removed.
    pub async fn clear(&self) -> Result<usize> {
        self.evict_fraction(1.0).await
    }

    /// Usage reported by the backend, if available.
    pub async fn estimate(&self) -> Result<Option<StorageEstimate>> {
        self.backend.estimate().await
    }
}

/// Number of entries a pass with `fraction` removes from `count` entries.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn eviction_count(count: usize, fraction: f64) -> usize {
    let target = (count as f64 * fraction).ceil() as usize;
    target.min(count)
}

fn validate_fraction(fraction: f64) -> Result<()> {
    if fraction > 0.0 && fraction <= 1.0 {
        Ok(())
    } else {
        Err(Error::InvalidArgument(format!(
            "eviction fraction must be in (0, 1], got {fraction}"
        )))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn blob(byte: u8) -> PageBlob {
        PageBlob::new("image/jpeg", vec![byte; 16])
    }

    /// Backend that rejects a configurable number of writes with `QuotaExceeded`
    /// and counts every call the store makes.
    struct ScriptedBackend {
        inner: MemoryBackend,
        quota_failures: AtomicUsize,
        fail_removes: Vec<String>,
        fail_key_scans: bool,
        writes: AtomicUsize,
        key_scans: AtomicUsize,
        removes: Mutex<Vec<String>>,
    }

    impl ScriptedBackend {
        fn new(quota_failures: usize) -> Self {
            Self {
                inner: MemoryBackend::new(),
                quota_failures: AtomicUsize::new(quota_failures),
                fail_removes: Vec::new(),
                fail_key_scans: false,
                writes: AtomicUsize::new(0),
                key_scans: AtomicUsize::new(0),
                removes: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl BlobBackend for std::sync::Arc<ScriptedBackend> {
        async fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
            self.inner.read(key).await
        }

        async fn write(&self, key: &str, value: &[u8]) -> Result<()> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            let remaining = self.quota_failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.quota_failures.store(remaining - 1, Ordering::SeqCst);
                return Err(Error::QuotaExceeded {
                    key: key.to_string(),
                    needed: value.len() as u64,
                    available: 0,
                });
            }
            self.inner.write(key, value).await
        }

        async fn remove(&self, key: &str) -> Result<()> {
            self.removes.lock().unwrap().push(key.to_string());
            if self.fail_removes.iter().any(|k| k == key) {
                return Err(Error::Storage(format!("cannot remove {key}")));
            }
            self.inner.remove(key).await
        }

        async fn keys(&self) -> Result<Vec<String>> {
            self.key_scans.fetch_add(1, Ordering::SeqCst);
            if self.fail_key_scans {
                return Err(Error::Storage("key scan failed".to_string()));
            }
            self.inner.keys().await
        }

        async fn estimate(&self) -> Result<Option<StorageEstimate>> {
            self.inner.estimate().await
        }
    }

    async fn seeded(backend: &std::sync::Arc<ScriptedBackend>, pages: usize) {
        for index in 0..pages {
            let entry = StoredEntry::new(PageKey::from_index(index), &blob(index as u8));
            backend
                .inner
                .write(&entry.key, &serde_json::to_vec(&entry).unwrap())
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_get_absent_key_is_none() {
        let store = BlobStore::new(MemoryBackend::new());
        assert!(store.get(PageKey::from_index(3)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_then_get_returns_same_bytes() {
        let store = BlobStore::new(MemoryBackend::new());
        let key = PageKey::from_index(0);
        store.put(key, &blob(7)).await.unwrap();
        assert_eq!(store.get(key).await.unwrap(), Some(blob(7)));
    }

    #[tokio::test]
    async fn test_put_is_idempotent_for_same_content() {
        let store = BlobStore::new(MemoryBackend::new());
        let key = PageKey::from_index(4);
        store.put(key, &blob(1)).await.unwrap();
        store.put(key, &blob(1)).await.unwrap();
        assert_eq!(store.list_keys().await.unwrap().len(), 1);
        assert_eq!(store.get(key).await.unwrap(), Some(blob(1)));
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_storage_error() {
        let backend = MemoryBackend::new();
        backend.write("page_1", b"not json").await.unwrap();
        let store = BlobStore::new(backend);

        match store.get(PageKey::from_index(0)).await {
            Err(Error::Storage(msg)) => assert!(msg.contains("page_1")),
            other => panic!("expected storage error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_delete_and_list_keys() {
        let store = BlobStore::new(MemoryBackend::new());
        for index in 0..3 {
            store.put(PageKey::from_index(index), &blob(0)).await.unwrap();
        }
        store.delete(PageKey::from_index(1)).await.unwrap();
        store.delete(PageKey::from_index(1)).await.unwrap();

        let keys: Vec<_> = store.list_keys().await.unwrap().into_iter().collect();
        assert_eq!(keys, vec![PageKey::from_index(0), PageKey::from_index(2)]);
    }

    #[tokio::test]
    async fn test_evict_half_uses_lexicographic_order() {
        let backend = std::sync::Arc::new(ScriptedBackend::new(0));
        seeded(&backend, 12).await;
        let store = BlobStore::new(std::sync::Arc::clone(&backend));

        let removed = store.evict_fraction(0.5).await.unwrap();
        assert_eq!(removed, 6);

        // page_1, page_10, page_11, page_12, page_2, page_3 sort first
        let removes = backend.removes.lock().unwrap().clone();
        assert_eq!(
            removes,
            vec!["page_1", "page_10", "page_11", "page_12", "page_2", "page_3"]
        );

        for index in 3..9 {
            let kept = store.get(PageKey::from_index(index)).await.unwrap();
            assert_eq!(kept, Some(blob(index as u8)), "page index {index} should survive");
        }
    }

    #[tokio::test]
    async fn test_evict_tolerates_individual_delete_failures() {
        let mut scripted = ScriptedBackend::new(0);
        scripted.fail_removes = vec!["page_2".to_string()];
        let backend = std::sync::Arc::new(scripted);
        seeded(&backend, 4).await;
        let store = BlobStore::new(std::sync::Arc::clone(&backend));

        let removed = store.evict_fraction(1.0).await.unwrap();
        assert_eq!(removed, 3);
        assert_eq!(backend.removes.lock().unwrap().len(), 4);
        assert_eq!(
            store.list_keys().await.unwrap().into_iter().collect::<Vec<_>>(),
            vec![PageKey::from_index(1)]
        );
    }

    #[tokio::test]
    async fn test_evict_rejects_out_of_range_fractions() {
        let store = BlobStore::new(MemoryBackend::new());
        for fraction in [0.0, -0.5, 1.5, f64::NAN] {
            assert!(matches!(
                store.evict_fraction(fraction).await,
                Err(Error::InvalidArgument(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_quota_failure_evicts_once_and_retries_once() {
        let backend = std::sync::Arc::new(ScriptedBackend::new(1));
        seeded(&backend, 4).await;
        let store = BlobStore::new(std::sync::Arc::clone(&backend));

        store.put(PageKey::from_index(9), &blob(9)).await.unwrap();

        assert_eq!(backend.writes.load(Ordering::SeqCst), 2, "first write + one retry");
        assert_eq!(backend.key_scans.load(Ordering::SeqCst), 1, "one eviction pass");
        assert_eq!(backend.removes.lock().unwrap().len(), 2, "ceil(4 * 0.5) removed");
        assert_eq!(store.get(PageKey::from_index(9)).await.unwrap(), Some(blob(9)));
    }

    #[tokio::test]
    async fn test_second_quota_failure_surfaces_storage_error() {
        let backend = std::sync::Arc::new(ScriptedBackend::new(2));
        seeded(&backend, 2).await;
        let store = BlobStore::new(std::sync::Arc::clone(&backend));

        let result = store.put(PageKey::from_index(5), &blob(5)).await;
        match result {
            Err(Error::Storage(msg)) => assert!(msg.contains("after eviction")),
            other => panic!("expected storage error, got {other:?}"),
        }
        assert_eq!(backend.writes.load(Ordering::SeqCst), 2);
        assert_eq!(backend.key_scans.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_eviction_skips_retry() {
        let mut scripted = ScriptedBackend::new(1);
        scripted.fail_key_scans = true;
        let backend = std::sync::Arc::new(scripted);
        let store = BlobStore::new(std::sync::Arc::clone(&backend));

        match store.put(PageKey::from_index(0), &blob(1)).await {
            Err(Error::Storage(msg)) => assert!(msg.contains("Eviction after quota failure")),
            other => panic!("expected storage error, got {other:?}"),
        }
        assert_eq!(backend.writes.load(Ordering::SeqCst), 1, "no retry without eviction");
        assert_eq!(backend.key_scans.load(Ordering::SeqCst), 1);
        assert!(backend.removes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_configured_fraction_drives_quota_eviction() {
        let backend = std::sync::Arc::new(ScriptedBackend::new(1));
        seeded(&backend, 4).await;
        let store = BlobStore::new(std::sync::Arc::clone(&backend))
            .with_evict_fraction(0.25)
            .unwrap();

        store.put(PageKey::from_index(9), &blob(9)).await.unwrap();

        assert_eq!(*backend.removes.lock().unwrap(), vec!["page_1"]);
        assert_eq!(store.list_keys().await.unwrap().len(), 4);
    }

    #[test]
    fn test_with_evict_fraction_rejects_out_of_range() {
        assert!(matches!(
            BlobStore::new(MemoryBackend::new()).with_evict_fraction(0.0),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_clear_removes_everything() {
        let store = BlobStore::new(MemoryBackend::new());
        for index in 0..5 {
            store.put(PageKey::from_index(index), &blob(0)).await.unwrap();
        }
        assert_eq!(store.clear().await.unwrap(), 5);
        assert!(store.list_keys().await.unwrap().is_empty());
    }

    #[test]
    fn test_estimate_ratio() {
        let estimate = StorageEstimate {
            usage: 80,
            quota: 100,
        };
        assert!((estimate.ratio() - 0.8).abs() < f64::EPSILON);
        assert!(
            (StorageEstimate { usage: 0, quota: 0 }.ratio() - 1.0).abs() < f64::EPSILON
        );
    }

    proptest! {
        #[test]
        fn test_eviction_count_is_ceiling(count in 0usize..10_000, numerator in 1u32..=100) {
            let fraction = f64::from(numerator) / 100.0;
            let removed = eviction_count(count, fraction);
            prop_assert!(removed <= count);
            let exact = count as f64 * fraction;
            prop_assert!(removed as f64 >= exact - 1e-9);
            prop_assert!((removed as f64) < exact + 1.0);
        }

        #[test]
        fn test_half_eviction_matches_integer_ceiling(count in 0usize..100_000) {
            prop_assert_eq!(eviction_count(count, 0.5), count.div_ceil(2));
        }
    }
}
