//! Filesystem backend for the page cache.
//!
//! ## Storage Layout
//!
//! ```text
//! <root>/<store name>/
//!   schema.json            # { "version": 1, "collections": ["pages"] }
//!   pages/
//!     page_1.json          # one record per cached page
//!     page_2.json
//! ```
//!
//! Writes go to a temp file and are renamed into place, so a crash never leaves
//! a torn entry behind. Leftover `*.tmp` files are ignored.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sysinfo::Disks;
use tokio::fs;
use tracing::{debug, info};

use super::{BlobBackend, StorageEstimate};
use crate::{Error, Result};

/// Current on-disk schema version.
pub const SCHEMA_VERSION: u32 = 1;

const SCHEMA_FILE: &str = "schema.json";
const ENTRY_EXTENSION: &str = "json";
const MAX_KEY_LEN: usize = 64;

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Serialize, Deserialize)]
struct Schema {
    version: u32,
    #[serde(default)]
    collections: Vec<String>,
}

/// [`BlobBackend`] storing one JSON file per key.
#[derive(Debug, Clone)]
pub struct FsBackend {
    store_dir: PathBuf,
    collection_dir: PathBuf,
    quota_bytes: Option<u64>,
    /// Bytes claimed by quota-checked writes that are not committed yet
    in_flight: Arc<AtomicU64>,
}

/// Quota claim released when the write that took it finishes.
struct Reservation<'a> {
    counter: &'a AtomicU64,
    bytes: u64,
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(self.bytes, Ordering::SeqCst);
    }
}

impl FsBackend {
    /// Open (or create) the store `name` under `root` and its `collection`.
    ///
    /// Runs the schema upgrade: creates the collection directory if it is missing
    /// and records it in `schema.json`. A schema written by a newer version is
    /// refused rather than reinterpreted.
    pub fn open(root: &Path, name: &str, collection: &str) -> Result<Self> {
        validate_component(name)?;
        validate_component(collection)?;

        let store_dir = root.join(name);
        let collection_dir = store_dir.join(collection);
        std::fs::create_dir_all(&store_dir)
            .map_err(|e| Error::Storage(format!("Failed to create store directory: {e}")))?;

        let schema_path = store_dir.join(SCHEMA_FILE);
        let mut schema = if schema_path.exists() {
            let raw = std::fs::read_to_string(&schema_path)
                .map_err(|e| Error::Storage(format!("Failed to read schema: {e}")))?;
            serde_json::from_str::<Schema>(&raw)
                .map_err(|e| Error::Storage(format!("Failed to parse schema: {e}")))?
        } else {
            Schema {
                version: SCHEMA_VERSION,
                collections: Vec::new(),
            }
        };

        if schema.version > SCHEMA_VERSION {
            return Err(Error::Storage(format!(
                "Store '{name}' uses schema version {}, newest supported is {SCHEMA_VERSION}",
                schema.version
            )));
        }

        let needs_upgrade = schema.version < SCHEMA_VERSION
            || !schema.collections.iter().any(|c| c == collection)
            || !collection_dir.is_dir();
        if needs_upgrade {
            std::fs::create_dir_all(&collection_dir)
                .map_err(|e| Error::Storage(format!("Failed to create collection: {e}")))?;
            if !schema.collections.iter().any(|c| c == collection) {
                schema.collections.push(collection.to_string());
            }
            schema.version = SCHEMA_VERSION;
            let json = serde_json::to_string_pretty(&schema)?;
            std::fs::write(&schema_path, json)
                .map_err(|e| Error::Storage(format!("Failed to write schema: {e}")))?;
            info!(
                store = %store_dir.display(),
                collection,
                version = SCHEMA_VERSION,
                "initialized store collection"
            );
        }

        Ok(Self {
            store_dir,
            collection_dir,
            quota_bytes: None,
            in_flight: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Cap the collection at `bytes`; larger totals are rejected as quota errors.
    #[must_use]
    pub const fn with_quota(mut self, bytes: Option<u64>) -> Self {
        self.quota_bytes = bytes;
        self
    }

    /// Directory holding the store's schema and collections.
    #[must_use]
    pub fn store_dir(&self) -> &Path {
        &self.store_dir
    }

    /// Directory holding the entries of this collection.
    #[must_use]
    pub fn collection_dir(&self) -> &Path {
        &self.collection_dir
    }

    fn entry_path(&self, key: &str) -> Result<PathBuf> {
        validate_component(key)?;
        Ok(self
            .collection_dir
            .join(format!("{key}.{ENTRY_EXTENSION}")))
    }

    async fn entry_sizes(&self) -> Result<Vec<(String, u64)>> {
        let mut dir = match fs::read_dir(&self.collection_dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(Error::Storage(format!(
                    "Failed to read collection directory: {e}"
                )));
            },
        };

        let mut entries = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| Error::Storage(format!("Failed to read directory entry: {e}")))?
        {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some(ENTRY_EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let size = entry.metadata().await.map(|m| m.len()).unwrap_or(0);
            entries.push((stem.to_string(), size));
        }
        Ok(entries)
    }

    /// Claim `needed` bytes against `quota`.
    ///
    /// The claim is taken before the directory scan, so writes that overlap in
    /// time count each other: an earlier write is either still reserved or
    /// already on disk when a later one scans.
    async fn reserve(&self, key: &str, needed: u64, quota: u64) -> Result<Reservation<'_>> {
        let pending = self.in_flight.fetch_add(needed, Ordering::SeqCst);
        let reservation = Reservation {
            counter: &self.in_flight,
            bytes: needed,
        };

        let on_disk: u64 = self
            .entry_sizes()
            .await?
            .iter()
            .filter(|(name, _)| name != key)
            .map(|(_, size)| size)
            .sum();
        let used = on_disk.saturating_add(pending);
        if used.saturating_add(needed) > quota {
            return Err(Error::QuotaExceeded {
                key: key.to_string(),
                needed,
                available: quota.saturating_sub(used),
            });
        }
        Ok(reservation)
    }

    fn disk_estimate(&self) -> Option<StorageEstimate> {
        let target = self
            .collection_dir
            .canonicalize()
            .unwrap_or_else(|_| self.collection_dir.clone());
        let disks = Disks::new_with_refreshed_list();
        disks
            .list()
            .iter()
            .filter(|disk| target.starts_with(disk.mount_point()))
            .max_by_key(|disk| disk.mount_point().as_os_str().len())
            .map(|disk| StorageEstimate {
                usage: disk.total_space().saturating_sub(disk.available_space()),
                quota: disk.total_space(),
            })
    }
}

#[async_trait]
impl BlobBackend for FsBackend {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.entry_path(key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Storage(format!("Failed to read {key}: {e}"))),
        }
    }

    async fn write(&self, key: &str, value: &[u8]) -> Result<()> {
        let path = self.entry_path(key)?;
        let needed = value.len() as u64;

        // Held until the entry is committed or the write fails
        let _reservation = match self.quota_bytes {
            Some(quota) => Some(self.reserve(key, needed, quota).await?),
            None => None,
        };

        // Atomic write: temp file + rename; one temp name per write
        let tmp_id = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let tmp_path = path.with_extension(format!(
            "{ENTRY_EXTENSION}.{}-{tmp_id}.tmp",
            std::process::id()
        ));
        if let Err(e) = fs::write(&tmp_path, value).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(map_write_error(key, needed, &e));
        }

        // Handle Windows: remove target before rename
        #[cfg(target_os = "windows")]
        if fs::try_exists(&path).await.unwrap_or(false) {
            fs::remove_file(&path)
                .await
                .map_err(|e| Error::Storage(format!("Failed to replace {key}: {e}")))?;
        }

        if let Err(e) = fs::rename(&tmp_path, &path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(Error::Storage(format!("Failed to commit {key}: {e}")));
        }

        debug!(key, bytes = needed, "wrote entry");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let path = self.entry_path(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(key, "removed entry");
                Ok(())
            },
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Storage(format!("Failed to delete {key}: {e}"))),
        }
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self
            .entry_sizes()
            .await?
            .into_iter()
            .map(|(name, _)| name)
            .collect())
    }

    async fn estimate(&self) -> Result<Option<StorageEstimate>> {
        if let Some(quota) = self.quota_bytes {
            let usage = self.entry_sizes().await?.iter().map(|(_, size)| size).sum();
            return Ok(Some(StorageEstimate { usage, quota }));
        }
        Ok(self.disk_estimate())
    }
}

fn map_write_error(key: &str, needed: u64, err: &std::io::Error) -> Error {
    if err.kind() == ErrorKind::StorageFull {
        Error::QuotaExceeded {
            key: key.to_string(),
            needed,
            available: 0,
        }
    } else {
        Error::Storage(format!("Failed to write {key}: {err}"))
    }
}

/// Keys and store names become path components; keep them to a safe alphabet.
fn validate_component(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > MAX_KEY_LEN {
        return Err(Error::InvalidArgument(format!(
            "'{name}' must be 1-{MAX_KEY_LEN} characters"
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'))
    {
        return Err(Error::InvalidArgument(format!(
            "'{name}' may only contain letters, digits, '_' and '-'"
        )));
    }
    Ok(())
}
