//! Background prefetch of every uncached page.
//!
//! The [`Prefetcher`] computes the gap set (indices whose key is absent from the
//! store) and fills it in bounded batches: all members of a batch are in flight
//! together, the batch is awaited as a whole, then the job pauses before the
//! next one. Batches are joined futures on the caller's task, so the job never
//! spawns threads and never holds anything the interactive loader waits on.
//!
//! The job as a whole never fails. Member failures are logged and counted in
//! the [`PrefetchReport`]; a failed key scan degrades to "everything is missing".

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::config::PrefetchConfig;
use crate::fetcher::PageSource;
use crate::store::BlobStore;
use crate::types::PageKey;

/// Progress callback type for reporting prefetch progress.
///
/// Called with `(completed, total)`: once with `(0, gap)` when the job starts,
/// then after each page is stored.
pub type ProgressCallback = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// Tuning for a prefetch run.
#[derive(Debug, Clone, PartialEq)]
pub struct PrefetchOptions {
    /// Pages in flight per batch.
    pub batch_size: usize,
    /// Pause between consecutive batches.
    pub pause: Duration,
    /// Usage ratio above which the store is trimmed before the run.
    pub high_water: f64,
    /// Fraction evicted by that trim.
    pub evict_fraction: f64,
}

impl Default for PrefetchOptions {
    fn default() -> Self {
        Self::from(&PrefetchConfig::default())
    }
}

impl From<&PrefetchConfig> for PrefetchOptions {
    fn from(config: &PrefetchConfig) -> Self {
        Self {
            batch_size: config.batch_size.max(1),
            pause: config.pause(),
            high_water: config.high_water,
            evict_fraction: config.evict_fraction,
        }
    }
}

/// Outcome of a prefetch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrefetchReport {
    /// Pages missing from the store when the run started.
    pub gap: usize,
    /// Pages fetched and stored.
    pub stored: usize,
    /// Pages whose fetch or store failed.
    pub failed: usize,
    /// Batches issued.
    pub batches: usize,
    /// Entries removed by the high-water trim.
    pub evicted: usize,
}

impl PrefetchReport {
    /// Whether every missing page was stored.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.failed == 0 && self.stored == self.gap
    }
}

/// Fills the cache with every page that is not stored yet.
///
/// ## Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use folio_core::{BlobStore, HttpFetcher, MemoryBackend, Prefetcher};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> folio_core::Result<()> {
/// let store = Arc::new(BlobStore::new(MemoryBackend::new()));
/// let source = Arc::new(HttpFetcher::new("https://books.example.com")?);
///
/// let report = Prefetcher::new(store, source, 241)
///     .with_progress(|done, total| eprintln!("{done}/{total}"))
///     .run()
///     .await;
/// println!("stored {} of {}", report.stored, report.gap);
/// # Ok(())
/// # }
/// ```
pub struct Prefetcher<S: PageSource> {
    store: Arc<BlobStore>,
    source: Arc<S>,
    total_pages: usize,
    options: PrefetchOptions,
    progress_callback: Option<ProgressCallback>,
}

impl<S: PageSource> Prefetcher<S> {
    /// Create a prefetcher with default options.
    pub fn new(store: Arc<BlobStore>, source: Arc<S>, total_pages: usize) -> Self {
        Self {
            store,
            source,
            total_pages,
            options: PrefetchOptions::default(),
            progress_callback: None,
        }
    }

    /// Replace the tuning options. A zero batch size is treated as one.
    #[must_use]
    pub fn with_options(mut self, options: PrefetchOptions) -> Self {
        self.options = PrefetchOptions {
            batch_size: options.batch_size.max(1),
            ..options
        };
        self
    }

    /// Set progress callback.
    ///
    /// The callback receives `(completed, total)` where `total` is the gap size.
    #[must_use]
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(usize, usize) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Arc::new(callback));
        self
    }

    /// Indices in `[0, total_pages)` with no stored entry, ascending.
    ///
    /// A failed key scan is logged and every index is reported missing.
    pub async fn gap_set(&self) -> Vec<usize> {
        match self.store.list_keys().await {
            Ok(keys) => {
                let cached: BTreeSet<usize> = keys.into_iter().map(PageKey::index).collect();
                (0..self.total_pages)
                    .filter(|index| !cached.contains(index))
                    .collect()
            },
            Err(e) => {
                warn!(error = %e, "key scan failed; treating every page as missing");
                (0..self.total_pages).collect()
            },
        }
    }

    /// Run the job to completion.
    ///
    /// 1. Trim the store if usage is above the high-water mark.
    /// 2. Compute the gap set; an empty gap is a no-op.
    /// 3. Fetch and store the gap in batches, pausing between batches.
    pub async fn run(&self) -> PrefetchReport {
        let mut report = PrefetchReport {
            evicted: self.trim_if_needed().await,
            ..PrefetchReport::default()
        };

        let gap = self.gap_set().await;
        report.gap = gap.len();
        if gap.is_empty() {
            debug!("every page is cached; nothing to prefetch");
            return report;
        }

        info!(
            gap = report.gap,
            batch_size = self.options.batch_size,
            "prefetching missing pages"
        );
        self.report_progress(0, report.gap);

        let total = report.gap;
        let completed = AtomicUsize::new(0);
        for (batch_number, batch) in gap.chunks(self.options.batch_size).enumerate() {
            if batch_number > 0 && !self.options.pause.is_zero() {
                tokio::time::sleep(self.options.pause).await;
            }

            let outcomes = join_all(
                batch
                    .iter()
                    .map(|&index| self.prefetch_one(index, total, &completed)),
            )
            .await;

            report.batches += 1;
            for stored in outcomes {
                if stored {
                    report.stored += 1;
                } else {
                    report.failed += 1;
                }
            }
        }

        info!(
            stored = report.stored,
            failed = report.failed,
            batches = report.batches,
            "prefetch finished"
        );
        report
    }

    async fn trim_if_needed(&self) -> usize {
        let estimate = match self.store.estimate().await {
            Ok(Some(estimate)) => estimate,
            Ok(None) => return 0,
            Err(e) => {
                warn!(error = %e, "storage estimate unavailable");
                return 0;
            },
        };

        let ratio = estimate.ratio();
        if ratio <= self.options.high_water {
            return 0;
        }

        info!(
            usage = estimate.usage,
            quota = estimate.quota,
            "storage above high-water mark; evicting before prefetch"
        );
        match self.store.evict_fraction(self.options.evict_fraction).await {
            Ok(removed) => removed,
            Err(e) => {
                warn!(error = %e, "pre-prefetch eviction failed");
                0
            },
        }
    }

    async fn prefetch_one(&self, index: usize, total: usize, completed: &AtomicUsize) -> bool {
        let key = PageKey::from_index(index);
        let blob = match self.source.fetch(key.number()).await {
            Ok(blob) => blob,
            Err(e) => {
                warn!(key = %key, error = %e, "prefetch fetch failed");
                return false;
            },
        };

        if let Err(e) = self.store.put(key, &blob).await {
            warn!(key = %key, error = %e, "prefetch store failed");
            return false;
        }

        let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
        self.report_progress(done, total);
        true
    }

    fn report_progress(&self, completed: usize, total: usize) {
        if let Some(callback) = &self.progress_callback {
            callback(completed, total);
        }
    }
}
