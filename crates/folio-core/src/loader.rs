//! Interactive page loading: cache first, then the origin.
//!
//! [`PageLoader::load_page`] is the only entry point the viewer calls. It never
//! queues behind the prefetcher; both share the same [`BlobStore`] and rely on
//! content-equivalent writes when they race on a key.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::fetcher::PageSource;
use crate::store::BlobStore;
use crate::types::{PageBlob, PageKey};
use crate::{Error, Result};

/// Where a loaded page came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOrigin {
    /// Served from the durable cache.
    Cache,
    /// Fetched from the origin during this call.
    Network,
}

impl LoadOrigin {
    /// Lowercase label for display.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cache => "cache",
            Self::Network => "network",
        }
    }
}

/// Content for one page index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedPage {
    /// 0-based page index.
    pub index: usize,
    /// Decoded page content.
    pub blob: PageBlob,
    /// Cache or network.
    pub origin: LoadOrigin,
}

/// Cache-then-network page loader.
pub struct PageLoader<S: PageSource> {
    store: Arc<BlobStore>,
    source: Arc<S>,
    total_pages: usize,
}

impl<S: PageSource> Clone for PageLoader<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            source: Arc::clone(&self.source),
            total_pages: self.total_pages,
        }
    }
}

impl<S: PageSource> PageLoader<S> {
    /// Create a loader for a document of `total_pages` pages.
    pub fn new(store: Arc<BlobStore>, source: Arc<S>, total_pages: usize) -> Self {
        Self {
            store,
            source,
            total_pages,
        }
    }

    /// Number of pages in the document.
    #[must_use]
    pub const fn total_pages(&self) -> usize {
        self.total_pages
    }

    /// Load the page at a 0-based `index`.
    ///
    /// Returns `Ok(None)` when `index` is outside the document; the viewer shows
    /// an empty slot for it. A cached entry is returned without touching the
    /// network. On a miss the page is fetched and written back; a failed write is
    /// logged and the fetched page is still returned.
    ///
    /// # Errors
    ///
    /// [`Error::PageLoad`] when the page is not cached and the fetch failed.
    /// Retrying is calling this method again.
    pub async fn load_page(&self, index: i64) -> Result<Option<LoadedPage>> {
        let Some(index) = usize::try_from(index)
            .ok()
            .filter(|&i| i < self.total_pages)
        else {
            debug!(index, total = self.total_pages, "index outside document");
            return Ok(None);
        };
        let key = PageKey::from_index(index);

        // A failed probe counts as a miss; refetching overwrites a corrupt entry
        match self.store.get(key).await {
            Ok(Some(blob)) => {
                return Ok(Some(LoadedPage {
                    index,
                    blob,
                    origin: LoadOrigin::Cache,
                }));
            },
            Ok(None) => {},
            Err(e) => warn!(key = %key, error = %e, "cache read failed; refetching"),
        }

        let blob = self
            .source
            .fetch(key.number())
            .await
            .map_err(|e| Error::page_load(index, e))?;

        if let Err(e) = self.store.put(key, &blob).await {
            warn!(key = %key, error = %e, "failed to cache page");
        }

        Ok(Some(LoadedPage {
            index,
            blob,
            origin: LoadOrigin::Network,
        }))
    }
}
