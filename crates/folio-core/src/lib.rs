//! # folio-core
//!
//! Page cache and background prefetch for a paginated document viewer.
//!
//! Page scans are fetched lazily from a remote origin, persisted in a durable
//! local cache and, in the background, the rest of the document is prefetched so
//! that navigation stays fast and keeps working offline.
//!
//! ## Architecture
//!
//! Components, leaf-first:
//!
//! - **Blob Store** ([`store`]): persistent `page_<n>` → image cache with
//!   quota-driven eviction
//! - **Page Fetcher** ([`fetcher`]): one page's bytes from the origin
//! - **Page Loader** ([`loader`]): cache first, else fetch and populate
//! - **Prefetch Coordinator** ([`prefetch`]): fills every gap in bounded batches
//! - **Viewport** ([`viewport`]): navigation state the viewer holds
//!
//! The loader and the prefetcher share one [`BlobStore`] behind an `Arc`; writes
//! of the same key carry the same content, so neither ever waits on the other.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use folio_core::{BlobStore, Config, FsBackend, HttpFetcher, PageLoader};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> folio_core::Result<()> {
//! let config = Config::load()?.apply_env();
//! let backend = FsBackend::open(&config.store.root, &config.store.name, &config.store.collection)?;
//! let store = Arc::new(BlobStore::new(backend));
//! let source = Arc::new(HttpFetcher::from_config(&config.source)?);
//!
//! let loader = PageLoader::new(store, source, config.document.total_pages);
//! if let Some(page) = loader.load_page(0).await? {
//!     println!("page 1: {} bytes from {}", page.blob.len(), page.origin.as_str());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! All operations return [`Result<T, Error>`]. Interactive loads surface
//! [`Error::PageLoad`]; the prefetcher never fails and reports counts instead.

/// Configuration loading and validation
pub mod config;
/// Error types and result aliases
pub mod error;
/// Remote page source
pub mod fetcher;
/// Cache-then-network page loading
pub mod loader;
/// Background prefetch coordinator
pub mod prefetch;
pub mod store;
/// Page keys, blobs and the document descriptor
pub mod types;
/// Three-slot viewer navigation state
pub mod viewport;

pub use config::{Config, PrefetchConfig, SourceConfig, StoreConfig};
pub use error::{Error, Result};
pub use fetcher::{HttpFetcher, PageSource};
pub use loader::{LoadOrigin, LoadedPage, PageLoader};
pub use prefetch::{PrefetchOptions, PrefetchReport, Prefetcher, ProgressCallback};
pub use store::{BlobBackend, BlobStore, FsBackend, MemoryBackend, StorageEstimate};
pub use types::{Chapter, DocumentDescriptor, PageBlob, PageKey};
pub use viewport::{Slot, Viewport};
