//! Error types and handling for folio-core operations.
//!
//! A single error type covers every failure in the page cache: the remote page
//! source, the durable blob store, configuration loading and the user-facing
//! page load failure that wraps them.
//!
//! ## Error Categories
//!
//! - **Network Errors**: the remote page source failed (transport or non-success status)
//! - **Storage Errors**: durable store I/O failed or an entry could not be decoded
//! - **Quota Errors**: a store write was rejected for lack of space
//! - **Page Load Errors**: terminal, user-facing failure for one page index
//! - **Configuration Errors**: invalid settings or config files
//!
//! ## Propagation
//!
//! `QuotaExceeded` never leaves the blob store's write path unless the single
//! evict-and-retry also failed, in which case the caller sees a `Storage` error.
//! Interactive loads wrap network and storage causes in `PageLoad`:
//!
//! ```rust
//! use folio_core::Error;
//!
//! let cause = Error::Storage("disk unplugged".to_string());
//! let err = Error::page_load(4, cause);
//! assert_eq!(err.category(), "page_load");
//! assert!(err.to_string().contains("page 5"));
//! ```

use thiserror::Error;

/// The main error type for folio-core operations.
///
/// All public functions in folio-core return `Result<T, Error>`. The error
/// source chain is preserved through `source()`, so a `PageLoad` error can be
/// unwrapped to the network or storage failure that caused it.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation failed outside the blob store's own error mapping.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Remote page source failed.
    ///
    /// Covers transport-level failures (connect, timeout, body read) and
    /// non-success HTTP statuses, which are converted with
    /// `Response::error_for_status`.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Durable store operation failed.
    ///
    /// ## Common Causes
    ///
    /// - Read or write failure on the underlying medium
    /// - Corrupt entry that can no longer be decoded
    /// - Schema written by a newer version of folio
    /// - A write that still failed after the quota eviction pass
    #[error("Storage error: {0}")]
    Storage(String),

    /// A store write was rejected because the medium is out of space.
    ///
    /// Raised by a [`BlobBackend`](crate::store::BlobBackend) and handled by
    /// [`BlobStore::put`](crate::store::BlobStore::put) with one eviction pass and
    /// one retry.
    #[error("Quota exceeded writing '{key}': {needed} bytes needed, {available} available")]
    QuotaExceeded {
        /// Storage key that could not be written.
        key: String,
        /// Size of the rejected write in bytes.
        needed: u64,
        /// Bytes still available under the quota.
        available: u64,
    },

    /// A page could not be displayed.
    ///
    /// Terminal for the interactive load path; the viewer is expected to show a
    /// per-page error with a retry action, which simply calls `load_page` again.
    #[error("Failed to load page {} (index {index}): {source}", index + 1)]
    PageLoad {
        /// Zero-based index of the page that failed.
        index: usize,
        /// Underlying network or storage failure.
        #[source]
        source: Box<Error>,
    },

    /// Configuration is invalid or inaccessible.
    #[error("Configuration error: {0}")]
    Config(String),

    /// URL is malformed or uses an unsupported scheme.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// An argument was outside its valid range.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic error for uncategorized failures.
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl Error {
    /// Wrap a failure as the user-facing load error for `index`.
    #[must_use]
    pub fn page_load(index: usize, cause: Self) -> Self {
        Self::PageLoad {
            index,
            source: Box::new(cause),
        }
    }

    /// Check if the error might be recoverable through retry logic.
    ///
    /// A `PageLoad` error is as recoverable as its cause, which is what the
    /// viewer's retry button relies on.
    ///
    /// ```rust
    /// use folio_core::Error;
    /// use std::io;
    ///
    /// assert!(Error::Io(io::Error::new(io::ErrorKind::TimedOut, "slow")).is_recoverable());
    /// assert!(!Error::Config("bad origin".to_string()).is_recoverable());
    /// ```
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Network(e) => {
                // Connection failures, timeouts and 5xx are worth a retry
                e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
            },
            Self::QuotaExceeded { .. } => true,
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::Interrupted
            ),
            Self::PageLoad { source, .. } => source.is_recoverable(),
            _ => false,
        }
    }

    /// Get the error category as a string identifier for logging.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::Network(_) => "network",
            Self::Storage(_) => "storage",
            Self::QuotaExceeded { .. } => "quota",
            Self::PageLoad { .. } => "page_load",
            Self::Config(_) => "config",
            Self::InvalidUrl(_) => "invalid_url",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::Serialization(_) => "serialization",
            Self::Other(_) => "other",
        }
    }
}

/// Convenience type alias for `std::result::Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
