//! Resolved configuration and shared handles for a single invocation.

use std::sync::Arc;

use anyhow::{Context, Result};
use folio_core::{
    BlobStore, Config, FsBackend, HttpFetcher, PageLoader, PrefetchOptions, Prefetcher,
};
use tracing::debug;

use crate::cli::Cli;

/// Configuration plus the opened page store.
pub struct App {
    pub config: Config,
    pub store: Arc<BlobStore>,
}

impl App {
    /// Resolve configuration from the global flags and open the store.
    pub fn open(cli: &Cli) -> Result<Self> {
        let config = resolve_config(cli)?;
        let backend = FsBackend::open(
            &config.store.root,
            &config.store.name,
            &config.store.collection,
        )
        .with_context(|| format!("Failed to open page store under {}", config.store.root.display()))?
        .with_quota(config.store.quota_bytes);
        debug!(dir = %backend.collection_dir().display(), "opened page store");

        let store = BlobStore::new(backend).with_evict_fraction(config.prefetch.evict_fraction)?;

        Ok(Self {
            config,
            store: Arc::new(store),
        })
    }

    /// HTTP source for the configured origin.
    pub fn fetcher(&self) -> Result<Arc<HttpFetcher>> {
        let fetcher = HttpFetcher::from_config(&self.config.source)
            .with_context(|| format!("Invalid origin '{}'", self.config.source.origin))?;
        Ok(Arc::new(fetcher))
    }

    pub fn loader(&self) -> Result<PageLoader<HttpFetcher>> {
        Ok(PageLoader::new(
            Arc::clone(&self.store),
            self.fetcher()?,
            self.config.document.total_pages,
        ))
    }

    pub fn prefetcher(&self) -> Result<Prefetcher<HttpFetcher>> {
        Ok(Prefetcher::new(
            Arc::clone(&self.store),
            self.fetcher()?,
            self.config.document.total_pages,
        )
        .with_options(PrefetchOptions::from(&self.config.prefetch)))
    }
}

/// Load the config file named by `--config` (or the default location) and apply
/// the `--origin` / `--data-dir` overrides.
pub fn resolve_config(cli: &Cli) -> Result<Config> {
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let config = config.with_overrides(cli.origin.clone(), cli.data_dir.clone());
    config.validate()?;
    Ok(config)
}
