//! Configuration management for the folio page cache.
//!
//! Configuration is stored in TOML and covers where pages come from, where they
//! are cached, how the background prefetch behaves and the shape of the document.
//!
//! ## Resolution Order
//!
//! 1. **Explicit path** passed to [`Config::load_from`] (the CLI's `--config`)
//! 2. **`FOLIO_CONFIG`** environment variable
//! 3. **Global config** in the platform config directory (`folio/config.toml`)
//! 4. **Built-in defaults** when no file exists
//!
//! Environment overrides (`FOLIO_ORIGIN`, `FOLIO_DATA_DIR`) are applied on top by
//! [`Config::apply_env`].
//!
//! ## Example Configuration File
//!
//! ```toml
//! [source]
//! origin = "https://books.example.com/arab-melayu"
//! path_segment = "scan"
//! extension = "jpg"
//! timeout_secs = 30
//!
//! [store]
//! name = "digitalBookDB"
//! collection = "pages"
//! quota_bytes = 268435456
//!
//! [prefetch]
//! batch_size = 3
//! pause_ms = 100
//! high_water = 0.8
//! evict_fraction = 0.5
//!
//! [document]
//! total_pages = 241
//! chapters = [
//!     { title = "Cover", page = 1 },
//!     { title = "Writing rules", page = 17 },
//! ]
//! ```

use crate::types::DocumentDescriptor;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming an explicit config file.
pub const ENV_CONFIG: &str = "FOLIO_CONFIG";
/// Environment variable overriding the page origin.
pub const ENV_ORIGIN: &str = "FOLIO_ORIGIN";
/// Environment variable overriding the store root directory.
pub const ENV_DATA_DIR: &str = "FOLIO_DATA_DIR";

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Remote page source
    pub source: SourceConfig,
    /// Durable cache location and limits
    pub store: StoreConfig,
    /// Background prefetch tuning
    pub prefetch: PrefetchConfig,
    /// Document shape
    pub document: DocumentDescriptor,
}

/// Where page scans are fetched from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Base URL; pages live at `<origin>/<path_segment>/<n>.<extension>`.
    pub origin: String,
    /// Directory segment holding the scans.
    pub path_segment: String,
    /// File extension of the scans.
    pub extension: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            origin: "http://localhost:8080".to_string(),
            path_segment: "scan".to_string(),
            extension: "jpg".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Where and how much the cache may store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Logical store name; one directory per document.
    pub name: String,
    /// Collection holding page entries.
    pub collection: String,
    /// Root directory for all stores.
    ///
    /// Defaults to the platform data directory:
    /// - Linux: `~/.local/share/folio`
    /// - macOS: `~/Library/Application Support/dev.folio.folio`
    /// - Windows: `%APPDATA%\folio\folio\data`
    pub root: PathBuf,
    /// Optional byte cap for the collection. Without it the disk itself is the limit.
    pub quota_bytes: Option<u64>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            name: "digitalBookDB".to_string(),
            collection: "pages".to_string(),
            root: default_data_dir(),
            quota_bytes: None,
        }
    }
}

/// Background prefetch tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrefetchConfig {
    /// Pages fetched concurrently per batch.
    pub batch_size: usize,
    /// Pause between batches in milliseconds.
    pub pause_ms: u64,
    /// Usage ratio above which an eviction pass runs before prefetching.
    pub high_water: f64,
    /// Fraction of entries removed by that pass.
    pub evict_fraction: f64,
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            batch_size: 3,
            pause_ms: 100,
            high_water: 0.8,
            evict_fraction: 0.5,
        }
    }
}

impl PrefetchConfig {
    /// Pause between batches.
    #[must_use]
    pub const fn pause(&self) -> Duration {
        Duration::from_millis(self.pause_ms)
    }
}

impl Config {
    /// Load from `FOLIO_CONFIG` or the global config file, falling back to defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be read or parsed,
    /// or if the loaded values fail [`Config::validate`].
    pub fn load() -> Result<Self> {
        if let Some(path) = std::env::var_os(ENV_CONFIG) {
            return Self::load_from(Path::new(&path));
        }
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load and validate a specific file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config {}: {e}", path.display()))
        })?;
        let config = Self::parse(&content)?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Parse and validate TOML content.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| Error::Config(format!("Failed to create config directory: {e}")))?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {e}")))?;
        fs::write(path, content)
            .map_err(|e| Error::Config(format!("Failed to write config: {e}")))?;
        Ok(())
    }

    /// Apply `FOLIO_ORIGIN` and `FOLIO_DATA_DIR` overrides.
    #[must_use]
    pub fn apply_env(self) -> Self {
        self.with_overrides(
            std::env::var(ENV_ORIGIN).ok(),
            std::env::var_os(ENV_DATA_DIR).map(PathBuf::from),
        )
    }

    /// Apply explicit origin / data directory overrides; blank values are ignored.
    #[must_use]
    pub fn with_overrides(mut self, origin: Option<String>, data_dir: Option<PathBuf>) -> Self {
        if let Some(origin) = origin.filter(|o| !o.trim().is_empty()) {
            self.source.origin = origin.trim().to_string();
        }
        if let Some(dir) = data_dir.filter(|d| !d.as_os_str().is_empty()) {
            self.store.root = dir;
        }
        self
    }

    /// Reject values the cache cannot operate with.
    pub fn validate(&self) -> Result<()> {
        if self.source.origin.trim().is_empty() {
            return Err(Error::Config("source.origin must not be empty".into()));
        }
        if self.source.timeout_secs == 0 {
            return Err(Error::Config("source.timeout_secs must be positive".into()));
        }
        if self.prefetch.batch_size == 0 {
            return Err(Error::Config("prefetch.batch_size must be at least 1".into()));
        }
        for (name, value) in [
            ("prefetch.high_water", self.prefetch.high_water),
            ("prefetch.evict_fraction", self.prefetch.evict_fraction),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(Error::Config(format!("{name} must be in (0, 1], got {value}")));
            }
        }
        self.document.validate()
    }

    /// Path of the global configuration file, if the platform has a config dir.
    ///
    /// - Linux: `~/.config/folio/config.toml`
    /// - macOS: `~/Library/Application Support/dev.folio.folio/config.toml`
    /// - Windows: `%APPDATA%\folio\folio\config\config.toml`
    pub fn config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("dev", "folio", "folio")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("dev", "folio", "folio").map_or_else(
        || {
            directories::BaseDirs::new().map_or_else(
                || PathBuf::from(".folio"),
                |base| base.home_dir().join(".folio"),
            )
        },
        |dirs| dirs.data_dir().to_path_buf(),
    )
}
