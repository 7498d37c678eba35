//! Core data types: page keys, page blobs and the document descriptor.

use std::fmt;

use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Key prefix for stored pages: `page_<n>`.
const KEY_PREFIX: &str = "page_";

/// MIME type assumed when the origin does not send one.
pub const DEFAULT_MIME: &str = "image/jpeg";

/// Identifies a cached page by its 1-based page number.
///
/// Derived deterministically from a 0-based page index, so the same index always
/// maps to the same key for the lifetime of a document.
///
/// ```rust
/// use folio_core::PageKey;
///
/// let key = PageKey::from_index(0);
/// assert_eq!(key.number(), 1);
/// assert_eq!(key.to_string(), "page_1");
/// assert_eq!(PageKey::parse("page_1"), Some(key));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageKey(usize);

impl PageKey {
    /// Key for a 0-based page index.
    #[must_use]
    pub const fn from_index(index: usize) -> Self {
        Self(index + 1)
    }

    /// Key for a 1-based page number. Returns `None` for page 0.
    #[must_use]
    pub const fn from_number(number: usize) -> Option<Self> {
        if number == 0 { None } else { Some(Self(number)) }
    }

    /// Parse the storage form `page_<n>`.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let digits = raw.strip_prefix(KEY_PREFIX)?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok().and_then(Self::from_number)
    }

    /// 1-based page number.
    #[must_use]
    pub const fn number(self) -> usize {
        self.0
    }

    /// 0-based page index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 - 1
    }
}

impl fmt::Display for PageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{KEY_PREFIX}{}", self.0)
    }
}

/// Binary page image plus the encoding needed to render it again.
///
/// Immutable once created. The storable form is a `data:` URL; converting to it
/// and back reproduces the bytes exactly.
///
/// ```rust
/// use folio_core::PageBlob;
///
/// let blob = PageBlob::new("image/jpeg", vec![0xFF, 0xD8, 0xFF]);
/// let stored = blob.to_data_url();
/// assert_eq!(stored, "data:image/jpeg;base64,/9j/");
/// assert_eq!(PageBlob::from_data_url(&stored).unwrap(), blob);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageBlob {
    mime: String,
    bytes: Vec<u8>,
}

impl PageBlob {
    /// Create a blob from its MIME type and raw bytes.
    #[must_use]
    pub fn new(mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime: mime.into(),
            bytes,
        }
    }

    /// MIME type of the image.
    #[must_use]
    pub fn mime(&self) -> &str {
        &self.mime
    }

    /// Raw image bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume the blob, returning the raw bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Size of the image in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the image has no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Encode as `data:<mime>;base64,<payload>`.
    #[must_use]
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, STANDARD.encode(&self.bytes))
    }

    /// Decode a `data:<mime>;base64,<payload>` URL.
    pub fn from_data_url(url: &str) -> Result<Self> {
        let rest = url
            .strip_prefix("data:")
            .ok_or_else(|| Error::Serialization("data URL must start with 'data:'".into()))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| Error::Serialization("data URL has no payload separator".into()))?;
        let mime = header
            .strip_suffix(";base64")
            .ok_or_else(|| Error::Serialization("data URL is not base64 encoded".into()))?;
        let bytes = STANDARD
            .decode(payload)
            .map_err(|e| Error::Serialization(format!("invalid base64 payload: {e}")))?;
        let mime = if mime.is_empty() { DEFAULT_MIME } else { mime };
        Ok(Self::new(mime, bytes))
    }
}

/// Persisted form of a cache entry.
///
/// One record per key; written once and never updated in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredEntry {
    /// Storage key (`page_<n>`).
    pub key: String,
    /// Page content as a `data:` URL.
    pub data_url: String,
    /// When the entry was written.
    pub stored_at: DateTime<Utc>,
}

impl StoredEntry {
    /// Build the stored record for `blob` under `key`.
    #[must_use]
    pub fn new(key: PageKey, blob: &PageBlob) -> Self {
        Self {
            key: key.to_string(),
            data_url: blob.to_data_url(),
            stored_at: Utc::now(),
        }
    }

    /// Decode the page content.
    pub fn blob(&self) -> Result<PageBlob> {
        PageBlob::from_data_url(&self.data_url)
    }
}

/// A named entry in the table of contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    /// Display title.
    pub title: String,
    /// 1-based page number the chapter starts on.
    pub page: usize,
}

impl Chapter {
    /// Create a chapter starting on the 1-based `page`.
    #[must_use]
    pub fn new(title: impl Into<String>, page: usize) -> Self {
        Self {
            title: title.into(),
            page,
        }
    }

    /// 0-based index of the chapter's first page.
    #[must_use]
    pub const fn start_index(&self) -> usize {
        self.page.saturating_sub(1)
    }
}

/// Fixed shape of the document being viewed.
///
/// The page count is fixed at construction. The chapter list is only consumed by
/// navigation; the cache core never mutates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentDescriptor {
    /// Total number of pages.
    pub total_pages: usize,
    /// Chapters in reading order.
    #[serde(default)]
    pub chapters: Vec<Chapter>,
}

impl DocumentDescriptor {
    /// Create a descriptor with no chapters.
    #[must_use]
    pub const fn new(total_pages: usize) -> Self {
        Self {
            total_pages,
            chapters: Vec::new(),
        }
    }

    /// Builder-style chapter list.
    #[must_use]
    pub fn with_chapters(mut self, chapters: Vec<Chapter>) -> Self {
        self.chapters = chapters;
        self
    }

    /// Whether `index` names a page of this document.
    #[must_use]
    pub const fn contains(&self, index: usize) -> bool {
        index < self.total_pages
    }

    /// Chapter containing the 0-based `index`, if any chapter starts at or before it.
    #[must_use]
    pub fn chapter_for(&self, index: usize) -> Option<&Chapter> {
        if !self.contains(index) {
            return None;
        }
        self.chapters
            .iter()
            .filter(|chapter| chapter.start_index() <= index)
            .max_by_key(|chapter| chapter.page)
    }

    /// Check the page count and chapter list for consistency.
    pub fn validate(&self) -> Result<()> {
        if self.total_pages == 0 {
            return Err(Error::Config("document must have at least one page".into()));
        }
        let mut previous = 0;
        for chapter in &self.chapters {
            if chapter.page == 0 || chapter.page > self.total_pages {
                return Err(Error::Config(format!(
                    "chapter '{}' starts on page {} outside 1..={}",
                    chapter.title, chapter.page, self.total_pages
                )));
            }
            if chapter.page < previous {
                return Err(Error::Config(format!(
                    "chapter '{}' is out of order (page {} after page {previous})",
                    chapter.title, chapter.page
                )));
            }
            previous = chapter.page;
        }
        Ok(())
    }
}

impl Default for DocumentDescriptor {
    fn default() -> Self {
        Self::new(241).with_chapters(vec![Chapter::new("Cover", 1)])
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_page_key_from_index_is_one_based() {
        assert_eq!(PageKey::from_index(0).to_string(), "page_1");
        assert_eq!(PageKey::from_index(240).to_string(), "page_241");
        assert_eq!(PageKey::from_index(9).index(), 9);
    }

    #[test]
    fn test_page_key_parse_rejects_foreign_names() {
        assert_eq!(PageKey::parse("page_12").map(PageKey::number), Some(12));
        assert!(PageKey::parse("page_0").is_none());
        assert!(PageKey::parse("page_").is_none());
        assert!(PageKey::parse("page_-1").is_none());
        assert!(PageKey::parse("page_1a").is_none());
        assert!(PageKey::parse("thumb_1").is_none());
    }

    #[test]
    fn test_data_url_preserves_every_byte() {
        let bytes: Vec<u8> = (0..=255).collect();
        let blob = PageBlob::new("image/png", bytes.clone());
        let decoded = PageBlob::from_data_url(&blob.to_data_url()).unwrap();
        assert_eq!(decoded.bytes(), bytes.as_slice());
        assert_eq!(decoded.mime(), "image/png");
    }

    #[test]
    fn test_data_url_rejects_malformed_input() {
        assert!(PageBlob::from_data_url("image/jpeg;base64,AAAA").is_err());
        assert!(PageBlob::from_data_url("data:image/jpeg;base64").is_err());
        assert!(PageBlob::from_data_url("data:image/jpeg,AAAA").is_err());
        assert!(PageBlob::from_data_url("data:image/jpeg;base64,***").is_err());
    }

    #[test]
    fn test_empty_blob_round_trips() {
        let blob = PageBlob::new(DEFAULT_MIME, Vec::new());
        assert!(blob.is_empty());
        assert_eq!(PageBlob::from_data_url(&blob.to_data_url()).unwrap(), blob);
    }

    #[test]
    fn test_stored_entry_uses_camel_case() {
        let entry = StoredEntry::new(PageKey::from_index(2), &PageBlob::new("image/jpeg", vec![1]));
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["key"], "page_3");
        assert!(json["dataUrl"].as_str().unwrap().starts_with("data:image/jpeg;base64,"));
        assert!(json.get("storedAt").is_some());
    }

    #[test]
    fn test_chapter_for_picks_latest_started_chapter() {
        let doc = DocumentDescriptor::new(20).with_chapters(vec![
            Chapter::new("Cover", 1),
            Chapter::new("Alphabet", 5),
            Chapter::new("Rules", 17),
        ]);

        assert_eq!(doc.chapter_for(0).unwrap().title, "Cover");
        assert_eq!(doc.chapter_for(3).unwrap().title, "Cover");
        assert_eq!(doc.chapter_for(4).unwrap().title, "Alphabet");
        assert_eq!(doc.chapter_for(19).unwrap().title, "Rules");
        assert!(doc.chapter_for(20).is_none());
    }

    #[test]
    fn test_validate_rejects_inconsistent_documents() {
        assert!(DocumentDescriptor::new(0).validate().is_err());
        assert!(
            DocumentDescriptor::new(5)
                .with_chapters(vec![Chapter::new("Late", 6)])
                .validate()
                .is_err()
        );
        assert!(
            DocumentDescriptor::new(10)
                .with_chapters(vec![Chapter::new("B", 5), Chapter::new("A", 2)])
                .validate()
                .is_err()
        );
        assert!(DocumentDescriptor::default().validate().is_ok());
    }
}
