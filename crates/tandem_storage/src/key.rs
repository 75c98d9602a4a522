//! Storage keys.

use crate::error::{StorageError, StorageResult};
use std::fmt;
use std::path::PathBuf;

/// An ordered, non-empty sequence of validated path segments.
///
/// A key maps deterministically to one document location under the storage
/// root: every segment but the last becomes a directory, the last becomes
/// `<segment>.json`.
///
/// # Validation
///
/// - the key has at least one segment
/// - no segment is empty
/// - no segment begins with `.`
/// - no segment contains `..`, `/`, or `\`
///
/// Violations fail with [`StorageError::InvalidKey`] before anything touches
/// the filesystem.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StorageKey(Vec<String>);

impl StorageKey {
    /// Creates a validated key from segments.
    pub fn new<I, S>(segments: I) -> StorageResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            return Err(StorageError::invalid_key("", "key has no segments"));
        }
        for segment in &segments {
            Self::validate_segment(&segments, segment)?;
        }
        Ok(Self(segments))
    }

    /// Builds a key from segments that came from the store's own layout
    /// (directory walks); skips validation.
    pub(crate) fn from_trusted(segments: Vec<String>) -> Self {
        Self(segments)
    }

    /// Returns the segments.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Returns the last segment.
    #[must_use]
    pub fn leaf(&self) -> &str {
        // Non-empty by construction.
        self.0.last().map(String::as_str).unwrap_or_default()
    }

    /// Returns a new key with `segment` appended.
    pub fn child(&self, segment: impl Into<String>) -> StorageResult<Self> {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self::new(segments)
    }

    /// Returns true if this key starts with every segment of `prefix`.
    #[must_use]
    pub fn starts_with(&self, prefix: &StorageKey) -> bool {
        self.0.len() >= prefix.0.len() && self.0[..prefix.0.len()] == prefix.0[..]
    }

    /// The document location relative to the storage root:
    /// `seg/seg/last.json`.
    pub(crate) fn document_path(&self) -> PathBuf {
        let mut path = PathBuf::new();
        for segment in &self.0[..self.0.len() - 1] {
            path.push(segment);
        }
        path.push(format!("{}.json", self.leaf()));
        path
    }

    /// The container location relative to the storage root, with every
    /// segment as a directory. Used for prefix listing.
    pub(crate) fn container_path(&self) -> PathBuf {
        let mut path = PathBuf::new();
        for segment in &self.0 {
            path.push(segment);
        }
        path
    }

    fn validate_segment(key: &[String], segment: &str) -> StorageResult<()> {
        let rendered = || key.join("/");
        if segment.is_empty() {
            return Err(StorageError::invalid_key(rendered(), "empty segment"));
        }
        if segment.starts_with('.') {
            return Err(StorageError::invalid_key(
                rendered(),
                format!("segment {segment:?} begins with '.'"),
            ));
        }
        if segment.contains("..") {
            return Err(StorageError::invalid_key(
                rendered(),
                format!("segment {segment:?} contains '..'"),
            ));
        }
        if segment.contains('/') || segment.contains('\\') {
            return Err(StorageError::invalid_key(
                rendered(),
                format!("segment {segment:?} contains a path separator"),
            ));
        }
        Ok(())
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}
