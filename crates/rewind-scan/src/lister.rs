//! Remote version-listing contract.

use async_trait::async_trait;
use thiserror::Error;

use rewind_core::ObjectVersionRecord;

/// Versioning state of a bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum VersioningStatus {
    /// Versioning is on; the bucket can be scanned.
    Enabled,
    /// Versioning was turned on once and is now paused.
    Suspended,
    /// Versioning was never configured.
    Disabled,
}

/// Errors from a single listing call.
#[derive(Debug, Error)]
pub enum ListError {
    /// The remote call failed (network, permissions, throttling).
    #[error("{message}")]
    Remote { message: String },

    /// The scan was cancelled while the call was in flight.
    #[error("listing cancelled")]
    Cancelled,

    /// A truncated page carried no continuation markers.
    #[error("truncated listing for prefix '{prefix}' has no continuation markers")]
    MissingMarker { prefix: String },
}

impl ListError {
    /// Create a remote error from any displayable source.
    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote {
            message: message.into(),
        }
    }
}

/// One call to the paginated version listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListVersionsRequest {
    /// Bucket to list.
    pub bucket: String,
    /// Only keys starting with this prefix.
    pub prefix: String,
    /// Group keys up to the next occurrence of this character.
    pub delimiter: Option<char>,
    /// Continue after this key.
    pub key_marker: Option<String>,
    /// Continue after this version of `key_marker`.
    pub version_id_marker: Option<String>,
}

impl ListVersionsRequest {
    /// First page of a listing.
    pub fn new(bucket: impl Into<String>, prefix: impl Into<String>, delimiter: Option<char>) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: prefix.into(),
            delimiter,
            key_marker: None,
            version_id_marker: None,
        }
    }

    /// The request for the page after the one that returned these markers.
    pub fn next_page(&self, key_marker: Option<String>, version_id_marker: Option<String>) -> Self {
        Self {
            key_marker,
            version_id_marker,
            ..self.clone()
        }
    }

    /// Whether this requests the first page.
    pub fn is_first_page(&self) -> bool {
        self.key_marker.is_none() && self.version_id_marker.is_none()
    }
}

/// One page of a version listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListVersionsPage {
    /// Delete markers on this page.
    pub delete_markers: Vec<ObjectVersionRecord>,
    /// Object versions on this page.
    pub versions: Vec<ObjectVersionRecord>,
    /// Child folders one level below the requested prefix.
    pub common_prefixes: Vec<String>,
    /// Whether more pages follow.
    pub truncated: bool,
    /// Key marker for the next page.
    pub next_key_marker: Option<String>,
    /// Version id marker for the next page.
    pub next_version_id_marker: Option<String>,
    /// Listed entries that could not be turned into records.
    pub unreadable: usize,
}

impl ListVersionsPage {
    /// Number of versions and delete markers listed on this page, including
    /// unreadable ones.
    pub fn record_count(&self) -> usize {
        self.delete_markers.len() + self.versions.len() + self.unreadable
    }
}

/// The subset of a versioned object store the scanner needs.
#[async_trait]
pub trait VersionLister: Send + Sync {
    /// Report whether versioning is enabled on `bucket`.
    async fn versioning_status(&self, bucket: &str) -> Result<VersioningStatus, ListError>;

    /// Fetch one page of versions.
    async fn list_versions(&self, request: &ListVersionsRequest) -> Result<ListVersionsPage, ListError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_page_keeps_scope() {
        let first = ListVersionsRequest::new("bucket", "a/", Some('/'));
        assert!(first.is_first_page());

        let next = first.next_page(Some("a/k".into()), Some("v9".into()));
        assert!(!next.is_first_page());
        assert_eq!(next.bucket, "bucket");
        assert_eq!(next.prefix, "a/");
        assert_eq!(next.delimiter, Some('/'));
        assert_eq!(next.key_marker.as_deref(), Some("a/k"));
    }

    #[test]
    fn test_record_count_includes_unreadable_entries() {
        let page = ListVersionsPage {
            versions: vec![ObjectVersionRecord::version("k", "v1", Default::default(), true)],
            unreadable: 2,
            ..Default::default()
        };
        assert_eq!(page.record_count(), 3);
    }

    #[test]
    fn test_versioning_status_display() {
        assert_eq!(VersioningStatus::Suspended.to_string(), "Suspended");
    }
}
