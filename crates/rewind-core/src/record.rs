//! Version records, resolved entries and folder tasks.

use chrono::{DateTime, Utc};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};

use crate::error::ResolveError;

/// One version or delete marker of one key, as reported by the listing API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectVersionRecord {
    /// Object key.
    pub key: CompactString,
    /// Opaque version identifier, ordered lexicographically.
    pub version_id: CompactString,
    /// When this version was written.
    pub last_modified: DateTime<Utc>,
    /// Whether this record is a delete marker.
    pub is_delete_marker: bool,
    /// Whether the store currently considers this the head version.
    pub is_latest: bool,
}

impl ObjectVersionRecord {
    /// Create a record for a regular object version.
    pub fn version(
        key: impl Into<CompactString>,
        version_id: impl Into<CompactString>,
        last_modified: DateTime<Utc>,
        is_latest: bool,
    ) -> Self {
        Self {
            key: key.into(),
            version_id: version_id.into(),
            last_modified,
            is_delete_marker: false,
            is_latest,
        }
    }

    /// Create a record for a delete marker.
    pub fn delete_marker(
        key: impl Into<CompactString>,
        version_id: impl Into<CompactString>,
        last_modified: DateTime<Utc>,
        is_latest: bool,
    ) -> Self {
        Self {
            key: key.into(),
            version_id: version_id.into(),
            last_modified,
            is_delete_marker: true,
            is_latest,
        }
    }

    /// The part of this record kept once it wins resolution.
    pub fn to_resolved(&self) -> ResolvedVersion {
        ResolvedVersion {
            version_id: self.version_id.clone(),
            last_modified: self.last_modified,
            is_latest: self.is_latest,
            is_delete_marker: self.is_delete_marker,
        }
    }
}

/// The per-key winner kept by the resolution store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedVersion {
    /// Winning version identifier.
    pub version_id: CompactString,
    /// When the winning version was written.
    pub last_modified: DateTime<Utc>,
    /// Whether the winner is the current head of the key.
    pub is_latest: bool,
    /// Whether the winner is a delete marker.
    pub is_delete_marker: bool,
}

/// A unit of traversal work: one prefix to list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FolderTask {
    /// Prefix to list. Ends with the separator, or is empty for the bucket root.
    pub prefix: String,
    /// Grouping delimiter. `None` lists every key below `prefix` without
    /// reporting child folders.
    pub delimiter: Option<char>,
    /// Distance from the scan root this task was seeded from.
    pub depth: u32,
}

impl FolderTask {
    /// Create the seed task for a scan root.
    pub fn root(prefix: impl Into<String>, separator: char) -> Self {
        Self {
            prefix: prefix.into(),
            delimiter: Some(separator),
            depth: 0,
        }
    }

    /// Create a task for a folder discovered below `self`.
    ///
    /// Folders at `flat_depth` or deeper are listed without grouping.
    pub fn child(&self, prefix: impl Into<String>, separator: char, flat_depth: Option<u32>) -> Self {
        let depth = self.depth + 1;
        let delimiter = match flat_depth {
            Some(flat) if depth >= flat => None,
            _ => Some(separator),
        };
        Self {
            prefix: prefix.into(),
            delimiter,
            depth,
        }
    }

    /// Whether this task is the seed task of a scan root.
    pub fn is_root(&self, scan_root: &str, separator: char) -> bool {
        self.prefix == scan_root && self.delimiter == Some(separator)
    }

    /// Whether child folders are reported when listing this task.
    pub fn is_grouped(&self) -> bool {
        self.delimiter.is_some()
    }
}

/// Receives every record emitted by the scanner.
///
/// Implementations are called concurrently from many folder companions
/// and must serialize their own state.
pub trait RecordConsumer: Send + Sync {
    /// Consume one record.
    fn consume(&self, record: &ObjectVersionRecord) -> Result<(), ResolveError>;
}
