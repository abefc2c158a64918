//! Scan configuration types.

use chrono::{DateTime, Utc};
use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::exclusion::{ExclusionMatcher, scan_roots};

/// Default number of folders listed concurrently.
pub const DEFAULT_MAX_CONCURRENT_SCANS: usize = 100;

/// Default capacity of the per-folder record hand-off.
pub const DEFAULT_RECORD_BUFFER: usize = 1000;

/// Configuration for scanning operations.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct ScanConfig {
    /// Bucket to scan.
    pub bucket: String,

    /// Restore instant. Versions written after it are ignored.
    #[builder(default = "Utc::now()")]
    #[serde(default = "Utc::now")]
    pub target_time: DateTime<Utc>,

    /// Prefixes to start traversal from (empty = whole bucket).
    #[builder(default)]
    #[serde(default)]
    pub scan_roots: Vec<String>,

    /// Paths to leave out of the scan.
    #[builder(default)]
    #[serde(default)]
    pub exclude_paths: Vec<String>,

    /// Maximum number of folders listed at the same time.
    #[builder(default = "DEFAULT_MAX_CONCURRENT_SCANS")]
    #[serde(default = "default_max_concurrent_scans")]
    pub max_concurrent_scans: usize,

    /// Records buffered between a folder's listing and its consumer.
    #[builder(default = "DEFAULT_RECORD_BUFFER")]
    #[serde(default = "default_record_buffer")]
    pub record_buffer: usize,

    /// Path separator used for folder grouping.
    #[builder(default = "'/'")]
    #[serde(default = "default_separator")]
    pub separator: char,

    /// Depth from which discovered folders are listed flat (None = never).
    #[builder(default)]
    #[serde(default)]
    pub flat_depth: Option<u32>,
}

fn default_max_concurrent_scans() -> usize {
    DEFAULT_MAX_CONCURRENT_SCANS
}

fn default_record_buffer() -> usize {
    DEFAULT_RECORD_BUFFER
}

fn default_separator() -> char {
    '/'
}

impl ScanConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        match self.bucket {
            Some(ref bucket) if bucket.trim().is_empty() => {
                return Err("Bucket name cannot be empty".to_string());
            }
            None => return Err("Bucket name is required".to_string()),
            _ => {}
        }
        if self.max_concurrent_scans == Some(0) {
            return Err("max_concurrent_scans must be at least 1".to_string());
        }
        if self.record_buffer == Some(0) {
            return Err("record_buffer must be at least 1".to_string());
        }
        if let Some(Some(0)) = self.flat_depth {
            return Err("flat_depth must be at least 1".to_string());
        }
        Ok(())
    }
}

impl ScanConfig {
    /// Create a new scan config builder.
    pub fn builder() -> ScanConfigBuilder {
        ScanConfigBuilder::default()
    }

    /// Create a simple config scanning the whole bucket as of now.
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            target_time: Utc::now(),
            scan_roots: Vec::new(),
            exclude_paths: Vec::new(),
            max_concurrent_scans: DEFAULT_MAX_CONCURRENT_SCANS,
            record_buffer: DEFAULT_RECORD_BUFFER,
            separator: '/',
            flat_depth: None,
        }
    }

    /// Check values a deserialized config could carry unchecked.
    pub fn validate(&self) -> Result<(), String> {
        if self.bucket.trim().is_empty() {
            return Err("Bucket name cannot be empty".to_string());
        }
        if self.max_concurrent_scans == 0 {
            return Err("max_concurrent_scans must be at least 1".to_string());
        }
        if self.record_buffer == 0 {
            return Err("record_buffer must be at least 1".to_string());
        }
        if self.flat_depth == Some(0) {
            return Err("flat_depth must be at least 1".to_string());
        }
        Ok(())
    }

    /// Normalized, deduplicated scan roots with nested roots folded away.
    ///
    /// `[""]` when none are configured or when one of them is `/`.
    pub fn normalized_roots(&self) -> Vec<String> {
        scan_roots(&self.scan_roots, self.separator)
    }

    /// Build the exclusion matcher for this configuration.
    pub fn exclusion_matcher(&self) -> ExclusionMatcher {
        ExclusionMatcher::new(&self.exclude_paths, &self.normalized_roots(), self.separator)
    }
}
