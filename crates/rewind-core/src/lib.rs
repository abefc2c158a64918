//! Core types and traits for rewind.
//!
//! This crate provides the fundamental data structures shared by the
//! scanner, the resolution engine and the report generator: version
//! records, folder tasks, exclusion rules, statistics and configuration.

mod config;
mod error;
mod exclusion;
mod record;
mod stats;

pub use config::{DEFAULT_MAX_CONCURRENT_SCANS, DEFAULT_RECORD_BUFFER, ScanConfig, ScanConfigBuilder};
pub use error::{ResolveError, ScanError, ScanWarning, StoreError, WarningKind};
pub use exclusion::{ExclusionMatcher, ExclusionTier, normalize_path, path_list, scan_roots};
pub use record::{FolderTask, ObjectVersionRecord, RecordConsumer, ResolvedVersion};
pub use stats::{LIST_PRICE_PER_PAGE, ScanOutcome, ScanStatistics, StatsSnapshot};
