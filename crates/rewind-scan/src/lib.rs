//! Concurrent traversal engine for versioned buckets.
//!
//! # Overview
//!
//! `rewind-scan` walks every folder of a bucket, listing all object versions
//! and delete markers, and hands each record to a [`RecordConsumer`]. Key
//! features:
//!
//! - **Bounded concurrency**: at most `max_concurrent_scans` listings in flight
//! - **Dynamic fan-out**: child folders are discovered while listing and
//!   queued; the queue closes when no folder is outstanding
//! - **Exclusion pruning** at bucket, folder and object level
//! - **Fault isolation**: a failed folder or a panicking consumer becomes a
//!   warning, never a failed scan
//! - **Progress updates** via broadcast channels
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use rewind_resolve::{MemoryStore, Resolver};
//! use rewind_scan::{S3Lister, ScanConfig, Scanner};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run(client: aws_sdk_s3::Client) -> Result<(), rewind_scan::ScanError> {
//! let config = ScanConfig::new("my-bucket");
//! let store = Arc::new(MemoryStore::new());
//! let resolver = Arc::new(Resolver::new(Arc::clone(&store), config.target_time));
//!
//! let scanner = Scanner::new(Arc::new(S3Lister::new(client)), config);
//! let outcome = scanner.scan(resolver, CancellationToken::new()).await?;
//! println!("{} pages, {} objects", outcome.stats.pages, outcome.stats.objects);
//! # Ok(())
//! # }
//! ```

mod lister;
mod progress;
mod s3;
mod scanner;
mod traversal;

pub use lister::{ListError, ListVersionsPage, ListVersionsRequest, VersionLister, VersioningStatus};
pub use progress::ScanProgress;
pub use s3::S3Lister;
pub use scanner::Scanner;

// Re-export core types for convenience
pub use rewind_core::{
    ExclusionMatcher, FolderTask, ObjectVersionRecord, RecordConsumer, ScanConfig, ScanError,
    ScanOutcome, ScanStatistics, ScanWarning, StatsSnapshot, WarningKind,
};
