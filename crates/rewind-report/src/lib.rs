//! Restore manifest generation for rewind.
//!
//! After a scan, the resolution store holds one winning version per key.
//! [`ReportGenerator`] walks the store and writes one
//! `bucket,escaped_key,version_id` line per entry that survives its filters,
//! ready to feed a bulk copy job.
//!
//! ```rust
//! use rewind_report::{ReportGenerator, exclude_paths};
//! use rewind_resolve::MemoryStore;
//!
//! let store = MemoryStore::new();
//! let generator = ReportGenerator::new("my-bucket")
//!     .with_default_policy(false, false)
//!     .with_filter(exclude_paths(&["tmp/"], '/'));
//!
//! let mut out = Vec::new();
//! let summary = generator.generate(&store, &mut out).unwrap();
//! assert_eq!(summary.written, 0);
//! ```

mod error;
mod filter;
mod generator;

pub use error::ReportError;
pub use filter::{ReportFilter, exclude_paths, skip_delete_markers, skip_latest};
pub use generator::{ReportGenerator, ReportSummary, escape_key};
