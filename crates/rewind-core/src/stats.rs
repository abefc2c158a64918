//! Scan statistics and the final scan outcome.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ScanWarning, WarningKind};

/// Price of one listing request in USD (0.005 per 1000 requests).
pub const LIST_PRICE_PER_PAGE: f64 = 0.000_005;

/// Thread-safe counters shared by all folder workers.
///
/// Each counter is independent and only ever incremented.
#[derive(Debug, Default)]
pub struct ScanStatistics {
    pages: AtomicU64,
    objects: AtomicU64,
    folders: AtomicU64,
}

impl ScanStatistics {
    /// Create zeroed statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `count` fetched listing pages.
    pub fn add_pages(&self, count: u64) {
        self.pages.fetch_add(count, Ordering::Relaxed);
    }

    /// Record `count` observed versions and delete markers.
    pub fn add_objects(&self, count: u64) {
        self.objects.fetch_add(count, Ordering::Relaxed);
    }

    /// Record `count` completed folders.
    pub fn add_folders(&self, count: u64) {
        self.folders.fetch_add(count, Ordering::Relaxed);
    }

    /// Listing pages fetched so far.
    pub fn pages(&self) -> u64 {
        self.pages.load(Ordering::Relaxed)
    }

    /// Records observed so far, including filtered ones.
    pub fn objects(&self) -> u64 {
        self.objects.load(Ordering::Relaxed)
    }

    /// Folders completed so far.
    pub fn folders(&self) -> u64 {
        self.folders.load(Ordering::Relaxed)
    }

    /// Listing cost so far in USD.
    pub fn cost(&self) -> f64 {
        self.pages() as f64 * LIST_PRICE_PER_PAGE
    }

    /// Read all counters at once.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            pages: self.pages(),
            objects: self.objects(),
            folders: self.folders(),
        }
    }
}

/// Point-in-time copy of [`ScanStatistics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Listing pages fetched.
    pub pages: u64,
    /// Versions and delete markers observed.
    pub objects: u64,
    /// Folders completed.
    pub folders: u64,
}

impl StatsSnapshot {
    /// Listing cost in USD.
    pub fn cost(&self) -> f64 {
        self.pages as f64 * LIST_PRICE_PER_PAGE
    }
}

/// Result of a completed (possibly partial) scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanOutcome {
    /// Final counters.
    pub stats: StatsSnapshot,
    /// Non-fatal problems encountered.
    pub warnings: Vec<ScanWarning>,
    /// Whether the scan was cancelled before traversal finished.
    pub cancelled: bool,
    /// Wall-clock duration of the scan.
    pub duration: Duration,
}

impl ScanOutcome {
    /// Check if there were any warnings during scanning.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Number of warnings of the given kind.
    pub fn count_warnings(&self, kind: WarningKind) -> usize {
        self.warnings.iter().filter(|w| w.kind == kind).count()
    }

    /// Whether any record failed to commit to the resolution store.
    pub fn has_resolve_failures(&self) -> bool {
        self.count_warnings(WarningKind::ResolveFailed) > 0
    }
}
