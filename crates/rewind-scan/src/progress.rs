//! Scan progress reporting.

use std::time::{Duration, Instant};

use rewind_core::ScanStatistics;

/// Progress information during a scan.
#[derive(Debug, Clone)]
pub struct ScanProgress {
    /// Listing pages fetched so far.
    pub pages: u64,
    /// Versions and delete markers observed so far.
    pub objects: u64,
    /// Folders fully processed so far.
    pub folders_completed: u64,
    /// Folders discovered but not yet completed.
    pub folders_pending: usize,
    /// Number of warnings encountered.
    pub errors_count: u64,
    /// Time elapsed since scan started.
    pub elapsed: Duration,
}

impl ScanProgress {
    /// Create initial progress state.
    pub fn new() -> Self {
        Self {
            pages: 0,
            objects: 0,
            folders_completed: 0,
            folders_pending: 0,
            errors_count: 0,
            elapsed: Duration::ZERO,
        }
    }

    /// Calculate scan rate in records per second.
    pub fn objects_per_second(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.objects as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }
}

impl Default for ScanProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds progress snapshots from the live counters.
#[derive(Debug)]
pub(crate) struct ProgressTracker {
    start_time: Instant,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn snapshot(&self, stats: &ScanStatistics, pending: usize, errors: usize) -> ScanProgress {
        ScanProgress {
            pages: stats.pages(),
            objects: stats.objects(),
            folders_completed: stats.folders(),
            folders_pending: pending,
            errors_count: errors as u64,
            elapsed: self.elapsed(),
        }
    }
}
