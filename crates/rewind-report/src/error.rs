use thiserror::Error;

use rewind_core::StoreError;

/// Errors while writing a report.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Writing the output failed.
    #[error("failed to write report: {0}")]
    Io(#[from] std::io::Error),

    /// Reading the resolution store failed.
    #[error("failed to read resolved versions: {0}")]
    Store(#[from] StoreError),
}
