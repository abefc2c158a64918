//! Error types for scanning and resolution.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fatal errors that abort a scan before or during setup.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The bucket does not have versioning enabled.
    #[error("Bucket {bucket} is not versioned (versioning status: {status})")]
    NotVersioned { bucket: String, status: String },

    /// The remote API could not be reached during setup.
    #[error("Failed to query bucket {bucket}: {message}")]
    Remote { bucket: String, message: String },

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Other error.
    #[error("{message}")]
    Other { message: String },
}

impl ScanError {
    /// Whether this is the versioning precondition failure.
    pub fn is_not_versioned(&self) -> bool {
        matches!(self, Self::NotVersioned { .. })
    }
}

/// Failure of the resolution store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend could not complete the transaction.
    #[error("store unavailable: {message}")]
    Unavailable { message: String },

    /// A stored entry could not be decoded.
    #[error("corrupt entry: {message}")]
    Corrupt { message: String },
}

/// Failure to resolve a single record.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The store transaction for `key` failed.
    #[error("error handling key {key}: {source}")]
    Store {
        key: String,
        #[source]
        source: StoreError,
    },
}

impl ResolveError {
    /// Wrap a store failure with the key it happened on.
    pub fn store(key: impl Into<String>, source: StoreError) -> Self {
        Self::Store {
            key: key.into(),
            source,
        }
    }

    /// The key the failure happened on.
    pub fn key(&self) -> &str {
        match self {
            Self::Store { key, .. } => key,
        }
    }
}

/// Kind of scan warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum WarningKind {
    /// Listing a folder failed; its subtree was not discovered.
    ListFailed,
    /// A record could not be committed to the resolution store.
    ResolveFailed,
    /// The record consumer panicked on one record.
    ConsumerPanicked,
    /// A folder worker task died unexpectedly.
    WorkerFailed,
}

/// Non-fatal problem encountered during a scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanWarning {
    /// Folder prefix or object key the warning is about.
    pub location: String,
    /// Human-readable message.
    pub message: String,
    /// Kind of warning.
    pub kind: WarningKind,
}

impl ScanWarning {
    /// Create a new scan warning.
    pub fn new(location: impl Into<String>, message: impl Into<String>, kind: WarningKind) -> Self {
        Self {
            location: location.into(),
            message: message.into(),
            kind,
        }
    }

    /// Create a warning for a folder whose listing failed.
    pub fn list_failed(prefix: impl Into<String>, error: &impl std::fmt::Display) -> Self {
        let prefix = prefix.into();
        Self {
            message: format!("Failed to fetch prefix '{prefix}': {error}"),
            location: prefix,
            kind: WarningKind::ListFailed,
        }
    }

    /// Create a warning for a record that failed to resolve.
    pub fn resolve_failed(error: &ResolveError) -> Self {
        Self {
            location: error.key().to_string(),
            message: error.to_string(),
            kind: WarningKind::ResolveFailed,
        }
    }

    /// Create a warning for a consumer panic.
    pub fn consumer_panicked(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            location: key.into(),
            message: format!("Object processing function panicked: {}", message.into()),
            kind: WarningKind::ConsumerPanicked,
        }
    }
}
