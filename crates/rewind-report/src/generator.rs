//! Restore manifest writer.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use tracing::{debug, info};

use rewind_core::ResolvedVersion;
use rewind_resolve::ResolutionStore;

use crate::error::ReportError;
use crate::filter::{ReportFilter, skip_delete_markers, skip_latest};

/// Characters left as-is in an escaped key: unreserved plus `$&+:=@`.
/// Everything else, `/` included, is percent-encoded.
const KEY_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b':')
    .remove(b'=')
    .remove(b'@');

/// Escape an object key as a single URL path segment.
pub fn escape_key(key: &str) -> String {
    utf8_percent_encode(key, KEY_ESCAPE).to_string()
}

/// Counts from one report run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportSummary {
    /// Lines written.
    pub written: u64,
    /// Entries rejected by a filter.
    pub skipped: u64,
}

/// Writes one `bucket,key,version_id` line per resolved entry that passes
/// every filter.
pub struct ReportGenerator {
    bucket: String,
    filters: Vec<ReportFilter>,
}

impl ReportGenerator {
    /// Create a generator for `bucket` that keeps every entry.
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            filters: Vec::new(),
        }
    }

    /// Add a filter. An entry is written only if every filter keeps it.
    pub fn with_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&str, &ResolvedVersion) -> bool + Send + Sync + 'static,
    {
        self.filters.push(Box::new(filter));
        self
    }

    /// Skip latest versions and delete markers unless asked to include them.
    pub fn with_default_policy(self, include_latest: bool, include_delete_markers: bool) -> Self {
        let generator = if include_latest {
            self
        } else {
            self.with_filter(skip_latest)
        };
        if include_delete_markers {
            generator
        } else {
            generator.with_filter(skip_delete_markers)
        }
    }

    /// The bucket named on every line.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Whether `entry` passes every filter.
    pub fn keeps(&self, key: &str, entry: &ResolvedVersion) -> bool {
        self.filters.iter().all(|filter| filter(key, entry))
    }

    /// Write the report for every entry in `store` to `out`.
    pub fn generate<S, W>(&self, store: &S, mut out: W) -> Result<ReportSummary, ReportError>
    where
        S: ResolutionStore + ?Sized,
        W: Write,
    {
        let mut summary = ReportSummary::default();
        for entry in store.iter() {
            let (key, version) = entry?;
            if !self.keeps(&key, &version) {
                summary.skipped += 1;
                continue;
            }
            self.write_line(&mut out, &key, &version)?;
            summary.written += 1;
        }
        out.flush()?;

        info!(
            written = summary.written,
            skipped = summary.skipped,
            "report generated"
        );
        Ok(summary)
    }

    /// Create (or truncate) `path` and write the report into it.
    pub fn write_to_path<S>(&self, store: &S, path: &Path) -> Result<ReportSummary, ReportError>
    where
        S: ResolutionStore + ?Sized,
    {
        debug!(path = %path.display(), "writing report");
        let file = File::create(path)?;
        self.generate(store, BufWriter::new(file))
    }

    fn write_line<W: Write>(&self, out: &mut W, key: &str, version: &ResolvedVersion) -> std::io::Result<()> {
        write_field(out, &self.bucket)?;
        out.write_all(b",")?;
        write_field(out, &escape_key(key))?;
        out.write_all(b",")?;
        write_field(out, &version.version_id)?;
        out.write_all(b"\n")
    }
}

/// Write one CSV field, quoting it when it cannot stand bare.
fn write_field<W: Write>(out: &mut W, field: &str) -> std::io::Result<()> {
    let needs_quotes = field.starts_with(' ')
        || field.starts_with('\t')
        || field.contains([',', '"', '\r', '\n']);
    if !needs_quotes {
        return out.write_all(field.as_bytes());
    }
    out.write_all(b"\"")?;
    out.write_all(field.replace('"', "\"\"").as_bytes())?;
    out.write_all(b"\"")
}
