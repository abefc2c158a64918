//! Exclusion rules classified against the configured scan roots.
//!
//! Every exclusion path is normalized and sorted into exactly one tier:
//!
//! - **bucket**: the path is itself a scan root; the root is never seeded.
//! - **root**: the path names exactly one folder directly below a scan root;
//!   the folder and everything beneath it is pruned when it is discovered.
//! - **object**: anything deeper; matching keys are dropped one by one.

use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// The tier an exclusion path was classified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExclusionTier {
    /// Excludes a whole scan root.
    Bucket,
    /// Excludes a folder one level below a scan root, and its subtree.
    RootFolder,
    /// Excludes individual keys under a deeper prefix.
    Object,
}

/// Normalize a path: strip one leading separator and make sure a non-empty
/// result ends with the separator.
pub fn normalize_path(path: &str, separator: char) -> String {
    let trimmed = path.trim();
    let trimmed = trimmed.strip_prefix(separator).unwrap_or(trimmed);
    if trimmed.is_empty() || trimmed.ends_with(separator) {
        trimmed.to_string()
    } else {
        format!("{trimmed}{separator}")
    }
}

/// Expand path flag values into normalized paths.
///
/// Each value may hold several comma-separated paths. Blank entries are
/// dropped. A path naming the bucket root (`/`) overrides every other
/// entry, so the result is then exactly `[""]`.
pub fn path_list<S: AsRef<str>>(values: &[S], separator: char) -> Vec<String> {
    let mut paths = Vec::new();
    for raw in values
        .iter()
        .flat_map(|value| value.as_ref().split(','))
        .map(str::trim)
        .filter(|raw| !raw.is_empty())
    {
        let path = normalize_path(raw, separator);
        if path.is_empty() {
            return vec![String::new()];
        }
        paths.push(path);
    }
    paths.into_iter().unique().collect()
}

/// Scan roots with nested roots folded into their ancestor.
///
/// A root below another root would be listed twice. An empty input means
/// the whole bucket.
pub fn scan_roots<S: AsRef<str>>(values: &[S], separator: char) -> Vec<String> {
    let roots = path_list(values, separator);
    if roots.is_empty() {
        return vec![String::new()];
    }
    roots
        .iter()
        .filter(|root| {
            !roots
                .iter()
                .any(|other| other != *root && root.starts_with(other.as_str()))
        })
        .cloned()
        .collect()
}

/// Answers skip queries during traversal.
#[derive(Debug, Clone, Default)]
pub struct ExclusionMatcher {
    bucket_exclusions: Vec<String>,
    root_exclusions: Vec<String>,
    object_exclusions: Vec<String>,
}

impl ExclusionMatcher {
    /// A matcher that excludes nothing.
    pub fn none() -> Self {
        Self::default()
    }

    /// Classify `exclude_paths` against `scan_roots`.
    ///
    /// Both lists are expanded with [`path_list`]; roots are folded with
    /// [`scan_roots`]. An empty `scan_roots` means the whole bucket, i.e. the
    /// implicit root `""`.
    pub fn new<E, R>(exclude_paths: &[E], scan_roots: &[R], separator: char) -> Self
    where
        E: AsRef<str>,
        R: AsRef<str>,
    {
        let excludes = path_list(exclude_paths, separator);
        if excludes.is_empty() {
            return Self::none();
        }

        let roots = self::scan_roots(scan_roots, separator);
        let mut matcher = Self::none();
        for exclude in excludes {
            match classify(&exclude, &roots, separator) {
                Some(ExclusionTier::Bucket) => matcher.bucket_exclusions.push(exclude),
                Some(ExclusionTier::RootFolder) => matcher.root_exclusions.push(exclude),
                Some(ExclusionTier::Object) => matcher.object_exclusions.push(exclude),
                // An empty path that is not a scan root would match every key.
                None => {}
            }
        }
        matcher
    }

    /// Whether nothing is excluded.
    pub fn is_empty(&self) -> bool {
        self.bucket_exclusions.is_empty()
            && self.root_exclusions.is_empty()
            && self.object_exclusions.is_empty()
    }

    /// True iff `root_prefix` is itself excluded.
    pub fn should_skip_bucket(&self, root_prefix: &str) -> bool {
        self.bucket_exclusions.iter().any(|excluded| excluded == root_prefix)
    }

    /// True iff `folder_prefix` lies at or below a root-tier exclusion.
    pub fn should_skip_root_folder(&self, folder_prefix: &str) -> bool {
        self.root_exclusions
            .iter()
            .any(|excluded| folder_prefix.starts_with(excluded.as_str()))
    }

    /// True iff `object_key` lies below an object-tier exclusion.
    ///
    /// Root-tier exclusions are not consulted: their folders are never listed.
    pub fn should_skip_object(&self, object_key: &str) -> bool {
        self.object_exclusions
            .iter()
            .any(|excluded| object_key.starts_with(excluded.as_str()))
    }

    /// Bucket-tier exclusions, in input order.
    pub fn bucket_exclusions(&self) -> &[String] {
        &self.bucket_exclusions
    }

    /// Root-tier exclusions, in input order.
    pub fn root_exclusions(&self) -> &[String] {
        &self.root_exclusions
    }

    /// Object-tier exclusions, in input order.
    pub fn object_exclusions(&self) -> &[String] {
        &self.object_exclusions
    }
}

fn classify(exclude: &str, roots: &[String], separator: char) -> Option<ExclusionTier> {
    if roots.iter().any(|root| root == exclude) {
        return Some(ExclusionTier::Bucket);
    }
    if exclude.is_empty() {
        return None;
    }
    let one_level_below = roots.iter().any(|root| {
        exclude
            .strip_prefix(root.as_str())
            .is_some_and(|rest| rest.matches(separator).count() == 1)
    });
    if one_level_below {
        Some(ExclusionTier::RootFolder)
    } else {
        Some(ExclusionTier::Object)
    }
}
