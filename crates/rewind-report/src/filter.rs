//! Predicates deciding which resolved entries make it into the report.
//!
//! A filter returns `true` to keep an entry.

use rewind_core::{ResolvedVersion, normalize_path};

/// A boxed report filter.
pub type ReportFilter = Box<dyn Fn(&str, &ResolvedVersion) -> bool + Send + Sync>;

/// Drop entries that are still the current head version.
///
/// Restoring those would copy an object onto itself.
pub fn skip_latest(_key: &str, entry: &ResolvedVersion) -> bool {
    !entry.is_latest
}

/// Drop entries whose winner is a delete marker.
pub fn skip_delete_markers(_key: &str, entry: &ResolvedVersion) -> bool {
    !entry.is_delete_marker
}

/// Drop keys under any of `paths`.
///
/// Paths are normalized the same way as scan exclusions. Paths that
/// normalize to nothing are ignored.
pub fn exclude_paths<P: AsRef<str>>(
    paths: &[P],
    separator: char,
) -> impl Fn(&str, &ResolvedVersion) -> bool + Send + Sync + 'static {
    let excluded: Vec<String> = paths
        .iter()
        .map(|path| normalize_path(path.as_ref(), separator))
        .filter(|path| !path.is_empty())
        .collect();

    move |key: &str, _entry: &ResolvedVersion| {
        !excluded.iter().any(|prefix| key.starts_with(prefix.as_str()))
    }
}
