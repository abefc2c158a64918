//! Per-key point-in-time resolution.

use std::cmp::Ordering;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::trace;

use rewind_core::{ObjectVersionRecord, RecordConsumer, ResolveError, ResolvedVersion};

use crate::store::ResolutionStore;

/// What resolving one record did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Written after the target time; dropped without touching the store.
    Future,
    /// First record seen for its key.
    Inserted,
    /// Replaced the previous winner.
    Replaced,
    /// Lost against the current winner.
    Kept,
}

/// Whether `candidate` should replace `current` as the winner for its key.
///
/// Newer timestamps win. On equal timestamps a record flagged as the head
/// version beats one that is not; when both or neither are flagged, the
/// lexicographically greater version id wins, so the result never depends
/// on arrival order.
pub fn supersedes(candidate: &ObjectVersionRecord, current: &ResolvedVersion) -> bool {
    match candidate.last_modified.cmp(&current.last_modified) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => match (candidate.is_latest, current.is_latest) {
            (true, false) => true,
            (false, true) => false,
            _ => candidate.version_id > current.version_id,
        },
    }
}

/// Applies the resolution rule to records against a [`ResolutionStore`].
#[derive(Debug)]
pub struct Resolver<S: ?Sized> {
    store: Arc<S>,
    target_time: DateTime<Utc>,
}

impl<S: ResolutionStore + ?Sized> Resolver<S> {
    /// Create a resolver for the given restore instant.
    pub fn new(store: Arc<S>, target_time: DateTime<Utc>) -> Self {
        Self { store, target_time }
    }

    /// The restore instant.
    pub fn target_time(&self) -> DateTime<Utc> {
        self.target_time
    }

    /// The store winners are committed to.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Resolve one record in a single store transaction.
    pub fn resolve(&self, record: &ObjectVersionRecord) -> Result<Resolution, ResolveError> {
        if record.last_modified > self.target_time {
            trace!(key = %record.key, version_id = %record.version_id, "skipping version newer than target");
            return Ok(Resolution::Future);
        }

        let mut resolution = Resolution::Kept;
        self.store
            .update(&record.key, &mut |current| match current {
                None => {
                    resolution = Resolution::Inserted;
                    Some(record.to_resolved())
                }
                Some(current) if supersedes(record, current) => {
                    resolution = Resolution::Replaced;
                    Some(record.to_resolved())
                }
                Some(_) => {
                    resolution = Resolution::Kept;
                    None
                }
            })
            .map_err(|source| ResolveError::store(record.key.as_str(), source))?;

        Ok(resolution)
    }
}

impl<S: ResolutionStore + ?Sized> RecordConsumer for Resolver<S> {
    fn consume(&self, record: &ObjectVersionRecord) -> Result<(), ResolveError> {
        self.resolve(record).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn resolver(target: i64) -> Resolver<MemoryStore> {
        Resolver::new(Arc::new(MemoryStore::new()), at(target))
    }

    #[test]
    fn test_future_version_is_dropped() {
        let resolver = resolver(9);
        let record = ObjectVersionRecord::version("k1", "v1", at(10), true);
        assert_eq!(resolver.resolve(&record).unwrap(), Resolution::Future);
        assert!(resolver.store().is_empty());
    }

    #[test]
    fn test_version_at_target_time_counts() {
        let resolver = resolver(10);
        let record = ObjectVersionRecord::version("k1", "v1", at(10), false);
        assert_eq!(resolver.resolve(&record).unwrap(), Resolution::Inserted);
    }

    #[test]
    fn test_point_in_time_scenario() {
        let resolver = resolver(9);
        resolver
            .resolve(&ObjectVersionRecord::version("k1", "v1", at(10), true))
            .unwrap();
        resolver
            .resolve(&ObjectVersionRecord::version("k1", "v2", at(8), false))
            .unwrap();

        let winner = resolver.store().get("k1").unwrap().unwrap();
        assert_eq!(winner.version_id, "v2");
        assert!(!winner.is_latest);
    }

    #[test]
    fn test_newer_replaces_older() {
        let resolver = resolver(100);
        let old = ObjectVersionRecord::version("k", "a", at(1), false);
        let new = ObjectVersionRecord::version("k", "b", at(2), true);
        assert_eq!(resolver.resolve(&old).unwrap(), Resolution::Inserted);
        assert_eq!(resolver.resolve(&new).unwrap(), Resolution::Replaced);
        assert_eq!(resolver.resolve(&old).unwrap(), Resolution::Kept);
    }

    #[test]
    fn test_latest_wins_timestamp_tie() {
        let resolver = resolver(100);
        let head = ObjectVersionRecord::version("k", "a", at(5), true);
        let other = ObjectVersionRecord::version("k", "z", at(5), false);
        resolver.resolve(&other).unwrap();
        assert_eq!(resolver.resolve(&head).unwrap(), Resolution::Replaced);
        assert_eq!(resolver.resolve(&other).unwrap(), Resolution::Kept);
        assert_eq!(resolver.store().get("k").unwrap().unwrap().version_id, "a");
    }

    #[test]
    fn test_version_id_tie_break() {
        let resolver = resolver(100);
        let a = ObjectVersionRecord::version("k1", "vA", at(5), false);
        let b = ObjectVersionRecord::version("k1", "vB", at(5), false);
        resolver.resolve(&b).unwrap();
        assert_eq!(resolver.resolve(&a).unwrap(), Resolution::Kept);
        assert_eq!(resolver.store().get("k1").unwrap().unwrap().version_id, "vB");
    }

    #[test]
    fn test_both_latest_falls_back_to_version_id() {
        let resolver = resolver(100);
        let low = ObjectVersionRecord::version("k", "v1", at(5), true);
        let high = ObjectVersionRecord::version("k", "v2", at(5), true);
        resolver.resolve(&high).unwrap();
        assert_eq!(resolver.resolve(&low).unwrap(), Resolution::Kept);
        assert_eq!(resolver.store().get("k").unwrap().unwrap().version_id, "v2");

        let current = low.to_resolved();
        assert!(supersedes(&high, &current));
        assert!(!supersedes(&low, &high.to_resolved()));
    }

    #[test]
    fn test_reapplying_is_idempotent() {
        let resolver = resolver(100);
        let record = ObjectVersionRecord::delete_marker("k", "v1", at(3), true);
        resolver.resolve(&record).unwrap();
        let before = resolver.store().get("k").unwrap();
        assert_eq!(resolver.resolve(&record).unwrap(), Resolution::Kept);
        assert_eq!(resolver.store().get("k").unwrap(), before);
    }

    #[test]
    fn test_consume_delegates_to_resolve() {
        let resolver = resolver(100);
        let consumer: &dyn RecordConsumer = &resolver;
        consumer
            .consume(&ObjectVersionRecord::version("k", "v", at(1), false))
            .unwrap();
        assert_eq!(resolver.store().len(), 1);
    }
}
