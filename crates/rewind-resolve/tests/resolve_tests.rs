use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;

use chrono::{DateTime, Utc};
use itertools::Itertools;
use rewind_resolve::{
    MemoryStore, ObjectVersionRecord, ResolutionStore, ResolveError, ResolvedVersion, Resolver,
    StoreError, StoreIter,
};

fn at(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap()
}

fn snapshot(store: &MemoryStore) -> BTreeMap<String, ResolvedVersion> {
    store.iter().map(|entry| entry.unwrap()).collect()
}

fn apply(records: &[&ObjectVersionRecord], target: i64) -> BTreeMap<String, ResolvedVersion> {
    let store = Arc::new(MemoryStore::new());
    let resolver = Resolver::new(Arc::clone(&store), at(target));
    for record in records {
        resolver.resolve(record).unwrap();
    }
    snapshot(&store)
}

fn fixture() -> Vec<ObjectVersionRecord> {
    vec![
        ObjectVersionRecord::version("a", "v1", at(1), false),
        ObjectVersionRecord::version("a", "v2", at(4), false),
        ObjectVersionRecord::delete_marker("a", "v3", at(6), true),
        ObjectVersionRecord::version("b", "x1", at(5), false),
        ObjectVersionRecord::version("b", "x2", at(5), false),
        ObjectVersionRecord::version("b", "x0", at(5), true),
        ObjectVersionRecord::version("c", "y1", at(7), true),
    ]
}

#[test]
fn test_resolution_is_commutative() {
    let records = fixture();
    let expected = apply(&records.iter().collect::<Vec<_>>(), 5);

    for permutation in records.iter().permutations(records.len()) {
        assert_eq!(apply(&permutation, 5), expected);
    }

    assert_eq!(expected["a"].version_id, "v2");
    assert_eq!(expected["b"].version_id, "x0");
    assert!(!expected.contains_key("c"));
}

#[test]
fn test_resolution_is_idempotent() {
    let records = fixture();
    let once = apply(&records.iter().collect::<Vec<_>>(), 10);
    let twice = apply(&records.iter().chain(records.iter()).collect::<Vec<_>>(), 10);
    assert_eq!(once, twice);
    assert!(once["a"].is_delete_marker);
}

#[test]
fn test_future_records_never_touch_the_store() {
    let records = fixture();
    let resolved = apply(&records.iter().collect::<Vec<_>>(), 0);
    assert!(resolved.is_empty());
}

#[test]
fn test_tie_break_independent_of_arrival_order() {
    let a = ObjectVersionRecord::version("k1", "vA", at(5), false);
    let b = ObjectVersionRecord::version("k1", "vB", at(5), false);
    assert_eq!(apply(&[&a, &b], 10)["k1"].version_id, "vB");
    assert_eq!(apply(&[&b, &a], 10)["k1"].version_id, "vB");
}

#[test]
fn test_two_latest_records_resolve_the_same_in_any_order() {
    let a = ObjectVersionRecord::version("k", "vA", at(5), true);
    let b = ObjectVersionRecord::version("k", "vB", at(5), true);
    assert_eq!(apply(&[&a, &b], 10)["k"].version_id, "vB");
    assert_eq!(apply(&[&b, &a], 10)["k"].version_id, "vB");
}

#[test]
fn test_concurrent_producers_converge() {
    let records: Vec<ObjectVersionRecord> = (0..200i64)
        .map(|i| {
            ObjectVersionRecord::version(
                format!("key-{}", i % 7),
                format!("ver-{i:03}"),
                at(i % 13),
                false,
            )
        })
        .collect();
    let expected = apply(&records.iter().collect::<Vec<_>>(), 100);

    for _ in 0..5 {
        let store = Arc::new(MemoryStore::new());
        let resolver = Arc::new(Resolver::new(Arc::clone(&store), at(100)));
        let handles: Vec<_> = records
            .chunks(17)
            .map(|chunk| {
                let resolver = Arc::clone(&resolver);
                let chunk = chunk.to_vec();
                thread::spawn(move || {
                    for record in chunk.iter().rev() {
                        resolver.resolve(record).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(snapshot(&store), expected);
    }
}

/// A store whose transactions always fail.
struct BrokenStore;

impl ResolutionStore for BrokenStore {
    fn get(&self, _key: &str) -> Result<Option<ResolvedVersion>, StoreError> {
        Ok(None)
    }

    fn put(&self, _key: &str, _value: ResolvedVersion) -> Result<(), StoreError> {
        Err(StoreError::Unavailable { message: "read-only".into() })
    }

    fn update(
        &self,
        _key: &str,
        _decide: &mut dyn FnMut(Option<&ResolvedVersion>) -> Option<ResolvedVersion>,
    ) -> Result<bool, StoreError> {
        Err(StoreError::Unavailable { message: "read-only".into() })
    }

    fn iter(&self) -> StoreIter<'_> {
        Box::new(std::iter::empty())
    }

    fn len(&self) -> usize {
        0
    }
}

#[test]
fn test_store_failure_is_wrapped_with_key() {
    let resolver = Resolver::new(Arc::new(BrokenStore), at(10));
    let err = resolver
        .resolve(&ObjectVersionRecord::version("docs/readme.md", "v1", at(1), false))
        .unwrap_err();

    let ResolveError::Store { key, source } = err;
    assert_eq!(key, "docs/readme.md");
    assert!(matches!(source, StoreError::Unavailable { .. }));
}

#[test]
fn test_future_record_skips_failing_store() {
    let resolver = Resolver::new(Arc::new(BrokenStore), at(10));
    let record = ObjectVersionRecord::version("k", "v1", at(11), true);
    assert!(resolver.resolve(&record).is_ok());
}

#[test]
fn test_resolver_over_trait_object() {
    let store: Arc<dyn ResolutionStore> = Arc::new(MemoryStore::new());
    let resolver = Resolver::new(Arc::clone(&store), at(10));
    resolver
        .resolve(&ObjectVersionRecord::version("k", "v1", at(1), false))
        .unwrap();
    assert_eq!(store.len(), 1);
}
