//! Point-in-time version resolution for rewind.
//!
//! Records stream in from many folder workers in no particular order. For
//! every key the [`Resolver`] keeps exactly one winner in a
//! [`ResolutionStore`]: the most recent version written at or before the
//! target instant.
//!
//! # Resolution rule
//!
//! 1. Records newer than the target time are dropped.
//! 2. A newer record replaces an older one.
//! 3. On equal timestamps the record flagged as the current head wins.
//! 4. Otherwise the lexicographically greater version id wins.
//!
//! The rule is commutative and idempotent, so the final store contents do
//! not depend on the order in which workers deliver records.
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use chrono::{DateTime, Utc};
//! use rewind_core::ObjectVersionRecord;
//! use rewind_resolve::{MemoryStore, ResolutionStore, Resolver};
//!
//! let target = DateTime::<Utc>::from_timestamp(9, 0).unwrap();
//! let resolver = Resolver::new(Arc::new(MemoryStore::new()), target);
//!
//! let newer = ObjectVersionRecord::version("k1", "v1", DateTime::from_timestamp(10, 0).unwrap(), true);
//! let older = ObjectVersionRecord::version("k1", "v2", DateTime::from_timestamp(8, 0).unwrap(), false);
//! resolver.resolve(&newer).unwrap();
//! resolver.resolve(&older).unwrap();
//!
//! let winner = resolver.store().get("k1").unwrap().unwrap();
//! assert_eq!(winner.version_id, "v2");
//! ```

mod resolver;
mod store;

pub use resolver::{Resolution, Resolver, supersedes};
pub use store::{MemoryStore, ResolutionStore, StoreIter};

// Re-export core types
pub use rewind_core::{ObjectVersionRecord, ResolveError, ResolvedVersion, StoreError};
