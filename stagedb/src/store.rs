//! Database handles and the process-wide target registry.
//!
//! A *target* is a named, fully isolated store. Connecting to the same
//! target twice yields handles over the same state; distinct targets
//! never share collections, documents, or indexes. The registry lives
//! for the lifetime of the process.

use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock};

use crate::collection::Collection;
use crate::document::Document;
use crate::errors::{ErrorKind, StoreError, StoreResult};
use crate::pipeline::{self, PipelineStage};

static REGISTRY: LazyLock<DashMap<String, Database>> = LazyLock::new(DashMap::new);

/// Opens (or creates) the store registered under `target`.
///
/// Handles are cheap clones; every handle opened for the same target
/// observes the same collections.
pub fn connect(target: &str) -> StoreResult<Database> {
    if target.trim().is_empty() {
        return Err(StoreError::new(
            "store target must not be empty",
            ErrorKind::InvalidOperation,
        ));
    }
    let db = REGISTRY
        .entry(target.to_string())
        .or_insert_with(|| {
            log::debug!("creating store for target '{}'", target);
            Database::new(target)
        })
        .clone();
    Ok(db)
}

/// Removes `target` from the registry, discarding all of its data.
///
/// Dropping an unknown target is a no-op. Handles opened before the
/// drop keep working against the orphaned state; a later [connect] for
/// the same name starts from scratch.
pub fn drop_target(target: &str) -> StoreResult<()> {
    if REGISTRY.remove(target).is_some() {
        log::debug!("dropped store target '{}'", target);
    }
    Ok(())
}

/// A handle over one registered store target.
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
}

struct DatabaseInner {
    target: String,
    collections: DashMap<String, Collection>,
    read_only: Arc<AtomicBool>,
}

impl Database {
    fn new(target: &str) -> Self {
        Database {
            inner: Arc::new(DatabaseInner {
                target: target.to_string(),
                collections: DashMap::new(),
                read_only: Arc::new(AtomicBool::new(false)),
            }),
        }
    }

    /// The target name this handle was opened for.
    pub fn target(&self) -> &str {
        &self.inner.target
    }

    /// Opens the named collection, creating it empty on first access.
    pub fn collection(&self, name: &str) -> StoreResult<Collection> {
        if name.trim().is_empty() {
            return Err(StoreError::new(
                "collection name must not be empty",
                ErrorKind::InvalidOperation,
            ));
        }
        let collection = self
            .inner
            .collections
            .entry(name.to_string())
            .or_insert_with(|| Collection::new(name, Arc::clone(&self.inner.read_only)))
            .clone();
        Ok(collection)
    }

    /// Runs an aggregation pipeline over the named collection.
    ///
    /// Unlike [collection](Database::collection), aggregating over a
    /// collection that was never opened is an error rather than an
    /// implicit create.
    pub fn aggregate(
        &self,
        collection_name: &str,
        stages: &[PipelineStage],
    ) -> StoreResult<Vec<Document>> {
        let source = self
            .inner
            .collections
            .get(collection_name)
            .map(|entry| entry.clone())
            .ok_or_else(|| {
                StoreError::new(
                    &format!("no such collection '{}'", collection_name),
                    ErrorKind::CollectionNotFound,
                )
            })?;
        pipeline::execute(self, &source, stages)
    }

    /// Names of every collection in this store, sorted.
    pub fn list_collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .collections
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }

    /// Removes every collection, including index declarations.
    pub fn drop_all(&self) -> StoreResult<()> {
        if self.is_read_only() {
            return Err(StoreError::new(
                &format!("store target '{}' is read-only", self.inner.target),
                ErrorKind::ReadOnly,
            ));
        }
        self.inner.collections.clear();
        Ok(())
    }

    /// Whether writes against this store are currently rejected.
    pub fn is_read_only(&self) -> bool {
        self.inner.read_only.load(Ordering::Acquire)
    }

    /// Toggles write rejection for this store and every collection in it.
    pub fn set_read_only(&self, read_only: bool) {
        self.inner.read_only.store(read_only, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;
    use crate::doc_id::DocId;

    fn test_target(suffix: &str) -> String {
        format!("memory://store-test-{}-{}", suffix, DocId::new())
    }

    #[test]
    fn test_same_target_shares_state() {
        let target = test_target("shared");
        let first = connect(&target).unwrap();
        let second = connect(&target).unwrap();
        first
            .collection("users")
            .unwrap()
            .insert_many(vec![doc! { "name": "Alice" }])
            .unwrap();
        assert_eq!(second.collection("users").unwrap().size(), 1);
        drop_target(&target).unwrap();
    }

    #[test]
    fn test_distinct_targets_are_isolated() {
        let left = test_target("left");
        let right = test_target("right");
        let a = connect(&left).unwrap();
        let b = connect(&right).unwrap();
        a.collection("users")
            .unwrap()
            .insert_many(vec![doc! { "name": "Alice" }])
            .unwrap();
        assert_eq!(b.collection("users").unwrap().size(), 0);
        drop_target(&left).unwrap();
        drop_target(&right).unwrap();
    }

    #[test]
    fn test_drop_target_resets_state() {
        let target = test_target("reset");
        let db = connect(&target).unwrap();
        db.collection("users")
            .unwrap()
            .insert_many(vec![doc! { "name": "Alice" }])
            .unwrap();
        drop_target(&target).unwrap();

        let fresh = connect(&target).unwrap();
        assert!(fresh.list_collection_names().is_empty());
        drop_target(&target).unwrap();
    }

    #[test]
    fn test_aggregate_unknown_collection() {
        let target = test_target("unknown");
        let db = connect(&target).unwrap();
        let err = db.aggregate("ghost", &[]).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::CollectionNotFound);
        drop_target(&target).unwrap();
    }

    #[test]
    fn test_read_only_rejects_writes() {
        let target = test_target("readonly");
        let db = connect(&target).unwrap();
        let users = db.collection("users").unwrap();
        db.set_read_only(true);

        let err = users.insert_many(vec![doc! { "name": "Alice" }]).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ReadOnly);
        assert!(db.drop_all().is_err());

        db.set_read_only(false);
        assert!(users.insert_many(vec![doc! { "name": "Alice" }]).is_ok());
        drop_target(&target).unwrap();
    }

    #[test]
    fn test_empty_target_rejected() {
        assert!(connect("  ").is_err());
    }
}
