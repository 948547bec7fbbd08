use im::OrdMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::doc_id::DocId;
use crate::document::Document;
use crate::errors::{ErrorKind, StoreError, StoreResult};
use crate::filter::Filter;
use crate::index::{IndexData, IndexDescriptor};
use crate::sort_order::SortOrder;
use crate::value::Value;

/// Result of a write operation, reporting how many documents it touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteResult {
    affected: usize,
}

impl WriteResult {
    pub(crate) fn new(affected: usize) -> Self {
        WriteResult { affected }
    }

    pub fn affected_count(&self) -> usize {
        self.affected
    }
}

/// A document collection inside a [Database](crate::store::Database).
///
/// Collections store documents keyed by their `_id` and maintain any
/// secondary indexes declared on them. Handles are cheap clones sharing
/// the same underlying state.
///
/// # Examples
///
/// ```rust,ignore
/// let orders = db.collection("orders")?;
/// orders.insert_many(docs)?;
/// orders.create_index(&[("customer_id", SortOrder::Ascending)])?;
/// let mine = orders.find(field("customer_id").eq(id))?;
/// ```
#[derive(Clone)]
pub struct Collection {
    inner: Arc<CollectionInner>,
}

struct CollectionInner {
    name: String,
    docs: RwLock<OrdMap<DocId, Document>>,
    indexes: RwLock<Vec<IndexData>>,
    read_only: Arc<AtomicBool>,
}

impl Collection {
    pub(crate) fn new(name: &str, read_only: Arc<AtomicBool>) -> Self {
        Collection {
            inner: Arc::new(CollectionInner {
                name: name.to_string(),
                docs: RwLock::new(OrdMap::new()),
                indexes: RwLock::new(Vec::new()),
                read_only,
            }),
        }
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Returns the number of documents in this collection.
    pub fn size(&self) -> usize {
        self.inner.docs.read().len()
    }

    /// Inserts multiple documents, assigning an `_id` to any document that
    /// does not carry one yet. A document sharing an existing `_id`
    /// replaces the stored one. Every open index is kept up to date.
    pub fn insert_many(&self, documents: Vec<Document>) -> StoreResult<WriteResult> {
        self.check_writable()?;

        let mut affected = 0;
        let mut docs = self.inner.docs.write();
        let mut indexes = self.inner.indexes.write();
        let mut map = docs.clone();
        for mut document in documents {
            let id = document.id()?;
            if let Some(previous) = map.get(&id).cloned() {
                for index in indexes.iter_mut() {
                    index.remove(id, &previous)?;
                }
            }
            for index in indexes.iter_mut() {
                index.add(id, &document)?;
            }
            map = map.update(id, document);
            affected += 1;
        }
        *docs = map;
        Ok(WriteResult::new(affected))
    }

    /// Finds all documents matching the filter.
    ///
    /// A plain equality filter on an indexed field is served through the
    /// index; everything else scans the collection.
    pub fn find(&self, filter: Filter) -> StoreResult<Vec<Document>> {
        if let Some((field, value)) = filter.as_eq() {
            if let Some(candidates) = self.index_eq(field, value) {
                log::debug!(
                    "collection '{}': find on '{}' served by index",
                    self.inner.name,
                    field
                );
                return Ok(candidates);
            }
        }

        let snapshot = self.scan();
        let mut results = Vec::new();
        for document in snapshot {
            if filter.matches(&document)? {
                results.push(document);
            }
        }
        Ok(results)
    }

    /// Creates a non-unique index over the given fields.
    ///
    /// # Errors
    ///
    /// Fails with [ErrorKind::IndexAlreadyExists] when an index over the
    /// same fields is already present, and with [ErrorKind::IndexingError]
    /// when no fields are given.
    pub fn create_index(&self, fields: &[(&str, SortOrder)]) -> StoreResult<()> {
        self.check_writable()?;

        if fields.is_empty() {
            return Err(StoreError::new(
                "cannot create an index over zero fields",
                ErrorKind::IndexingError,
            ));
        }

        let descriptor = IndexDescriptor::new(
            fields
                .iter()
                .map(|(name, order)| (name.to_string(), *order))
                .collect(),
        );

        // Lock order is docs before indexes, matching the write paths.
        let docs = self.inner.docs.read();
        let mut indexes = self.inner.indexes.write();
        if indexes
            .iter()
            .any(|index| index.descriptor().field_names() == descriptor.field_names())
        {
            return Err(StoreError::new(
                &format!(
                    "index '{}' already exists on collection '{}'",
                    descriptor.encoded_name(),
                    self.inner.name
                ),
                ErrorKind::IndexAlreadyExists,
            ));
        }

        let mut index = IndexData::new(descriptor);
        for (id, document) in docs.iter() {
            index.add(*id, document)?;
        }

        log::debug!(
            "collection '{}': created index '{}' over {} documents",
            self.inner.name,
            index.descriptor().encoded_name(),
            docs.len()
        );
        indexes.push(index);
        Ok(())
    }

    /// Checks whether an index over exactly the given field names exists.
    pub fn has_index(&self, fields: &[&str]) -> bool {
        self.inner
            .indexes
            .read()
            .iter()
            .any(|index| index.descriptor().field_names() == fields)
    }

    /// Lists the descriptors of every index on this collection.
    pub fn list_indexes(&self) -> Vec<IndexDescriptor> {
        self.inner
            .indexes
            .read()
            .iter()
            .map(|index| index.descriptor().clone())
            .collect()
    }

    /// Removes every document; indexes stay declared but empty.
    pub fn clear(&self) -> StoreResult<()> {
        self.check_writable()?;

        let mut docs = self.inner.docs.write();
        let mut indexes = self.inner.indexes.write();
        for (id, document) in docs.iter() {
            for index in indexes.iter_mut() {
                index.remove(*id, document)?;
            }
        }
        *docs = OrdMap::new();
        Ok(())
    }

    /// Cheap snapshot of every document, in `_id` order.
    pub(crate) fn scan(&self) -> Vec<Document> {
        self.inner.docs.read().values().cloned().collect()
    }

    /// Whether an equality lookup on `field` can be served by an index.
    pub(crate) fn has_index_covering(&self, field: &str) -> bool {
        self.inner
            .indexes
            .read()
            .iter()
            .any(|index| index.descriptor().covers(field))
    }

    /// Serves an equality lookup through an index whose leading key
    /// component is `field`, or `None` when no such index exists.
    pub(crate) fn index_eq(&self, field: &str, value: &Value) -> Option<Vec<Document>> {
        let indexes = self.inner.indexes.read();
        let index = indexes
            .iter()
            .find(|index| index.descriptor().covers(field))?;
        let ids = index.eq_lookup(value);
        drop(indexes);

        let docs = self.inner.docs.read();
        Some(
            ids.into_iter()
                .filter_map(|id| docs.get(&id).cloned())
                .collect(),
        )
    }

    fn check_writable(&self) -> StoreResult<()> {
        if self.inner.read_only.load(Ordering::SeqCst) {
            return Err(StoreError::new(
                &format!(
                    "collection '{}' belongs to a read-only target",
                    self.inner.name
                ),
                ErrorKind::ReadOnly,
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;
    use crate::filter::{all, field};

    fn collection(name: &str) -> Collection {
        Collection::new(name, Arc::new(AtomicBool::new(false)))
    }

    #[test]
    fn test_insert_and_size() {
        let orders = collection("orders");
        let result = orders
            .insert_many(vec![doc! { "a": 1i64 }, doc! { "a": 2i64 }])
            .unwrap();
        assert_eq!(result.affected_count(), 2);
        assert_eq!(orders.size(), 2);
    }

    #[test]
    fn test_insert_replaces_same_id() {
        let orders = collection("orders");
        let id = DocId::new();
        let mut first = doc! { "v": 1i64 };
        first.put(crate::document::DOC_ID, id).unwrap();
        let mut second = doc! { "v": 2i64 };
        second.put(crate::document::DOC_ID, id).unwrap();

        orders.insert_many(vec![first]).unwrap();
        orders.insert_many(vec![second]).unwrap();
        assert_eq!(orders.size(), 1);
        let found = orders.find(all()).unwrap();
        assert_eq!(found[0].get("v").unwrap(), Value::I64(2));
    }

    #[test]
    fn test_find_with_and_without_index() {
        let users = collection("users");
        users
            .insert_many(vec![
                doc! { "name": "Alice", "city": "Sydney" },
                doc! { "name": "Bob", "city": "London" },
                doc! { "name": "Carol", "city": "Sydney" },
            ])
            .unwrap();

        let scanned = users.find(field("city").eq("Sydney")).unwrap();
        assert_eq!(scanned.len(), 2);

        users
            .create_index(&[("city", SortOrder::Ascending)])
            .unwrap();
        let indexed = users.find(field("city").eq("Sydney")).unwrap();
        assert_eq!(indexed.len(), 2);
    }

    #[test]
    fn test_index_tracks_later_inserts() {
        let users = collection("users");
        users
            .create_index(&[("city", SortOrder::Ascending)])
            .unwrap();
        users
            .insert_many(vec![doc! { "name": "Alice", "city": "Sydney" }])
            .unwrap();
        let hits = users.index_eq("city", &Value::from("Sydney")).unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_duplicate_index_is_rejected() {
        let users = collection("users");
        users
            .create_index(&[("city", SortOrder::Ascending)])
            .unwrap();
        let err = users
            .create_index(&[("city", SortOrder::Descending)])
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::IndexAlreadyExists);
    }

    #[test]
    fn test_read_only_rejects_writes() {
        let read_only = Arc::new(AtomicBool::new(true));
        let users = Collection::new("users", read_only);
        let err = users.insert_many(vec![doc! { "a": 1i64 }]).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ReadOnly);
        let err = users
            .create_index(&[("a", SortOrder::Ascending)])
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ReadOnly);
    }

    #[test]
    fn test_concurrent_insert_and_index_creation() {
        // Races a writer against index creation on a shared handle. Both
        // paths lock docs before indexes, so neither can block the other
        // indefinitely.
        for _ in 0..64 {
            let users = collection("users");
            let writer = users.clone();
            let handle = std::thread::spawn(move || {
                for i in 0..16i64 {
                    writer
                        .insert_many(vec![doc! { "city": "Sydney", "n": i }])
                        .unwrap();
                }
            });
            users
                .create_index(&[("city", SortOrder::Ascending)])
                .unwrap();
            handle.join().unwrap();
            assert_eq!(
                users.index_eq("city", &Value::from("Sydney")).unwrap().len(),
                users.size()
            );
        }
    }

    #[test]
    fn test_clear_empties_documents_and_index_entries() {
        let users = collection("users");
        users
            .create_index(&[("city", SortOrder::Ascending)])
            .unwrap();
        users
            .insert_many(vec![doc! { "city": "Sydney" }])
            .unwrap();
        users.clear().unwrap();
        assert_eq!(users.size(), 0);
        assert!(users
            .index_eq("city", &Value::from("Sydney"))
            .unwrap()
            .is_empty());
        // the index declaration itself survives
        assert!(users.has_index(&["city"]));
    }
}
