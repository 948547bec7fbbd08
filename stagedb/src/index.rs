use std::collections::{BTreeMap, BTreeSet};

use itertools::Itertools;

use crate::doc_id::DocId;
use crate::document::Document;
use crate::errors::StoreResult;
use crate::sort_order::SortOrder;
use crate::value::Value;

/// Describes a non-unique index over one or more document fields.
///
/// For compound indexes each field carries its intended sort order; the
/// order is descriptive (it records the traversal direction the index was
/// declared with), while equality lookups work on any key prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDescriptor {
    fields: Vec<(String, SortOrder)>,
}

impl IndexDescriptor {
    pub fn new(fields: Vec<(String, SortOrder)>) -> Self {
        IndexDescriptor { fields }
    }

    pub fn fields(&self) -> &[(String, SortOrder)] {
        &self.fields
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Encoded name of the index, unique per field combination.
    pub fn encoded_name(&self) -> String {
        self.fields.iter().map(|(name, _)| name.as_str()).join("+")
    }

    /// Whether this index can serve an equality lookup on `field`, which
    /// requires `field` to be the leading key component.
    pub fn covers(&self, field: &str) -> bool {
        self.fields
            .first()
            .map(|(name, _)| name == field)
            .unwrap_or(false)
    }
}

/// Index data: composite key values mapped to the ids of the documents
/// carrying them. Absent fields index as [Value::Null].
#[derive(Debug, Clone)]
pub(crate) struct IndexData {
    descriptor: IndexDescriptor,
    entries: BTreeMap<Vec<Value>, BTreeSet<DocId>>,
}

impl IndexData {
    pub(crate) fn new(descriptor: IndexDescriptor) -> Self {
        IndexData {
            descriptor,
            entries: BTreeMap::new(),
        }
    }

    pub(crate) fn descriptor(&self) -> &IndexDescriptor {
        &self.descriptor
    }

    fn key_of(&self, document: &Document) -> StoreResult<Vec<Value>> {
        self.descriptor
            .fields
            .iter()
            .map(|(name, _)| document.get(name))
            .collect()
    }

    /// Adds a document to the index.
    pub(crate) fn add(&mut self, id: DocId, document: &Document) -> StoreResult<()> {
        let key = self.key_of(document)?;
        self.entries.entry(key).or_default().insert(id);
        Ok(())
    }

    /// Removes a document from the index.
    pub(crate) fn remove(&mut self, id: DocId, document: &Document) -> StoreResult<()> {
        let key = self.key_of(document)?;
        if let Some(ids) = self.entries.get_mut(&key) {
            ids.remove(&id);
            if ids.is_empty() {
                self.entries.remove(&key);
            }
        }
        Ok(())
    }

    /// Looks up the ids of documents whose leading key component equals
    /// `value`, in key order.
    pub(crate) fn eq_lookup(&self, value: &Value) -> Vec<DocId> {
        let start = vec![value.clone()];
        self.entries
            .range(start..)
            .take_while(|(key, _)| key.first() == Some(value))
            .flat_map(|(_, ids)| ids.iter().copied())
            .collect()
    }
}
