use im::OrdMap;
use std::fmt::{Debug, Display, Formatter};

use crate::doc_id::DocId;
use crate::errors::{ErrorKind, StoreError, StoreResult};
use crate::value::Value;

/// The reserved field holding a document's unique identifier.
pub const DOC_ID: &str = "_id";

/// The separator used to address fields of nested documents.
const FIELD_SEPARATOR: char = '.';

/// Represents a document in StageDb.
///
/// Documents are composed of key-value pairs. The key is always a
/// [String] and the value is a [Value]. Documents support nested
/// documents; a nested field is addressed with a `.`-separated path, so
/// for `{"a": {"b": 1}}` the inner value is `document.get("a.b")`.
/// Array elements can be addressed by numeric path segments.
///
/// The `_id` field is reserved: it always holds the document's [DocId]
/// and cannot be set to any other kind of value.
///
/// ## Lock-Free Design
///
/// The struct wraps `im::OrdMap`, a persistent ordered map:
/// - O(1) cloning via internal Arc sharing
/// - Mutations create new maps via structural sharing
/// - Each mutated document is completely independent
#[derive(Clone, Eq, PartialEq, Hash, Default, Ord, PartialOrd)]
pub struct Document {
    data: OrdMap<String, Value>,
}

impl Document {
    /// Creates a new empty document.
    pub fn new() -> Self {
        Document {
            data: OrdMap::new(),
        }
    }

    /// Checks if the document is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the number of top-level fields in this document.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Associates the specified [Value] with the specified key.
    ///
    /// If the key already exists its value is updated. Keys containing the
    /// field separator write into the addressed nested document, creating
    /// intermediate documents as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is empty, or if the key is the reserved
    /// `_id` field and the value is not a [Value::Id].
    pub fn put<T: Into<Value>>(&mut self, key: impl AsRef<str>, value: T) -> StoreResult<()> {
        let key = key.as_ref();
        if key.is_empty() {
            log::error!("Document does not support empty key");
            return Err(StoreError::new(
                "Document does not support empty key",
                ErrorKind::InvalidOperation,
            ));
        }

        let value = value.into();

        if key == DOC_ID && !matches!(value, Value::Id(_)) {
            log::error!("Document id field can only hold a document id");
            return Err(StoreError::new(
                "Document id field can only hold a document id",
                ErrorKind::InvalidOperation,
            ));
        }

        if key.contains(FIELD_SEPARATOR) {
            let splits: Vec<&str> = key.split(FIELD_SEPARATOR).collect();
            self.deep_put(&splits, value)
        } else {
            self.data = self.data.update(key.to_string(), value);
            Ok(())
        }
    }

    /// Returns the [Value] associated with the key, or [Value::Null] if
    /// this document contains no mapping for it.
    ///
    /// Supports both top-level keys and `.`-separated paths into nested
    /// documents and arrays:
    ///
    /// ```text
    /// let doc = doc! { "location": { "city": "New York" } };
    /// assert_eq!(doc.get("location.city")?, Value::from("New York"));
    /// ```
    pub fn get(&self, key: &str) -> StoreResult<Value> {
        match self.data.get(key) {
            Some(value) => Ok(value.clone()),
            None => {
                // only try path traversal if the key is not found at top level
                if key.contains(FIELD_SEPARATOR) {
                    self.deep_get(key)
                } else {
                    Ok(Value::Null)
                }
            }
        }
    }

    /// Return the [DocId] associated with this document, generating and
    /// assigning a fresh one if the `_id` field is not populated yet.
    pub fn id(&mut self) -> StoreResult<DocId> {
        if let Some(Value::Id(id)) = self.data.get(DOC_ID) {
            Ok(*id)
        } else {
            let id = DocId::new();
            self.data = self.data.update(DOC_ID.to_string(), Value::Id(id));
            Ok(id)
        }
    }

    /// Checks whether this document has a populated `_id` field.
    pub fn has_id(&self) -> bool {
        matches!(self.data.get(DOC_ID), Some(Value::Id(_)))
    }

    /// Checks whether a top-level field exists.
    pub fn has_field(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Removes a top-level field, returning its previous value if any.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let previous = self.data.get(key).cloned();
        self.data = self.data.without(key);
        previous
    }

    /// Iterates over the top-level fields in key order.
    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.data.iter()
    }

    fn deep_put(&mut self, splits: &[&str], value: Value) -> StoreResult<()> {
        let (first, rest) = match splits.split_first() {
            Some(parts) => parts,
            None => return Ok(()),
        };
        if rest.is_empty() {
            self.data = self.data.update(first.to_string(), value);
            return Ok(());
        }

        let mut child = match self.data.get(*first) {
            Some(Value::Document(doc)) => doc.clone(),
            _ => Document::new(),
        };
        child.deep_put(rest, value)?;
        self.data = self.data.update(first.to_string(), Value::Document(child));
        Ok(())
    }

    fn deep_get(&self, key: &str) -> StoreResult<Value> {
        let mut current = Value::Document(self.clone());
        for part in key.split(FIELD_SEPARATOR) {
            current = match current {
                Value::Document(doc) => match doc.data.get(part) {
                    Some(value) => value.clone(),
                    None => return Ok(Value::Null),
                },
                Value::Array(values) => match part.parse::<usize>() {
                    Ok(index) => match values.get(index) {
                        Some(value) => value.clone(),
                        None => return Ok(Value::Null),
                    },
                    Err(_) => return Ok(Value::Null),
                },
                _ => return Ok(Value::Null),
            };
        }
        Ok(current)
    }
}

impl Display for Document {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (i, (key, value)) in self.data.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {:?}", key, value)?;
        }
        write!(f, "}}")
    }
}

impl Debug for Document {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)
    }
}

/// Strips the quotes a string-literal key picks up through `stringify!`.
#[doc(hidden)]
pub fn normalize(key: &str) -> String {
    key.trim_matches('"').to_string()
}

/// Builds a [Document] from key-value pairs.
///
/// Keys can be identifiers or string literals; values can be expressions,
/// nested `{ .. }` documents, or `[ .. ]` arrays.
///
/// ```text
/// let doc = doc! {
///     "name": "Alice",
///     "age": 30i64,
///     "address": { "city": "Sydney" },
/// };
/// ```
#[macro_export]
macro_rules! doc {
    () => {
        $crate::document::Document::new()
    };

    ({ $($key:tt : $value:tt),* $(,)? }) => {
        $crate::doc!($($key : $value),*)
    };

    ($($key:tt : $value:tt),* $(,)?) => {
        {
            #[allow(unused_imports)]
            use $crate::doc_value;

            let mut doc = $crate::document::Document::new();
            $(
                doc.put($crate::document::normalize(stringify!($key)), $crate::doc_value!($value))
                    .expect("failed to build document literal");
            )*
            doc
        }
    };
}

/// Helper macro converting values for [`doc!`]; handles nested documents,
/// arrays, and plain expressions.
#[macro_export]
macro_rules! doc_value {
    ({ $($key:tt : $value:tt),* $(,)? }) => {
        $crate::value::Value::Document($crate::doc!{ $($key : $value),* })
    };

    ([ $($value:tt),* $(,)? ]) => {
        $crate::value::Value::Array(vec![$($crate::doc_value!($value)),*])
    };

    ($value:expr) => {
        $crate::value::Value::from($value)
    };
}
