use crate::document::Document;
use crate::errors::{ErrorKind, StoreError, StoreResult};
use crate::value::Value;

/// A query filter over documents.
///
/// Filters are composed with the fluent helpers [`field`] and [`all`]:
///
/// ```text
/// let filter = field("customer_id").eq(id).and(field("status").eq("completed"));
/// let results = collection.find(filter)?;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Matches every document.
    All,
    /// Matches documents whose field equals the value; the field may be a
    /// `.`-separated path into nested documents.
    Eq { field: String, value: Value },
    /// Matches documents satisfying every inner filter.
    And(Vec<Filter>),
}

impl Filter {
    /// Evaluates this filter against a document.
    pub fn matches(&self, document: &Document) -> StoreResult<bool> {
        match self {
            Filter::All => Ok(true),
            Filter::Eq { field, value } => Ok(&document.get(field)? == value),
            Filter::And(filters) => {
                if filters.is_empty() {
                    return Err(StoreError::new(
                        "And filter requires at least one inner filter",
                        ErrorKind::FilterError,
                    ));
                }
                for filter in filters {
                    if !filter.matches(document)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
        }
    }

    /// Combines this filter with another; both must match.
    pub fn and(self, other: Filter) -> Filter {
        match self {
            Filter::And(mut filters) => {
                filters.push(other);
                Filter::And(filters)
            }
            first => Filter::And(vec![first, other]),
        }
    }

    /// Returns the `(field, value)` pair of a plain equality filter, the
    /// only shape the index-assisted scan path understands.
    pub(crate) fn as_eq(&self) -> Option<(&str, &Value)> {
        match self {
            Filter::Eq { field, value } => Some((field.as_str(), value)),
            _ => None,
        }
    }
}

/// Creates a filter that matches every document.
pub fn all() -> Filter {
    Filter::All
}

/// Creates a fluent filter builder for the specified field name.
pub fn field(field_name: &str) -> FluentFilter {
    FluentFilter {
        field_name: field_name.to_string(),
    }
}

/// A fluent builder for constructing filters on a specific field.
pub struct FluentFilter {
    field_name: String,
}

impl FluentFilter {
    /// Creates a filter that matches documents where the field equals the
    /// specified value.
    #[inline]
    pub fn eq<T: Into<Value>>(self, value: T) -> Filter {
        Filter::Eq {
            field: self.field_name,
            value: value.into(),
        }
    }
}
