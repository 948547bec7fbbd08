use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;

use uuid::Uuid;

use crate::errors::{ErrorKind, StoreError, StoreResult};

/// A unique identifier for documents in StageDb.
///
/// Each document in a collection is identified by a `DocId` stored in its
/// `_id` field. Identifiers are opaque random tokens (UUIDv4 underneath):
/// comparable, hashable, and round-trippable through their hyphenated
/// string form for transport across process boundaries.
///
/// # Examples
///
/// ```rust,ignore
/// use stagedb::doc_id::DocId;
///
/// let id = DocId::new();
/// let parsed: DocId = id.to_string().parse()?;
/// assert_eq!(id, parsed);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocId(Uuid);

impl DocId {
    /// Generates a new random identifier.
    pub fn new() -> Self {
        DocId(Uuid::new_v4())
    }

    /// Parses an identifier from its hyphenated string form.
    pub fn parse(s: &str) -> StoreResult<Self> {
        Uuid::parse_str(s).map(DocId).map_err(|err| {
            StoreError::new(
                &format!("invalid document id '{}': {}", s, err),
                ErrorKind::InvalidId,
            )
        })
    }
}

impl Default for DocId {
    fn default() -> Self {
        DocId::new()
    }
}

impl Display for DocId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl Debug for DocId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "DocId({})", self.0.hyphenated())
    }
}

impl FromStr for DocId {
    type Err = StoreError;

    fn from_str(s: &str) -> StoreResult<Self> {
        DocId::parse(s)
    }
}
