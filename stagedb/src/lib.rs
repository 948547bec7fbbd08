//! # StageDb - Embedded Document Store
//!
//! StageDb is a small, in-process document store built for workloads that
//! fan one dataset out to several independently configured targets and
//! query them through relational-style aggregation pipelines.
//!
//! ## Key Features
//!
//! - **Embedded**: No separate server process required
//! - **Document Model**: Ordered key-value documents with nested values
//! - **Indexing**: Non-unique single-field and compound indexes
//! - **Aggregation**: An ordered pipeline of relational operators
//!   (filter, lookup, unwind, project, group-with-sum, sort)
//! - **Isolated Targets**: A process-wide registry of named stores that
//!   never share state with each other
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use stagedb::{connect, doc, filter::field};
//!
//! # fn main() -> stagedb::errors::StoreResult<()> {
//! let db = connect("memory://demo")?;
//! let users = db.collection("users")?;
//!
//! users.insert_many(vec![doc! { "name": "Alice", "age": 30i64 }])?;
//! let results = users.find(field("name").eq("Alice"))?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`collection`] - Document collections and write results
//! - [`doc_id`] - Opaque unique document identifiers
//! - [`document`] - The document type and the `doc!` macro
//! - [`errors`] - Error types and result definitions
//! - [`filter`] - Query filters
//! - [`index`] - Index descriptors and index data
//! - [`pipeline`] - Aggregation pipeline operators and execution
//! - [`store`] - Database handles and the target registry
//! - [`value`] - The tagged value type

use parking_lot::RwLock;
use std::sync::Arc;

pub mod collection;
pub mod doc_id;
pub mod document;
pub mod errors;
pub mod filter;
pub mod index;
pub mod pipeline;
pub mod sort_order;
pub mod store;
pub mod value;

pub use collection::{Collection, WriteResult};
pub use doc_id::DocId;
pub use document::{Document, DOC_ID};
pub use errors::{ErrorKind, StoreError, StoreResult};
pub use filter::{all, field, Filter};
pub use index::IndexDescriptor;
pub use pipeline::{Accumulator, Expr, Lookup, PipelineStage};
pub use sort_order::SortOrder;
pub use store::{connect, drop_target, Database};
pub use value::Value;

pub(crate) type Atomic<T> = Arc<RwLock<T>>;

#[inline]
pub(crate) fn atomic<T>(t: T) -> Atomic<T> {
    Arc::new(RwLock::new(t))
}
