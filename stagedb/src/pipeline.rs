//! Aggregation pipelines.
//!
//! A pipeline is an ordered list of [PipelineStage]s applied to a source
//! collection. Each stage consumes the document stream produced by the
//! previous stage and emits a new one; the store never mutates the
//! source collection during aggregation.

use indexmap::IndexMap;
use itertools::Itertools;
use std::collections::HashMap;

use crate::collection::Collection;
use crate::document::Document;
use crate::errors::{ErrorKind, StoreError, StoreResult};
use crate::filter::Filter;
use crate::sort_order::SortOrder;
use crate::store::Database;
use crate::value::Value;

/// A scalar expression evaluated against a single document.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// Reads a field (or `.`-separated path) from the document.
    Field(String),
    /// A constant value.
    Literal(Value),
    /// Numeric product of two sub-expressions.
    Mul(Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn field(path: impl Into<String>) -> Expr {
        Expr::Field(path.into())
    }

    pub fn literal<T: Into<Value>>(value: T) -> Expr {
        Expr::Literal(value.into())
    }

    pub fn mul(left: Expr, right: Expr) -> Expr {
        Expr::Mul(Box::new(left), Box::new(right))
    }

    /// Evaluates the expression against `document`.
    ///
    /// A missing field reads as [Value::Null]. Multiplying two integers
    /// yields an integer; any other numeric combination yields a float,
    /// and non-numeric operands yield [Value::Null].
    pub fn eval(&self, document: &Document) -> StoreResult<Value> {
        match self {
            Expr::Field(path) => document.get(path),
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Mul(left, right) => {
                let left = left.eval(document)?;
                let right = right.eval(document)?;
                match (&left, &right) {
                    (Value::I64(a), Value::I64(b)) => Ok(Value::I64(a * b)),
                    _ => match (left.as_number(), right.as_number()) {
                        (Some(a), Some(b)) => Ok(Value::F64(a * b)),
                        _ => Ok(Value::Null),
                    },
                }
            }
        }
    }
}

/// An accumulator applied per group by [PipelineStage::Group].
#[derive(Clone, Debug, PartialEq)]
pub enum Accumulator {
    /// Sums the expression over every document in the group.
    ///
    /// Integers are summed as `I64` until the first float contribution,
    /// after which the running total becomes `F64`. Null and non-numeric
    /// contributions are ignored; a group that never contributes a
    /// number sums to `I64(0)`.
    Sum(Expr),
}

/// Join specification for [PipelineStage::Lookup].
#[derive(Clone, Debug, PartialEq)]
pub struct Lookup {
    /// Name of the foreign collection, resolved in the same database.
    pub from: String,
    /// Field of the incoming document whose value is probed.
    pub local_field: String,
    /// Field of the foreign documents compared against the local value.
    pub foreign_field: String,
    /// Field on the incoming document that receives the matched array.
    pub as_field: String,
}

impl Lookup {
    pub fn new(
        from: impl Into<String>,
        local_field: impl Into<String>,
        foreign_field: impl Into<String>,
        as_field: impl Into<String>,
    ) -> Lookup {
        Lookup {
            from: from.into(),
            local_field: local_field.into(),
            foreign_field: foreign_field.into(),
            as_field: as_field.into(),
        }
    }
}

/// One stage of an aggregation pipeline.
#[derive(Clone, Debug, PartialEq)]
pub enum PipelineStage {
    /// Keeps only documents matching the filter.
    Match(Filter),
    /// Left-outer equality join against another collection. Every
    /// incoming document gains `as_field` holding the (possibly empty)
    /// array of matching foreign documents.
    Lookup(Lookup),
    /// Emits one document per element of the named array field, with
    /// the field replaced by the element. Documents where the field is
    /// missing or an empty array are dropped; a non-array value passes
    /// the document through unchanged.
    Unwind(String),
    /// Reshapes each document to exactly the named computed fields.
    Project(Vec<(String, Expr)>),
    /// Removes the named top-level fields from each document.
    Exclude(Vec<String>),
    /// Groups documents by the evaluated key expressions and folds the
    /// accumulators over each group. Groups are emitted in first-seen
    /// order.
    Group {
        key: Vec<(String, Expr)>,
        accumulators: Vec<(String, Accumulator)>,
    },
    /// Stable sort on a single field.
    Sort(String, SortOrder),
}

/// Runs `stages` over `source`, resolving lookups through `db`.
pub(crate) fn execute(
    db: &Database,
    source: &Collection,
    stages: &[PipelineStage],
) -> StoreResult<Vec<Document>> {
    let mut docs;
    let mut remaining = stages;

    // A leading equality match on an indexed field reads the candidate
    // set straight out of the index instead of scanning the collection.
    match stages.split_first() {
        Some((PipelineStage::Match(filter), rest)) => {
            match filter
                .as_eq()
                .and_then(|(field, value)| source.index_eq(field, value))
            {
                Some(candidates) => {
                    log::debug!(
                        "aggregate on '{}': using index for leading match",
                        source.name()
                    );
                    docs = candidates;
                    remaining = rest;
                }
                None => docs = source.scan(),
            }
        }
        _ => docs = source.scan(),
    }

    for stage in remaining {
        docs = apply_stage(db, docs, stage)?;
    }
    Ok(docs)
}

fn apply_stage(
    db: &Database,
    docs: Vec<Document>,
    stage: &PipelineStage,
) -> StoreResult<Vec<Document>> {
    match stage {
        PipelineStage::Match(filter) => {
            let mut out = Vec::new();
            for doc in docs {
                if filter.matches(&doc)? {
                    out.push(doc);
                }
            }
            Ok(out)
        }
        PipelineStage::Lookup(lookup) => apply_lookup(db, docs, lookup),
        PipelineStage::Unwind(field) => apply_unwind(docs, field),
        PipelineStage::Project(fields) => {
            let mut out = Vec::with_capacity(docs.len());
            for doc in docs {
                let mut shaped = Document::new();
                for (name, expr) in fields {
                    shaped.put(name, expr.eval(&doc)?)?;
                }
                out.push(shaped);
            }
            Ok(out)
        }
        PipelineStage::Exclude(fields) => Ok(docs
            .into_iter()
            .map(|mut doc| {
                for field in fields {
                    doc.remove(field);
                }
                doc
            })
            .collect()),
        PipelineStage::Group { key, accumulators } => apply_group(docs, key, accumulators),
        PipelineStage::Sort(field, order) => apply_sort(docs, field, *order),
    }
}

fn apply_lookup(db: &Database, docs: Vec<Document>, lookup: &Lookup) -> StoreResult<Vec<Document>> {
    let foreign = db.collection(&lookup.from)?;

    // With an index on the foreign field each local value is probed
    // directly; otherwise the foreign collection is scanned once into a
    // hash table keyed by the join value.
    let table = if foreign.has_index_covering(&lookup.foreign_field) {
        log::debug!(
            "lookup into '{}': probing index on '{}'",
            lookup.from,
            lookup.foreign_field
        );
        None
    } else {
        let mut table: HashMap<Value, Vec<Document>> = HashMap::new();
        for foreign_doc in foreign.scan() {
            let key = foreign_doc.get(&lookup.foreign_field)?;
            table.entry(key).or_default().push(foreign_doc);
        }
        Some(table)
    };

    let mut out = Vec::with_capacity(docs.len());
    for mut doc in docs {
        let local = doc.get(&lookup.local_field)?;
        let matched = match &table {
            Some(table) => table.get(&local).cloned().unwrap_or_default(),
            None => foreign
                .index_eq(&lookup.foreign_field, &local)
                .unwrap_or_default(),
        };
        let matched: Vec<Value> = matched.into_iter().map(Value::Document).collect();
        doc.put(&lookup.as_field, Value::Array(matched))?;
        out.push(doc);
    }
    Ok(out)
}

fn apply_unwind(docs: Vec<Document>, field: &str) -> StoreResult<Vec<Document>> {
    let mut out = Vec::new();
    for doc in docs {
        match doc.get(field)? {
            Value::Array(elements) => {
                for element in elements {
                    let mut unwound = doc.clone();
                    unwound.put(field, element)?;
                    out.push(unwound);
                }
            }
            // documents without the array contribute nothing
            Value::Null => {}
            other => {
                let mut unchanged = doc;
                unchanged.put(field, other)?;
                out.push(unchanged);
            }
        }
    }
    Ok(out)
}

fn apply_group(
    docs: Vec<Document>,
    key: &[(String, Expr)],
    accumulators: &[(String, Accumulator)],
) -> StoreResult<Vec<Document>> {
    if key.is_empty() {
        return Err(StoreError::new(
            "group stage requires at least one key expression",
            ErrorKind::AggregationError,
        ));
    }

    let mut groups: IndexMap<Vec<Value>, Vec<Value>> = IndexMap::new();
    for doc in &docs {
        let group_key: Vec<Value> = key
            .iter()
            .map(|(_, expr)| expr.eval(doc))
            .collect::<StoreResult<_>>()?;
        let states = groups
            .entry(group_key)
            .or_insert_with(|| vec![Value::Null; accumulators.len()]);
        for (state, (_, accumulator)) in states.iter_mut().zip(accumulators) {
            let Accumulator::Sum(expr) = accumulator;
            sum_into(state, expr.eval(doc)?);
        }
    }

    let mut out = Vec::with_capacity(groups.len());
    for (group_key, states) in groups {
        let mut doc = Document::new();
        for ((name, _), value) in key.iter().zip(group_key) {
            doc.put(name, value)?;
        }
        for ((name, _), state) in accumulators.iter().zip(states) {
            let total = match state {
                Value::Null => Value::I64(0),
                other => other,
            };
            doc.put(name, total)?;
        }
        out.push(doc);
    }
    Ok(out)
}

/// Folds one contribution into a running sum. The state stays `I64`
/// until the first float contribution widens it to `F64`.
fn sum_into(state: &mut Value, contribution: Value) {
    match (&*state, contribution) {
        (Value::Null, Value::I64(b)) => *state = Value::I64(b),
        (Value::Null, Value::F64(b)) => *state = Value::F64(b),
        (Value::I64(a), Value::I64(b)) => *state = Value::I64(a + b),
        (Value::I64(a), Value::F64(b)) => *state = Value::F64(*a as f64 + b),
        (Value::F64(a), Value::I64(b)) => *state = Value::F64(a + b as f64),
        (Value::F64(a), Value::F64(b)) => *state = Value::F64(a + b),
        // non-numeric contributions are ignored
        _ => {}
    }
}

fn apply_sort(docs: Vec<Document>, field: &str, order: SortOrder) -> StoreResult<Vec<Document>> {
    let mut keyed = Vec::with_capacity(docs.len());
    for doc in docs {
        let key = doc.get(field)?;
        keyed.push((key, doc));
    }
    let sorted = keyed
        .into_iter()
        .sorted_by(|(a, _), (b, _)| match order {
            SortOrder::Ascending => a.cmp(b),
            SortOrder::Descending => b.cmp(a),
        })
        .map(|(_, doc)| doc)
        .collect();
    Ok(sorted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;
    use crate::filter::field;
    use crate::store::{connect, drop_target};
    use crate::DocId;

    fn test_target(suffix: &str) -> String {
        format!("memory://pipeline-test-{}-{}", suffix, DocId::new())
    }

    #[test]
    fn test_match_and_project() {
        let target = test_target("match");
        let db = connect(&target).unwrap();
        let people = db.collection("people").unwrap();
        people
            .insert_many(vec![
                doc! { "name": "Alice", "age": 30i64 },
                doc! { "name": "Bob", "age": 25i64 },
            ])
            .unwrap();

        let results = db
            .aggregate(
                "people",
                &[
                    PipelineStage::Match(field("name").eq("Alice")),
                    PipelineStage::Project(vec![("who".to_string(), Expr::field("name"))]),
                ],
            )
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].get("who").unwrap(), Value::from("Alice"));
        assert!(!results[0].has_field("age"));
        drop_target(&target).unwrap();
    }

    #[test]
    fn test_lookup_attaches_matches_and_empty_arrays() {
        let target = test_target("lookup");
        let db = connect(&target).unwrap();
        let orders = db.collection("orders").unwrap();
        let items = db.collection("items").unwrap();
        orders
            .insert_many(vec![
                doc! { "order_no": 1i64 },
                doc! { "order_no": 2i64 },
            ])
            .unwrap();
        items
            .insert_many(vec![
                doc! { "order_no": 1i64, "sku": "a" },
                doc! { "order_no": 1i64, "sku": "b" },
            ])
            .unwrap();

        let results = db
            .aggregate(
                "orders",
                &[PipelineStage::Lookup(Lookup::new(
                    "items", "order_no", "order_no", "lines",
                ))],
            )
            .unwrap();
        assert_eq!(results.len(), 2);
        for doc in &results {
            let lines = match doc.get("lines").unwrap() {
                Value::Array(lines) => lines,
                other => panic!("expected array, got {:?}", other),
            };
            match doc.get("order_no").unwrap() {
                Value::I64(1) => assert_eq!(lines.len(), 2),
                Value::I64(2) => assert!(lines.is_empty()),
                other => panic!("unexpected order_no {:?}", other),
            }
        }
        drop_target(&target).unwrap();
    }

    #[test]
    fn test_lookup_through_index_matches_scan() {
        let target = test_target("lookup-idx");
        let db = connect(&target).unwrap();
        let orders = db.collection("orders").unwrap();
        let items = db.collection("items").unwrap();
        orders.insert_many(vec![doc! { "order_no": 7i64 }]).unwrap();
        items
            .insert_many(vec![
                doc! { "order_no": 7i64, "sku": "x" },
                doc! { "order_no": 8i64, "sku": "y" },
            ])
            .unwrap();
        items
            .create_index(&[("order_no", SortOrder::Ascending)])
            .unwrap();

        let results = db
            .aggregate(
                "orders",
                &[PipelineStage::Lookup(Lookup::new(
                    "items", "order_no", "order_no", "lines",
                ))],
            )
            .unwrap();
        let lines = results[0].get("lines").unwrap();
        match lines {
            Value::Array(lines) => {
                assert_eq!(lines.len(), 1);
            }
            other => panic!("expected array, got {:?}", other),
        }
        drop_target(&target).unwrap();
    }

    #[test]
    fn test_unwind_edge_cases() {
        let target = test_target("unwind");
        let db = connect(&target).unwrap();
        let docs = db.collection("docs").unwrap();
        docs.insert_many(vec![
            doc! { "tag": "two", "items": ["a", "b"] },
            doc! { "tag": "empty", "items": [] },
            doc! { "tag": "missing" },
            doc! { "tag": "scalar", "items": "lonely" },
        ])
        .unwrap();

        let results = db
            .aggregate("docs", &[PipelineStage::Unwind("items".to_string())])
            .unwrap();
        // two from the real array, one scalar passthrough
        assert_eq!(results.len(), 3);
        let scalar = results
            .iter()
            .find(|doc| doc.get("tag").unwrap() == Value::from("scalar"))
            .unwrap();
        assert_eq!(scalar.get("items").unwrap(), Value::from("lonely"));
        drop_target(&target).unwrap();
    }

    #[test]
    fn test_group_sum_widens_to_float() {
        let target = test_target("group");
        let db = connect(&target).unwrap();
        let sales = db.collection("sales").unwrap();
        sales
            .insert_many(vec![
                doc! { "region": "east", "qty": 2i64, "amount": 1.5 },
                doc! { "region": "east", "qty": 3i64, "amount": 2.0 },
                doc! { "region": "west", "qty": 1i64, "amount": 4.0 },
            ])
            .unwrap();

        let results = db
            .aggregate(
                "sales",
                &[PipelineStage::Group {
                    key: vec![("region".to_string(), Expr::field("region"))],
                    accumulators: vec![
                        ("total_qty".to_string(), Accumulator::Sum(Expr::field("qty"))),
                        (
                            "revenue".to_string(),
                            Accumulator::Sum(Expr::mul(
                                Expr::field("qty"),
                                Expr::field("amount"),
                            )),
                        ),
                    ],
                }],
            )
            .unwrap();
        assert_eq!(results.len(), 2);
        let east = results
            .iter()
            .find(|doc| doc.get("region").unwrap() == Value::from("east"))
            .unwrap();
        assert_eq!(east.get("total_qty").unwrap(), Value::I64(5));
        assert_eq!(east.get("revenue").unwrap(), Value::F64(9.0));
        drop_target(&target).unwrap();
    }

    #[test]
    fn test_group_emits_first_seen_order() {
        let target = test_target("group-order");
        let db = connect(&target).unwrap();
        let rows = db.collection("rows").unwrap();
        rows.insert_many(vec![
            doc! { "k": "z", "n": 1i64 },
            doc! { "k": "a", "n": 1i64 },
            doc! { "k": "z", "n": 1i64 },
        ])
        .unwrap();

        let results = db
            .aggregate(
                "rows",
                &[PipelineStage::Group {
                    key: vec![("k".to_string(), Expr::field("k"))],
                    accumulators: vec![("n".to_string(), Accumulator::Sum(Expr::field("n")))],
                }],
            )
            .unwrap();
        let keys: Vec<Value> = results.iter().map(|doc| doc.get("k").unwrap()).collect();
        assert_eq!(keys, vec![Value::from("z"), Value::from("a")]);
        drop_target(&target).unwrap();
    }

    #[test]
    fn test_sort_descending() {
        let target = test_target("sort");
        let db = connect(&target).unwrap();
        let rows = db.collection("rows").unwrap();
        rows.insert_many(vec![
            doc! { "n": 2i64 },
            doc! { "n": 9i64 },
            doc! { "n": 4i64 },
        ])
        .unwrap();

        let results = db
            .aggregate(
                "rows",
                &[PipelineStage::Sort("n".to_string(), SortOrder::Descending)],
            )
            .unwrap();
        let order: Vec<Value> = results.iter().map(|doc| doc.get("n").unwrap()).collect();
        assert_eq!(order, vec![Value::I64(9), Value::I64(4), Value::I64(2)]);
        drop_target(&target).unwrap();
    }

    #[test]
    fn test_empty_group_key_is_an_error() {
        let target = test_target("group-err");
        let db = connect(&target).unwrap();
        let rows = db.collection("rows").unwrap();
        rows.insert_many(vec![doc! { "n": 1i64 }]).unwrap();

        let err = db
            .aggregate(
                "rows",
                &[PipelineStage::Group {
                    key: vec![],
                    accumulators: vec![],
                }],
            )
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::AggregationError);
        drop_target(&target).unwrap();
    }
}
