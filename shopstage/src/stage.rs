//! The four stages and their aggregation pipelines.
//!
//! Each stage pairs an isolated store target with a query plan over the
//! schema shape that target was loaded with. All four answer the same
//! question and must return the same row set for the same customer;
//! they differ only in how much work the store does to get there.

use serde::Serialize;
use stagedb::{
    field, Accumulator, Database, DocId, Document, Expr, Lookup, PipelineStage, SortOrder,
    StoreResult,
};

use crate::model::{self, doc_i64, doc_number, doc_string};

/// One row of the aggregation answer, serialized directly into HTTP
/// response bodies.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevenueRow {
    pub customer_name: String,
    pub product_name: String,
    pub total_quantity: i64,
    pub total_revenue: f64,
}

impl RevenueRow {
    pub fn from_document(document: &Document) -> StoreResult<RevenueRow> {
        Ok(RevenueRow {
            customer_name: doc_string(document, "customer_name")?,
            product_name: doc_string(document, "product_name")?,
            total_quantity: doc_i64(document, "total_quantity")?,
            total_revenue: doc_number(document, "total_revenue")?,
        })
    }
}

/// One of the four staged query-optimization strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Joins every related collection before filtering anything.
    Naive,
    /// Filters by customer before joining, and only joins what the
    /// answer needs.
    FilterFirst,
    /// The filter-first plan against a target whose join fields are
    /// indexed.
    Indexed,
    /// Reads the precomputed summary relation; no joins at read time.
    Denormalized,
}

impl Stage {
    pub const ALL: [Stage; 4] = [
        Stage::Naive,
        Stage::FilterFirst,
        Stage::Indexed,
        Stage::Denormalized,
    ];

    pub fn number(&self) -> u8 {
        match self {
            Stage::Naive => 1,
            Stage::FilterFirst => 2,
            Stage::Indexed => 3,
            Stage::Denormalized => 4,
        }
    }

    pub fn from_number(number: u8) -> Option<Stage> {
        match number {
            1 => Some(Stage::Naive),
            2 => Some(Stage::FilterFirst),
            3 => Some(Stage::Indexed),
            4 => Some(Stage::Denormalized),
            _ => None,
        }
    }

    /// The isolated store target for this stage under a common root.
    pub fn target(&self, root: &str) -> String {
        format!("{}/stage{:02}", root, self.number())
    }

    /// The collection this stage's pipeline reads from.
    pub fn source_collection(&self) -> &'static str {
        match self {
            Stage::Denormalized => model::ORDERS_SUMMARY,
            _ => model::ORDERS,
        }
    }

    /// Composes this stage's pipeline, optionally filtered to one
    /// customer.
    pub fn pipeline(&self, customer_id: Option<&DocId>) -> Vec<PipelineStage> {
        match self {
            Stage::Naive => naive_pipeline(customer_id),
            Stage::FilterFirst | Stage::Indexed => filter_first_pipeline(customer_id),
            Stage::Denormalized => denormalized_pipeline(customer_id),
        }
    }

    /// Runs this stage's pipeline against `db` and decodes the rows.
    pub fn run(&self, db: &Database, customer_id: Option<&DocId>) -> StoreResult<Vec<RevenueRow>> {
        let documents = db.aggregate(self.source_collection(), &self.pipeline(customer_id))?;
        documents.iter().map(RevenueRow::from_document).collect()
    }
}

/// Stage 1: five lookups (customers, items, products, shipping
/// addresses, payment transactions), a wide projection, and only then
/// the customer filter. The shipping and payment joins are pure waste;
/// that is the point of the baseline.
fn naive_pipeline(customer_id: Option<&DocId>) -> Vec<PipelineStage> {
    let mut stages = vec![
        PipelineStage::Lookup(Lookup::new(model::CUSTOMERS, "customer_id", "_id", "customer")),
        PipelineStage::Unwind("customer".to_string()),
        PipelineStage::Lookup(Lookup::new(model::ORDER_ITEMS, "_id", "order_id", "items")),
        PipelineStage::Unwind("items".to_string()),
        PipelineStage::Lookup(Lookup::new(
            model::PRODUCTS,
            "items.product_id",
            "_id",
            "product",
        )),
        PipelineStage::Unwind("product".to_string()),
        PipelineStage::Lookup(Lookup::new(
            model::SHIPPING_ADDRESSES,
            "shipping_address_id",
            "_id",
            "shipping_address",
        )),
        PipelineStage::Unwind("shipping_address".to_string()),
        PipelineStage::Lookup(Lookup::new(
            model::PAYMENT_TRANSACTIONS,
            "payment_transaction_id",
            "_id",
            "payment",
        )),
        PipelineStage::Unwind("payment".to_string()),
        PipelineStage::Project(vec![
            ("order_id".to_string(), Expr::field("_id")),
            ("customer_id".to_string(), Expr::field("customer_id")),
            ("customer_name".to_string(), Expr::field("customer.name")),
            ("product_name".to_string(), Expr::field("product.name")),
            ("quantity".to_string(), Expr::field("items.quantity")),
            (
                "total_price".to_string(),
                Expr::mul(Expr::field("items.quantity"), Expr::field("items.unit_price")),
            ),
            (
                "shipping_city".to_string(),
                Expr::field("shipping_address.city"),
            ),
            ("payment_status".to_string(), Expr::field("payment.status")),
            ("order_date".to_string(), Expr::field("order_date")),
        ]),
    ];
    if let Some(id) = customer_id {
        stages.push(PipelineStage::Match(field("customer_id").eq(*id)));
    }
    stages.push(PipelineStage::Group {
        key: vec![
            ("customer_name".to_string(), Expr::field("customer_name")),
            ("product_name".to_string(), Expr::field("product_name")),
        ],
        accumulators: vec![
            (
                "total_quantity".to_string(),
                Accumulator::Sum(Expr::field("quantity")),
            ),
            (
                "total_revenue".to_string(),
                Accumulator::Sum(Expr::field("total_price")),
            ),
        ],
    });
    stages.push(PipelineStage::Sort(
        "total_revenue".to_string(),
        SortOrder::Descending,
    ));
    stages
}

/// Stages 2 and 3: the customer filter leads, only the three needed
/// lookups follow, and projection is folded into the group stage.
fn filter_first_pipeline(customer_id: Option<&DocId>) -> Vec<PipelineStage> {
    let mut stages = Vec::new();
    if let Some(id) = customer_id {
        stages.push(PipelineStage::Match(field("customer_id").eq(*id)));
    }
    stages.extend([
        PipelineStage::Lookup(Lookup::new(model::CUSTOMERS, "customer_id", "_id", "customer")),
        PipelineStage::Unwind("customer".to_string()),
        PipelineStage::Lookup(Lookup::new(model::ORDER_ITEMS, "_id", "order_id", "items")),
        PipelineStage::Unwind("items".to_string()),
        PipelineStage::Lookup(Lookup::new(
            model::PRODUCTS,
            "items.product_id",
            "_id",
            "product",
        )),
        PipelineStage::Unwind("product".to_string()),
        PipelineStage::Group {
            key: vec![
                ("customer_name".to_string(), Expr::field("customer.name")),
                ("product_name".to_string(), Expr::field("product.name")),
            ],
            accumulators: vec![
                (
                    "total_quantity".to_string(),
                    Accumulator::Sum(Expr::field("items.quantity")),
                ),
                (
                    "total_revenue".to_string(),
                    Accumulator::Sum(Expr::mul(
                        Expr::field("items.quantity"),
                        Expr::field("items.unit_price"),
                    )),
                ),
            ],
        },
        PipelineStage::Sort("total_revenue".to_string(), SortOrder::Descending),
    ]);
    stages
}

/// Stage 4: filter the summary relation, strip internal ids, sort.
/// Answers come from the snapshot built at load time; data written
/// after that snapshot is invisible here.
fn denormalized_pipeline(customer_id: Option<&DocId>) -> Vec<PipelineStage> {
    let mut stages = Vec::new();
    if let Some(id) = customer_id {
        stages.push(PipelineStage::Match(field("customer_id").eq(*id)));
    }
    stages.extend([
        PipelineStage::Exclude(vec!["_id".to_string(), "customer_id".to_string()]),
        PipelineStage::Sort("total_revenue".to_string(), SortOrder::Descending),
    ]);
    stages
}
