//! Denormalized summary construction.
//!
//! Folds the generated dataset into one row per (customer name, product
//! name) pair holding the total quantity and revenue for that pair.
//! Runs in O(n + m) over the orders and items via id lookup maps.

use indexmap::IndexMap;
use stagedb::DocId;
use std::collections::HashMap;

use crate::model::{Customer, Dataset, OrderItem, OrderSummary, Product};

/// Result of a summary build, including how many records were dropped
/// because a foreign key failed to resolve. Dangling references should
/// not occur in a generated dataset; they are skipped rather than
/// failing the build, but the skips are counted so callers can notice.
#[derive(Debug, Clone, Default)]
pub struct SummaryBuild {
    pub rows: Vec<OrderSummary>,
    pub skipped_orders: usize,
    pub skipped_items: usize,
}

/// Builds the summary relation from a dataset.
///
/// Rows are keyed by the (customer name, product name) pair. Grouping
/// by name rather than id means two customers with an identical
/// generated name share one row; the row's `customer_id` is the id of
/// the first customer encountered for that name. Output preserves
/// first-occurrence order.
pub fn build_summary(dataset: &Dataset) -> SummaryBuild {
    let customers: HashMap<DocId, &Customer> =
        dataset.customers.iter().map(|c| (c.id, c)).collect();
    let products: HashMap<DocId, &Product> = dataset.products.iter().map(|p| (p.id, p)).collect();

    let mut items_by_order: HashMap<DocId, Vec<&OrderItem>> = HashMap::new();
    for item in &dataset.order_items {
        items_by_order.entry(item.order_id).or_default().push(item);
    }

    let mut groups: IndexMap<(String, String), OrderSummary> = IndexMap::new();
    let mut skipped_orders = 0;
    let mut skipped_items = 0;

    for order in &dataset.orders {
        let Some(customer) = customers.get(&order.customer_id) else {
            skipped_orders += 1;
            log::warn!(
                "summary: order {} references missing customer {}, skipping",
                order.id,
                order.customer_id
            );
            continue;
        };
        let Some(items) = items_by_order.get(&order.id) else {
            continue;
        };
        for item in items {
            let Some(product) = products.get(&item.product_id) else {
                skipped_items += 1;
                log::warn!(
                    "summary: item {} references missing product {}, skipping",
                    item.id,
                    item.product_id
                );
                continue;
            };
            let key = (customer.name.clone(), product.name.clone());
            let row = groups.entry(key).or_insert_with(|| OrderSummary {
                customer_id: customer.id,
                customer_name: customer.name.clone(),
                product_name: product.name.clone(),
                total_quantity: 0,
                total_revenue: 0.0,
            });
            row.total_quantity += item.quantity;
            row.total_revenue += item.quantity as f64 * item.unit_price;
        }
    }

    if skipped_orders > 0 || skipped_items > 0 {
        log::warn!(
            "summary: skipped {} orders and {} items with dangling references",
            skipped_orders,
            skipped_items
        );
    }

    SummaryBuild {
        rows: groups.into_values().collect(),
        skipped_orders,
        skipped_items,
    }
}
