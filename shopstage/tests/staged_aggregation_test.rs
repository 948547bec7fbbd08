//! End-to-end checks over the full load-and-query path: strategy
//! equivalence, loader idempotence, and orchestrator fault isolation.

use shopstage::model::{self, Customer, Dataset, Order, OrderItem, Product};
use shopstage::{build_summary, dispatch, generate_dataset, load_stage, run_load, RevenueRow, Stage};
use stagedb::{connect, drop_target, DocId, ErrorKind};
use std::collections::BTreeSet;

#[ctor::ctor]
fn init() {
    colog::init();
}

fn unique_root(suffix: &str) -> String {
    format!("memory://int-test-{}-{}", suffix, DocId::new())
}

fn drop_stages(root: &str) {
    for stage in Stage::ALL {
        drop_target(&stage.target(root)).unwrap();
    }
}

/// Rows compared with revenue rounded to cents, since the four plans
/// sum floats in different orders.
fn comparable(rows: &[RevenueRow]) -> BTreeSet<(String, String, i64, i64)> {
    rows.iter()
        .map(|row| {
            (
                row.customer_name.clone(),
                row.product_name.clone(),
                row.total_quantity,
                (row.total_revenue * 100.0).round() as i64,
            )
        })
        .collect()
}

#[test]
fn test_all_strategies_agree_for_every_customer() {
    let root = unique_root("equivalence");
    let dataset = generate_dataset(15);
    run_load(&root, &Stage::ALL, &dataset).unwrap();

    for customer in &dataset.customers {
        let baseline = dispatch(&root, 1, &customer.id).unwrap();
        let expected = comparable(&baseline);
        for stage_number in 2..=4u8 {
            let rows = dispatch(&root, stage_number, &customer.id).unwrap();
            assert_eq!(
                comparable(&rows),
                expected,
                "stage {} disagrees with the baseline for customer {}",
                stage_number,
                customer.name
            );
        }
    }
    drop_stages(&root);
}

#[test]
fn test_rows_sorted_by_revenue_descending() {
    let root = unique_root("sorting");
    let dataset = generate_dataset(12);
    run_load(&root, &Stage::ALL, &dataset).unwrap();

    for stage in Stage::ALL {
        for customer in &dataset.customers {
            let rows = dispatch(&root, stage.number(), &customer.id).unwrap();
            for pair in rows.windows(2) {
                assert!(
                    pair[0].total_revenue >= pair[1].total_revenue,
                    "stage {} rows out of order",
                    stage.number()
                );
            }
        }
    }
    drop_stages(&root);
}

#[test]
fn test_summary_matches_aggregated_answer() {
    let root = unique_root("summary");
    let alice = Customer {
        id: DocId::new(),
        name: "Alice".to_string(),
        email: "alice@example.com".to_string(),
        phone: "555-0100".to_string(),
    };
    let widget = Product {
        id: DocId::new(),
        name: "Widget".to_string(),
        price: 10.0,
        category: "tools".to_string(),
    };
    let order = Order {
        id: DocId::new(),
        customer_id: alice.id,
        shipping_address_id: DocId::new(),
        payment_transaction_id: DocId::new(),
        order_date: chrono::Utc::now(),
    };
    let item = OrderItem {
        id: DocId::new(),
        order_id: order.id,
        product_id: widget.id,
        quantity: 3,
        unit_price: widget.price,
    };
    let dataset = Dataset {
        customers: vec![alice.clone()],
        products: vec![widget],
        orders: vec![order],
        order_items: vec![item],
        ..Dataset::default()
    };

    run_load(&root, &Stage::ALL, &dataset).unwrap();
    let rows = dispatch(&root, 4, &alice.id).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].customer_name, "Alice");
    assert_eq!(rows[0].product_name, "Widget");
    assert_eq!(rows[0].total_quantity, 3);
    assert_eq!(rows[0].total_revenue, 30.0);
    drop_stages(&root);
}

#[test]
fn test_reload_keeps_counts_and_answers_stable() {
    let root = unique_root("idempotence");
    let dataset = generate_dataset(10);
    run_load(&root, &Stage::ALL, &dataset).unwrap();

    let customer = &dataset.customers[0];
    let before: Vec<_> = (1..=4u8)
        .map(|n| comparable(&dispatch(&root, n, &customer.id).unwrap()))
        .collect();

    run_load(&root, &Stage::ALL, &dataset).unwrap();
    for (i, n) in (1..=4u8).enumerate() {
        assert_eq!(
            comparable(&dispatch(&root, n, &customer.id).unwrap()),
            before[i]
        );
    }

    let db = connect(&Stage::Naive.target(&root)).unwrap();
    assert_eq!(db.collection(model::ORDERS).unwrap().size(), 10);
    drop_stages(&root);
}

#[test]
fn test_one_failing_stage_does_not_poison_the_others() {
    let root = unique_root("fault");
    let dataset = generate_dataset(8);

    // force stage 3 to reject writes before the fan-out starts
    let indexed = connect(&Stage::Indexed.target(&root)).unwrap();
    indexed.set_read_only(true);

    let err = run_load(&root, &Stage::ALL, &dataset).unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::ReadOnly);

    for stage in [Stage::Naive, Stage::FilterFirst] {
        let db = connect(&stage.target(&root)).unwrap();
        assert_eq!(db.collection(model::ORDERS).unwrap().size(), 8);
    }
    let summary = connect(&Stage::Denormalized.target(&root)).unwrap();
    assert!(summary.collection(model::ORDERS_SUMMARY).unwrap().size() > 0);
    assert!(indexed.list_collection_names().is_empty());
    drop_stages(&root);
}

#[test]
fn test_denormalized_answer_is_a_snapshot() {
    let root = unique_root("staleness");
    let dataset = generate_dataset(6);
    run_load(&root, &Stage::ALL, &dataset).unwrap();

    // write past the snapshot: new data lands in stage 1 only
    let extra = generate_dataset(6);
    let db = connect(&Stage::Naive.target(&root)).unwrap();
    load_stage(&db, Stage::Naive, &extra).unwrap();

    let customer = &extra.customers[0];
    let fresh = dispatch(&root, 1, &customer.id).unwrap();
    let stale = dispatch(&root, 4, &customer.id).unwrap();
    assert!(stale.is_empty() || comparable(&stale) != comparable(&fresh));
    drop_stages(&root);
}

#[test]
fn test_summary_row_count_matches_loaded_summary() {
    let root = unique_root("rowcount");
    let dataset = generate_dataset(10);
    let build = build_summary(&dataset);
    assert_eq!(build.skipped_orders, 0);
    assert_eq!(build.skipped_items, 0);

    let db = connect(&Stage::Denormalized.target(&root)).unwrap();
    load_stage(&db, Stage::Denormalized, &dataset).unwrap();
    assert_eq!(
        db.collection(model::ORDERS_SUMMARY).unwrap().size(),
        build.rows.len()
    );
    drop_stages(&root);
}

#[test]
fn test_dispatch_rejects_out_of_range_stage() {
    let root = unique_root("badstage");
    let err = dispatch(&root, 0, &DocId::new()).unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::InvalidOperation);
    let err = dispatch(&root, 7, &DocId::new()).unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::InvalidOperation);
}
