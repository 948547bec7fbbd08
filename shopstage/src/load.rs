//! Per-stage bulk loading and the parallel load orchestrator.
//!
//! Every stage owns an isolated target. A load always starts from a
//! clean slate (drop, then insert), so re-running it is idempotent.

use stagedb::{connect, Database, ErrorKind, SortOrder, StoreError, StoreResult};
use std::time::Instant;

use crate::model::{self, Dataset};
use crate::stage::Stage;
use crate::summary::build_summary;

/// Loads one stage's target from the shared dataset.
///
/// Stages 1-3 insert the six base collections verbatim; stage 3 then
/// indexes the two join fields its query plan probes. Stage 4 skips the
/// base collections entirely and materializes the summary relation
/// with a compound index for per-customer retrieval by revenue.
pub fn load_stage(db: &Database, stage: Stage, dataset: &Dataset) -> StoreResult<()> {
    db.drop_all()?;

    match stage {
        Stage::Naive | Stage::FilterFirst | Stage::Indexed => {
            insert_base_collections(db, dataset)?;
            if stage == Stage::Indexed {
                db.collection(model::ORDERS)?
                    .create_index(&[("customer_id", SortOrder::Ascending)])?;
                db.collection(model::ORDER_ITEMS)?
                    .create_index(&[("order_id", SortOrder::Ascending)])?;
            }
        }
        Stage::Denormalized => {
            let build = build_summary(dataset);
            let summary = db.collection(model::ORDERS_SUMMARY)?;
            summary.insert_many(build.rows.iter().map(|row| row.to_document()).collect())?;
            summary.create_index(&[
                ("customer_id", SortOrder::Ascending),
                ("total_revenue", SortOrder::Descending),
            ])?;
        }
    }
    Ok(())
}

fn insert_base_collections(db: &Database, dataset: &Dataset) -> StoreResult<()> {
    db.collection(model::CUSTOMERS)?
        .insert_many(dataset.customers.iter().map(|c| c.to_document()).collect())?;
    db.collection(model::PRODUCTS)?
        .insert_many(dataset.products.iter().map(|p| p.to_document()).collect())?;
    db.collection(model::SHIPPING_ADDRESSES)?.insert_many(
        dataset
            .shipping_addresses
            .iter()
            .map(|a| a.to_document())
            .collect(),
    )?;
    db.collection(model::PAYMENT_TRANSACTIONS)?.insert_many(
        dataset
            .payment_transactions
            .iter()
            .map(|p| p.to_document())
            .collect(),
    )?;
    db.collection(model::ORDERS)?
        .insert_many(dataset.orders.iter().map(|o| o.to_document()).collect())?;
    db.collection(model::ORDER_ITEMS)?.insert_many(
        dataset
            .order_items
            .iter()
            .map(|i| i.to_document())
            .collect(),
    )?;
    Ok(())
}

/// Fans the dataset out to every listed stage concurrently.
///
/// One worker thread per stage, each opening its own handle to its own
/// target; the dataset is shared by reference, read-only. All workers
/// are joined; the first failure is returned, but siblings keep running
/// to completion and their finished work is left intact.
pub fn run_load(root: &str, stages: &[Stage], dataset: &Dataset) -> StoreResult<()> {
    let results: Vec<StoreResult<()>> = std::thread::scope(|scope| {
        let handles: Vec<_> = stages
            .iter()
            .map(|&stage| {
                scope.spawn(move || {
                    let started = Instant::now();
                    let result = connect(&stage.target(root))
                        .and_then(|db| load_stage(&db, stage, dataset));
                    match &result {
                        Ok(()) => log::info!(
                            "stage {} loaded in {:?}",
                            stage.number(),
                            started.elapsed()
                        ),
                        Err(err) => {
                            log::error!("stage {} load failed: {}", stage.number(), err)
                        }
                    }
                    result
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| {
                handle.join().unwrap_or_else(|_| {
                    Err(StoreError::new(
                        "stage load worker panicked",
                        ErrorKind::InternalError,
                    ))
                })
            })
            .collect()
    });

    for result in results {
        result?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gen::generate_dataset;
    use stagedb::{drop_target, DocId};

    fn test_root(suffix: &str) -> String {
        format!("memory://load-test-{}-{}", suffix, DocId::new())
    }

    fn cleanup(root: &str) {
        for stage in Stage::ALL {
            drop_target(&stage.target(root)).unwrap();
        }
    }

    #[test]
    fn test_base_stage_loads_all_collections() {
        let root = test_root("base");
        let dataset = generate_dataset(10);
        let db = connect(&Stage::Naive.target(&root)).unwrap();
        load_stage(&db, Stage::Naive, &dataset).unwrap();

        assert_eq!(db.collection(model::CUSTOMERS).unwrap().size(), 10);
        assert_eq!(db.collection(model::ORDERS).unwrap().size(), 10);
        assert_eq!(
            db.collection(model::ORDER_ITEMS).unwrap().size(),
            dataset.order_items.len()
        );
        cleanup(&root);
    }

    #[test]
    fn test_indexed_stage_declares_indexes() {
        let root = test_root("indexed");
        let dataset = generate_dataset(5);
        let db = connect(&Stage::Indexed.target(&root)).unwrap();
        load_stage(&db, Stage::Indexed, &dataset).unwrap();

        assert!(db
            .collection(model::ORDERS)
            .unwrap()
            .has_index(&["customer_id"]));
        assert!(db
            .collection(model::ORDER_ITEMS)
            .unwrap()
            .has_index(&["order_id"]));
        cleanup(&root);
    }

    #[test]
    fn test_denormalized_stage_skips_base_collections() {
        let root = test_root("denorm");
        let dataset = generate_dataset(5);
        let db = connect(&Stage::Denormalized.target(&root)).unwrap();
        load_stage(&db, Stage::Denormalized, &dataset).unwrap();

        assert_eq!(
            db.list_collection_names(),
            vec![model::ORDERS_SUMMARY.to_string()]
        );
        assert!(db
            .collection(model::ORDERS_SUMMARY)
            .unwrap()
            .has_index(&["customer_id", "total_revenue"]));
        cleanup(&root);
    }

    #[test]
    fn test_reload_is_idempotent() {
        let root = test_root("idempotent");
        let dataset = generate_dataset(8);
        let db = connect(&Stage::Naive.target(&root)).unwrap();
        load_stage(&db, Stage::Naive, &dataset).unwrap();
        let first_orders = db.collection(model::ORDERS).unwrap().size();
        let first_items = db.collection(model::ORDER_ITEMS).unwrap().size();

        load_stage(&db, Stage::Naive, &dataset).unwrap();
        assert_eq!(db.collection(model::ORDERS).unwrap().size(), first_orders);
        assert_eq!(
            db.collection(model::ORDER_ITEMS).unwrap().size(),
            first_items
        );
        cleanup(&root);
    }

    #[test]
    fn test_run_load_populates_every_stage() {
        let root = test_root("fanout");
        let dataset = generate_dataset(6);
        run_load(&root, &Stage::ALL, &dataset).unwrap();

        for stage in [Stage::Naive, Stage::FilterFirst, Stage::Indexed] {
            let db = connect(&stage.target(&root)).unwrap();
            assert_eq!(db.collection(model::ORDERS).unwrap().size(), 6);
        }
        let summary = connect(&Stage::Denormalized.target(&root)).unwrap();
        assert!(summary
            .collection(model::ORDERS_SUMMARY)
            .unwrap()
            .size()
            > 0);
        cleanup(&root);
    }
}
