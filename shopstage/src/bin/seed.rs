//! Bulk-load entry point: generates one dataset and fans it out to all
//! four stage targets.

use shopstage::{generate_dataset, run_load, Config, Stage};
use std::process;

fn main() {
    env_logger::init();
    let config = Config::from_env();

    log::info!(
        "seeding {} documents per base collection under {}",
        config.doc_count,
        config.store_root
    );
    let dataset = generate_dataset(config.doc_count);
    log::info!("generated {} documents", dataset.total_documents());

    if let Err(err) = run_load(&config.store_root, &Stage::ALL, &dataset) {
        log::error!("seed failed: {}", err);
        process::exit(1);
    }
    log::info!("all stages loaded");
}
