//! HTTP entry point: serves the staged lookup routes until killed.
//!
//! The store lives in this process, so an empty stage-1 target on
//! startup means nothing was loaded yet; in that case the full fan-out
//! load runs first.

use shopstage::{generate_dataset, model, run_load, server, Config, Stage};
use stagedb::{connect, StoreResult};
use std::process;

fn ensure_loaded(config: &Config) -> StoreResult<()> {
    let db = connect(&Stage::Naive.target(&config.store_root))?;
    if db.collection(model::CUSTOMERS)?.size() > 0 {
        return Ok(());
    }
    log::info!("stores are empty, loading {} documents", config.doc_count);
    let dataset = generate_dataset(config.doc_count);
    run_load(&config.store_root, &Stage::ALL, &dataset)
}

fn main() {
    env_logger::init();
    let config = Config::from_env();

    if let Err(err) = ensure_loaded(&config) {
        log::error!("initial load failed: {}", err);
        process::exit(1);
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            log::error!("failed to build runtime: {}", err);
            process::exit(1);
        }
    };
    if let Err(err) = runtime.block_on(server::run(&config)) {
        log::error!("server failed: {}", err);
        process::exit(1);
    }
}
