//! # ShopStage - Staged Query Optimization Demo
//!
//! ShopStage generates a synthetic e-commerce dataset, fans it out to
//! four independently configured store targets ("stages"), and answers
//! the same analytical question - revenue and quantity per customer and
//! product - through four increasingly optimized strategies:
//!
//! 1. **Naive**: joins everything (customers, items, products, shipping
//!    addresses, payment transactions) before filtering.
//! 2. **Filter-first**: pushes the customer filter ahead of the joins
//!    and only joins what the answer needs.
//! 3. **Indexed**: the filter-first plan against a target whose join
//!    fields are indexed.
//! 4. **Denormalized**: reads a precomputed summary relation, no joins
//!    at all.
//!
//! All four return the same row set for the same customer; only the
//! execution cost differs.
//!
//! ## Module Organization
//!
//! - [`config`] - Environment-backed configuration
//! - [`dispatch`] - Stage-number to strategy routing
//! - [`gen`] - Synthetic dataset generation
//! - [`load`] - Per-stage loader and the parallel load orchestrator
//! - [`model`] - Entity types and document codecs
//! - [`server`] - HTTP read surface
//! - [`stage`] - The four stages and their aggregation pipelines
//! - [`summary`] - Denormalized summary builder

pub mod config;
pub mod dispatch;
pub mod gen;
pub mod load;
pub mod model;
pub mod server;
pub mod stage;
pub mod summary;

pub use config::Config;
pub use dispatch::dispatch;
pub use gen::{generate, generate_dataset};
pub use load::{load_stage, run_load};
pub use model::Dataset;
pub use stage::{RevenueRow, Stage};
pub use summary::{build_summary, SummaryBuild};
