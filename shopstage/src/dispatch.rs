//! Routing from a requested stage number to the matching strategy and
//! target.

use stagedb::{connect, DocId, ErrorKind, StoreError, StoreResult};

use crate::stage::{RevenueRow, Stage};

/// Answers a per-customer revenue lookup through the requested stage.
///
/// Opens a fresh handle for the duration of this one request; the
/// handle is released on every exit path when it drops. An out-of-range
/// stage number is an [ErrorKind::InvalidOperation] error.
pub fn dispatch(root: &str, stage_number: u8, customer_id: &DocId) -> StoreResult<Vec<RevenueRow>> {
    let stage = Stage::from_number(stage_number).ok_or_else(|| {
        StoreError::new(
            &format!("unknown stage {} (expected 1-4)", stage_number),
            ErrorKind::InvalidOperation,
        )
    })?;
    let db = connect(&stage.target(root))?;
    stage.run(&db, Some(customer_id))
}
