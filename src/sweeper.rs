//! Corrective pass that removes near-duplicate attendance records.
//!
//! The engine's duplicate check is cache-only, so concurrent accepts,
//! retried clients or a restarted process can leave multiple rows for one
//! real attendance event. The sweeper partitions records by
//! (user, floor-aligned time window), keeps the earliest row per partition
//! and deletes the rest. Each pass runs in a single transaction: all
//! deletions commit or none do.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;

use crate::db::Database;
use crate::error::Result;

/// Floor a timestamp to the start of its window. Flooring whole epoch
/// seconds both truncates sub-minute detail and aligns to the window width.
fn window_start(ts: DateTime<Utc>, window_minutes: u32) -> DateTime<Utc> {
    let width = window_minutes as i64 * 60;
    let overshoot = ts.timestamp().rem_euclid(width);
    ts - Duration::seconds(overshoot)
}

/// Sweep the whole store. Returns how many duplicate rows were deleted.
pub fn sweep_duplicates(db: &Database, window_minutes: u32) -> Result<usize> {
    // Records arrive ordered by (timestamp, id), so the first row seen in
    // each partition is the one to keep.
    let records = db.all_records()?;
    let mut seen: HashSet<(i64, i64)> = HashSet::new();
    let mut to_delete = Vec::new();
    for record in &records {
        let key = (
            record.user_id,
            window_start(record.timestamp, window_minutes).timestamp(),
        );
        if !seen.insert(key) {
            to_delete.push(record.id);
        }
    }

    if to_delete.is_empty() {
        return Ok(0);
    }

    let tx = db.transaction()?;
    let deleted = db.delete_records_by_ids(&to_delete)?;
    tx.commit()?;
    tracing::info!(deleted, scanned = records.len(), "duplicate sweep completed");
    Ok(deleted)
}

/// Sweep only the single window containing `reference` for one user.
///
/// Used right after a direct insert path that bypasses the engine's cache
/// check, to bound the damage of a raced or retried write.
pub fn sweep_user_window(
    db: &Database,
    user_id: i64,
    reference: DateTime<Utc>,
    window_minutes: u32,
) -> Result<usize> {
    let start = window_start(reference, window_minutes);
    let end = start + Duration::minutes(window_minutes as i64);

    let records = db.records_in_window(user_id, start, end)?;
    // Keep the earliest; everything after it in (timestamp, id) order goes.
    let to_delete: Vec<i64> = records.iter().skip(1).map(|r| r.id).collect();
    if to_delete.is_empty() {
        return Ok(0);
    }

    let tx = db.transaction()?;
    let deleted = db.delete_records_by_ids(&to_delete)?;
    tx.commit()?;
    tracing::debug!(user_id, deleted, %start, "scoped duplicate sweep completed");
    Ok(deleted)
}
