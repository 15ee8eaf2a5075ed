//! Attendance record storage and queries.
//!
//! Timestamps are stored as UTC text in ISO 8601 (`%Y-%m-%dT%H:%M:%S`),
//! which compares correctly as text, so range queries run directly against
//! the stored strings.

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::params;
use serde::Serialize;

use super::Database;
use crate::error::{Error, Result};

pub(crate) const DB_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// One accepted recognition event. Never mutated after insert; deleted only
/// by the sweeper or user cleanup.
#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceRecord {
    pub id: i64,
    pub user_id: i64,
    pub timestamp: DateTime<Utc>,
    pub confidence: f64,
}

/// History row returned to callers: timestamp and confidence only.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub confidence: f64,
}

/// A recent record joined with the user's display name.
#[derive(Debug, Clone)]
pub struct RecentRecord {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub timestamp: DateTime<Utc>,
    pub confidence: f64,
}

pub(crate) fn format_db_timestamp(ts: DateTime<Utc>) -> String {
    ts.format(DB_TIMESTAMP_FORMAT).to_string()
}

/// Parse a stored timestamp. Accepts our ISO format and the space-separated
/// form SQLite's CURRENT_TIMESTAMP default produces.
pub(crate) fn parse_db_timestamp(value: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, DB_TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S"))
        .map(|dt| dt.and_utc())
        .map_err(|_| Error::InvalidInput(format!("malformed timestamp '{value}' in record store")))
}

impl Database {
    /// Insert an attendance record and return its store-assigned id.
    pub fn insert_record(
        &self,
        user_id: i64,
        timestamp: DateTime<Utc>,
        confidence: f64,
    ) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO attendance_records (user_id, timestamp, confidence) VALUES (?, ?, ?)",
            params![user_id, format_db_timestamp(timestamp), confidence],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Attendance history for one user, most recent first. Bounds are
    /// inclusive when supplied. Reads durable state only; the presence
    /// cache is never consulted here.
    pub fn history(
        &self,
        user_id: i64,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<HistoryEntry>> {
        let start = start.map(format_db_timestamp);
        let end = end.map(format_db_timestamp);

        let mut sql = String::from(
            "SELECT timestamp, confidence FROM attendance_records WHERE user_id = ?",
        );
        let mut args: Vec<&dyn rusqlite::ToSql> = vec![&user_id];
        if let Some(ref start) = start {
            sql.push_str(" AND timestamp >= ?");
            args.push(start);
        }
        if let Some(ref end) = end {
            sql.push_str(" AND timestamp <= ?");
            args.push(end);
        }
        sql.push_str(" ORDER BY timestamp DESC, id DESC");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(&args[..], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (timestamp, confidence) = row?;
            entries.push(HistoryEntry {
                timestamp: parse_db_timestamp(&timestamp)?,
                confidence,
            });
        }
        Ok(entries)
    }

    /// All records for one user, unordered. Used for pattern aggregation.
    pub fn records_for_user(&self, user_id: i64) -> Result<Vec<AttendanceRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, timestamp, confidence FROM attendance_records WHERE user_id = ?",
        )?;
        let rows = stmt.query_map([user_id], map_record_row)?;
        collect_records(rows)
    }

    /// Every record in the store, ordered by timestamp then insertion order.
    /// The sweeper relies on this ordering to keep the earliest per window.
    pub fn all_records(&self) -> Result<Vec<AttendanceRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, timestamp, confidence FROM attendance_records \
             ORDER BY timestamp ASC, id ASC",
        )?;
        let rows = stmt.query_map([], map_record_row)?;
        collect_records(rows)
    }

    /// Records for one user inside [start, end), ordered by timestamp then
    /// id. Used by the scoped sweep.
    pub fn records_in_window(
        &self,
        user_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<AttendanceRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, timestamp, confidence FROM attendance_records \
             WHERE user_id = ? AND timestamp >= ? AND timestamp < ? \
             ORDER BY timestamp ASC, id ASC",
        )?;
        let rows = stmt.query_map(
            params![user_id, format_db_timestamp(start), format_db_timestamp(end)],
            map_record_row,
        )?;
        collect_records(rows)
    }

    /// Delete records by id. Runs on the caller's connection, so it
    /// participates in any transaction the caller has open.
    pub fn delete_records_by_ids(&self, ids: &[i64]) -> Result<usize> {
        let mut deleted = 0;
        // SQLite limits bound parameters per statement; chunk the id list.
        for chunk in ids.chunks(500) {
            let placeholders = vec!["?"; chunk.len()].join(",");
            let sql = format!(
                "DELETE FROM attendance_records WHERE id IN ({})",
                placeholders
            );
            deleted += self
                .conn
                .execute(&sql, rusqlite::params_from_iter(chunk.iter()))?;
        }
        Ok(deleted)
    }

    /// Latest records joined with user names, most recent first.
    pub fn recent_records(&self, limit: usize) -> Result<Vec<RecentRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT ar.id, ar.user_id, u.name, ar.timestamp, ar.confidence
            FROM attendance_records ar
            JOIN users u ON ar.user_id = u.id
            ORDER BY ar.timestamp DESC, ar.id DESC
            LIMIT ?
            "#,
        )?;
        let rows = stmt.query_map([limit as i64], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, f64>(4)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, user_id, name, timestamp, confidence) = row?;
            records.push(RecentRecord {
                id,
                user_id,
                name,
                timestamp: parse_db_timestamp(&timestamp)?,
                confidence,
            });
        }
        Ok(records)
    }

    pub fn count_records(&self) -> Result<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM attendance_records",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

type RawRecordRow = (i64, i64, String, f64);

fn map_record_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRecordRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn collect_records(
    rows: impl Iterator<Item = rusqlite::Result<RawRecordRow>>,
) -> Result<Vec<AttendanceRecord>> {
    let mut records = Vec::new();
    for row in rows {
        let (id, user_id, timestamp, confidence) = row?;
        records.push(AttendanceRecord {
            id,
            user_id,
            timestamp: parse_db_timestamp(&timestamp)?,
            confidence,
        });
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn test_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        db.register_user(1, "Alice").unwrap();
        db.register_user(2, "Bob").unwrap();
        db
    }

    fn ts(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 10, h, m, 0).unwrap()
    }

    #[test]
    fn test_timestamp_round_trip() {
        let original = ts(9, 30);
        let parsed = parse_db_timestamp(&format_db_timestamp(original)).unwrap();
        assert_eq!(parsed, original);
        // SQLite's own default format is accepted too.
        assert_eq!(parse_db_timestamp("2024-06-10 09:30:00").unwrap(), original);
        assert!(parse_db_timestamp("yesterday-ish").is_err());
    }

    #[test]
    fn test_history_is_most_recent_first() {
        let db = test_db();
        db.insert_record(1, ts(9, 0), 0.95).unwrap();
        db.insert_record(1, ts(14, 0), 0.85).unwrap();
        db.insert_record(1, ts(11, 0), 0.9).unwrap();
        db.insert_record(2, ts(10, 0), 0.8).unwrap();

        let history = db.history(1, None, None).unwrap();
        assert_eq!(history.len(), 3);
        for pair in history.windows(2) {
            assert!(pair[0].timestamp >= pair[1].timestamp);
        }
        assert_eq!(history[0].timestamp, ts(14, 0));
    }

    #[test]
    fn test_history_bounds_inclusive() {
        let db = test_db();
        db.insert_record(1, ts(9, 0), 0.9).unwrap();
        db.insert_record(1, ts(10, 0), 0.9).unwrap();
        db.insert_record(1, ts(11, 0), 0.9).unwrap();

        let history = db.history(1, Some(ts(9, 0)), Some(ts(10, 0))).unwrap();
        let times: Vec<_> = history.iter().map(|e| e.timestamp).collect();
        assert_eq!(times, vec![ts(10, 0), ts(9, 0)]);
    }

    #[test]
    fn test_records_in_window_excludes_end() {
        let db = test_db();
        db.insert_record(1, ts(9, 0), 0.9).unwrap();
        db.insert_record(1, ts(9, 4), 0.9).unwrap();
        db.insert_record(1, ts(9, 5), 0.9).unwrap();

        let window = db.records_in_window(1, ts(9, 0), ts(9, 5)).unwrap();
        assert_eq!(window.len(), 2);
    }

    #[test]
    fn test_delete_by_ids() {
        let db = test_db();
        let a = db.insert_record(1, ts(9, 0), 0.9).unwrap();
        let _b = db.insert_record(1, ts(9, 1), 0.9).unwrap();
        let c = db.insert_record(2, ts(9, 2), 0.9).unwrap();

        let deleted = db.delete_records_by_ids(&[a, c]).unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(db.count_records().unwrap(), 1);
    }

    #[test]
    fn test_recent_joins_names() {
        let db = test_db();
        db.insert_record(1, ts(9, 0), 0.95).unwrap();
        db.insert_record(2, ts(10, 0), 0.75).unwrap();

        let recent = db.recent_records(10).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].name, "Bob");
        assert_eq!(recent[1].name, "Alice");
    }
}
