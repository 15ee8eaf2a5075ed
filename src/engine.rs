//! The attendance engine: accept/skip decisions over recognition events,
//! plus the read APIs for history, statistics and per-user patterns.
//!
//! Writes go store-first, cache-second: a user is only marked present in
//! the cache after the durable insert committed, so a failed write can
//! never leave a phantom "present" entry. Two concurrent accepts for the
//! same user and day can still both pass the duplicate check before either
//! writes; that race is tolerated here and corrected by the sweeper.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::cache::PresenceCache;
use crate::clock::{Clock, SystemClock};
use crate::config::AttendanceConfig;
use crate::db::{Database, HistoryEntry};
use crate::error::{Error, Result};

/// Result of a record attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// A new record was persisted.
    Accepted,
    /// The user was already marked present today; nothing was written.
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct Statistics {
    pub total_users: i64,
    pub today_count: usize,
    pub weekly_count: usize,
    pub rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttendancePatterns {
    /// Record count per weekday, keyed "0" (Sunday) through "6" (Saturday).
    pub daily_patterns: BTreeMap<String, i64>,
    /// Mean hour-of-day across all records, 0 when there are none.
    pub average_time: f64,
}

pub struct AttendanceEngine {
    db: Database,
    cache: Mutex<PresenceCache>,
    clock: Box<dyn Clock>,
    config: AttendanceConfig,
}

impl AttendanceEngine {
    pub fn new(db: Database, config: AttendanceConfig) -> Self {
        Self::with_clock(db, config, Box::new(SystemClock))
    }

    pub fn with_clock(db: Database, config: AttendanceConfig, clock: Box<dyn Clock>) -> Self {
        let today = config.day_boundary.date_of(clock.now());
        let cache = Mutex::new(PresenceCache::new(today, config.retention_days));
        Self {
            db,
            cache,
            clock,
            config,
        }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &AttendanceConfig {
        &self.config
    }

    /// Decide whether a recognition event counts as new attendance.
    ///
    /// At most one record per user per calendar day is accepted, as long as
    /// this cache instance has been alive for the whole day. The duplicate
    /// check is cache-only; a process restart loses today's suppression
    /// state and the sweeper becomes the backstop.
    pub fn record_attendance(
        &self,
        user_id: i64,
        confidence: f64,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<Outcome> {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(Error::InvalidInput(format!(
                "confidence {confidence} outside [0, 1]"
            )));
        }
        if !self.db.user_exists(user_id)? {
            return Err(Error::UnknownUser(user_id));
        }

        let ts = timestamp.unwrap_or_else(|| self.clock.now());
        let day = self.config.day_boundary.date_of(ts);

        {
            let mut cache = self.cache.lock().unwrap();
            cache.rollover(day);
            if cache.is_present(day, user_id) {
                tracing::debug!(user_id, %day, "already marked present, skipping");
                return Ok(Outcome::Skipped);
            }
            // Lock released before the store write; the resulting
            // check-then-act window is the documented race.
        }

        self.db.insert_record(user_id, ts, confidence)?;

        let mut cache = self.cache.lock().unwrap();
        cache.mark_present(day, user_id);
        tracing::info!(user_id, confidence, %day, "attendance recorded");
        Ok(Outcome::Accepted)
    }

    /// Durable history for one user, most recent first, inclusive bounds.
    pub fn attendance_history(
        &self,
        user_id: i64,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<HistoryEntry>> {
        self.db.history(user_id, start, end)
    }

    /// Aggregate statistics. Today's and the week's counts come from the
    /// presence cache for O(1) reads; only the user total hits the store.
    pub fn statistics(&self) -> Result<Statistics> {
        let today = self.config.day_boundary.date_of(self.clock.now());
        let (today_count, weekly_count) = {
            let mut cache = self.cache.lock().unwrap();
            cache.rollover(today);
            (cache.day_count(today), cache.weekly_count())
        };

        let total_users = self.db.count_users()?;
        let rate = if total_users > 0 {
            weekly_count as f64 / total_users as f64 * 100.0
        } else {
            0.0
        };

        Ok(Statistics {
            total_users,
            today_count,
            weekly_count,
            rate,
        })
    }

    /// Weekday distribution and mean arrival hour for one user.
    pub fn user_patterns(&self, user_id: i64) -> Result<AttendancePatterns> {
        let records = self.db.records_for_user(user_id)?;

        let mut daily_patterns: BTreeMap<String, i64> = BTreeMap::new();
        let mut total_hours = 0u64;
        for record in &records {
            let weekday = self
                .config
                .day_boundary
                .date_of(record.timestamp)
                .format("%w")
                .to_string();
            *daily_patterns.entry(weekday).or_insert(0) += 1;
            total_hours += self.config.day_boundary.hour_of(record.timestamp) as u64;
        }

        let average_time = if records.is_empty() {
            0.0
        } else {
            total_hours as f64 / records.len() as f64
        };

        Ok(AttendancePatterns {
            daily_patterns,
            average_time,
        })
    }

    /// Drop all cached presence state and start fresh with today.
    ///
    /// Called when the recognition pipeline restarts. Users marked present
    /// earlier today will be accepted again even though their store rows
    /// remain; the sweeper reconciles any duplicates that produces.
    pub fn reset_cache(&self) {
        let today = self.config.day_boundary.date_of(self.clock.now());
        self.cache.lock().unwrap().reset(today);
        tracing::info!("presence cache reset");
    }
}
