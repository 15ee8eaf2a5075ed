//! In-memory index of which users have been marked present on which day.
//!
//! This is a derived, best-effort optimization over the record store: it
//! short-circuits duplicate writes and answers today's/weekly counts without
//! scanning the database. It is never the source of truth. Every id added
//! here must already correspond to a committed store row, and a missing day
//! entry just means "no one cached for that day", never an error.
//!
//! The cache is owned by the engine and passed around explicitly; all
//! operations are pure in-memory transformations and cannot fail.

use chrono::{Duration, NaiveDate};
use std::collections::{HashMap, HashSet};

#[derive(Debug)]
pub struct PresenceCache {
    days: HashMap<NaiveDate, HashSet<i64>>,
    retention_days: u32,
}

impl PresenceCache {
    /// Create a cache with today's date pre-populated and empty.
    pub fn new(today: NaiveDate, retention_days: u32) -> Self {
        let mut cache = Self {
            days: HashMap::new(),
            retention_days,
        };
        cache.reset(today);
        cache
    }

    /// Drop all cached days and start fresh with just today.
    ///
    /// Called when the recognition pipeline restarts, so stale suppression
    /// from a previous run does not block new accepts.
    pub fn reset(&mut self, today: NaiveDate) {
        self.days.clear();
        self.days.insert(today, HashSet::new());
    }

    /// Day rollover: if `today` has no entry yet, prune days older than the
    /// retention window and create an empty set for today.
    pub fn rollover(&mut self, today: NaiveDate) {
        if self.days.contains_key(&today) {
            return;
        }
        let cutoff = today - Duration::days(self.retention_days as i64);
        self.days.retain(|day, _| *day >= cutoff);
        self.days.insert(today, HashSet::new());
    }

    pub fn is_present(&self, day: NaiveDate, user_id: i64) -> bool {
        self.days
            .get(&day)
            .map(|ids| ids.contains(&user_id))
            .unwrap_or(false)
    }

    /// Record a user as present for a day. Only call after the store write
    /// has committed; the cache must never run ahead of durable state.
    pub fn mark_present(&mut self, day: NaiveDate, user_id: i64) {
        self.days.entry(day).or_default().insert(user_id);
    }

    /// Number of users cached as present on the given day.
    pub fn day_count(&self, day: NaiveDate) -> usize {
        self.days.get(&day).map(|ids| ids.len()).unwrap_or(0)
    }

    /// Distinct users across all retained days. Undercounts after a process
    /// restart mid-week because the cache is rebuilt empty.
    pub fn weekly_count(&self) -> usize {
        let union: HashSet<i64> = self.days.values().flatten().copied().collect();
        union.len()
    }

    #[cfg(test)]
    fn retained_days(&self) -> Vec<NaiveDate> {
        let mut days: Vec<NaiveDate> = self.days.keys().copied().collect();
        days.sort();
        days
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    #[test]
    fn test_starts_with_today_empty() {
        let cache = PresenceCache::new(day(15), 7);
        assert_eq!(cache.day_count(day(15)), 0);
        assert!(!cache.is_present(day(15), 1));
    }

    #[test]
    fn test_rollover_prunes_old_days() {
        let mut cache = PresenceCache::new(day(5), 7);
        // Seed entries for days 5..=14 by marking one user each day.
        for d in 5..=14 {
            cache.mark_present(day(d), d as i64);
        }
        cache.rollover(day(15));
        // Retained window is [day 8, day 15]; days 5-7 are gone.
        assert_eq!(
            cache.retained_days(),
            (8..=15).map(day).collect::<Vec<_>>()
        );
        assert!(!cache.is_present(day(5), 5));
        assert!(cache.is_present(day(8), 8));
        assert_eq!(cache.day_count(day(15)), 0);
    }

    #[test]
    fn test_rollover_noop_when_day_exists() {
        let mut cache = PresenceCache::new(day(15), 7);
        cache.mark_present(day(15), 42);
        cache.rollover(day(15));
        assert!(cache.is_present(day(15), 42));
    }

    #[test]
    fn test_weekly_count_is_distinct_union() {
        let mut cache = PresenceCache::new(day(15), 7);
        cache.mark_present(day(14), 1);
        cache.mark_present(day(14), 2);
        cache.mark_present(day(15), 2);
        cache.mark_present(day(15), 3);
        assert_eq!(cache.weekly_count(), 3);
    }

    #[test]
    fn test_reset_drops_everything() {
        let mut cache = PresenceCache::new(day(14), 7);
        cache.mark_present(day(14), 1);
        cache.mark_present(day(15), 2);
        cache.reset(day(15));
        assert_eq!(cache.weekly_count(), 0);
        assert!(!cache.is_present(day(15), 2));
        assert_eq!(cache.retained_days(), vec![day(15)]);
    }
}
