//! Aggregate reports over the record store.
//!
//! Unlike the statistics endpoint these scan durable state, so they stay
//! correct across process restarts; they are meant for dashboards rather
//! than the hot path.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

use crate::config::AttendanceConfig;
use crate::db::Database;
use crate::error::Result;
use crate::status::AttendanceStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportPeriod {
    Month,
    Week,
    AllTime,
}

impl ReportPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportPeriod::Month => "month",
            ReportPeriod::Week => "week",
            ReportPeriod::AllTime => "all",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "month" => Some(ReportPeriod::Month),
            "week" => Some(ReportPeriod::Week),
            "all" => Some(ReportPeriod::AllTime),
            _ => None,
        }
    }

    /// First day included in the report, relative to `today`.
    /// Weeks start on Monday.
    fn start_date(&self, today: NaiveDate) -> NaiveDate {
        match self {
            ReportPeriod::Month => today.with_day(1).unwrap_or(today),
            ReportPeriod::Week => {
                today - Duration::days(today.weekday().num_days_from_monday() as i64)
            }
            ReportPeriod::AllTime => NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or(today),
        }
    }
}

/// Per-day classification counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DayTrend {
    pub present: i64,
    pub late: i64,
    pub absent: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttendanceReport {
    pub total_attendance: f64,
    pub present: i64,
    pub absent: i64,
    pub late: i64,
    pub trends: BTreeMap<String, DayTrend>,
}

/// One row of the recent-attendance listing, status derived at read time.
#[derive(Debug, Clone, Serialize)]
pub struct RecentEntry {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub timestamp: String,
    pub status: AttendanceStatus,
}

/// Classify all records since the period start and build per-day trends.
///
/// `present`/`late` count distinct users over the whole period; `absent`
/// is everyone registered who never reached the present threshold.
pub fn attendance_report(
    db: &Database,
    config: &AttendanceConfig,
    now: DateTime<Utc>,
    period: ReportPeriod,
) -> Result<AttendanceReport> {
    let today = config.day_boundary.date_of(now);
    let start = period.start_date(today);

    let total_users = db.count_users()?;
    let mut present_ids: HashSet<i64> = HashSet::new();
    let mut late_ids: HashSet<i64> = HashSet::new();
    let mut trends: BTreeMap<String, DayTrend> = BTreeMap::new();

    for record in db.all_records()? {
        let day = config.day_boundary.date_of(record.timestamp);
        if day < start {
            continue;
        }
        let trend = trends.entry(day.to_string()).or_default();
        match AttendanceStatus::classify(record.confidence, config) {
            AttendanceStatus::Present => {
                present_ids.insert(record.user_id);
                trend.present += 1;
            }
            AttendanceStatus::Late => {
                late_ids.insert(record.user_id);
                trend.late += 1;
            }
            AttendanceStatus::Absent => {
                trend.absent += 1;
            }
        }
    }

    let present = present_ids.len() as i64;
    let late = late_ids.len() as i64;
    let total_attendance = if total_users > 0 {
        present as f64 / total_users as f64 * 100.0
    } else {
        0.0
    };

    Ok(AttendanceReport {
        total_attendance,
        present,
        absent: total_users - present,
        late,
        trends,
    })
}

/// Latest accepted records with user names and derived status.
pub fn recent_attendance(
    db: &Database,
    config: &AttendanceConfig,
    limit: usize,
) -> Result<Vec<RecentEntry>> {
    let records = db.recent_records(limit)?;
    Ok(records
        .into_iter()
        .map(|r| RecentEntry {
            id: r.id,
            user_id: r.user_id,
            name: r.name,
            timestamp: r.timestamp.format("%Y-%m-%d %H:%M").to_string(),
            status: AttendanceStatus::classify(r.confidence, config),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DayBoundary;
    use chrono::TimeZone;

    fn test_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        db.register_user(1, "Alice").unwrap();
        db.register_user(2, "Bob").unwrap();
        db.register_user(3, "Carol").unwrap();
        db
    }

    fn utc_config() -> AttendanceConfig {
        AttendanceConfig {
            day_boundary: DayBoundary::Utc,
            ..AttendanceConfig::default()
        }
    }

    fn ts(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_period_start_dates() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 12).unwrap(); // a Wednesday
        assert_eq!(
            ReportPeriod::Month.start_date(today),
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
        );
        assert_eq!(
            ReportPeriod::Week.start_date(today),
            NaiveDate::from_ymd_opt(2024, 6, 10).unwrap()
        );
        assert_eq!(
            ReportPeriod::AllTime.start_date(today),
            NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()
        );
    }

    #[test]
    fn test_report_classifies_and_counts() {
        let db = test_db();
        let config = utc_config();
        db.insert_record(1, ts(10, 9), 0.95).unwrap(); // present
        db.insert_record(2, ts(10, 10), 0.75).unwrap(); // late
        db.insert_record(3, ts(11, 9), 0.5).unwrap(); // absent-grade

        let report =
            attendance_report(&db, &config, ts(12, 12), ReportPeriod::Month).unwrap();
        assert_eq!(report.present, 1);
        assert_eq!(report.late, 1);
        assert_eq!(report.absent, 2);
        assert!((report.total_attendance - 1.0 / 3.0 * 100.0).abs() < 1e-9);

        let day_one = report.trends.get("2024-06-10").unwrap();
        assert_eq!(day_one.present, 1);
        assert_eq!(day_one.late, 1);
        assert_eq!(day_one.absent, 0);
        assert_eq!(report.trends.get("2024-06-11").unwrap().absent, 1);
    }

    #[test]
    fn test_week_report_excludes_prior_week() {
        let db = test_db();
        let config = utc_config();
        db.insert_record(1, ts(7, 9), 0.95).unwrap(); // previous week (Friday)
        db.insert_record(2, ts(11, 9), 0.95).unwrap(); // this week

        // 2024-06-12 is a Wednesday; the week starts Monday the 10th.
        let report = attendance_report(&db, &config, ts(12, 12), ReportPeriod::Week).unwrap();
        assert_eq!(report.present, 1);
        assert_eq!(report.trends.len(), 1);
    }

    #[test]
    fn test_recent_listing() {
        let db = test_db();
        let config = utc_config();
        db.insert_record(1, ts(10, 9), 0.95).unwrap();
        db.insert_record(2, ts(10, 11), 0.75).unwrap();

        let recent = recent_attendance(&db, &config, 10).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].name, "Bob");
        assert_eq!(recent[0].status, AttendanceStatus::Late);
        assert_eq!(recent[0].timestamp, "2024-06-10 11:00");
        assert_eq!(recent[1].status, AttendanceStatus::Present);
    }
}
