//! Display status derived from recognition confidence.
//!
//! The status is computed at read time and never stored, so changing the
//! thresholds in the config changes how historical records display without
//! a migration. Every read path goes through [`AttendanceStatus::classify`]
//! so the thresholds cannot drift between endpoints.

use serde::{Deserialize, Serialize};

use crate::config::AttendanceConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AttendanceStatus {
    Present,
    Late,
    Absent,
}

impl AttendanceStatus {
    /// Classify a confidence score using the configured thresholds.
    /// Both thresholds are inclusive: a score exactly at the present
    /// threshold counts as Present.
    pub fn classify(confidence: f64, config: &AttendanceConfig) -> Self {
        if confidence >= config.present_threshold {
            AttendanceStatus::Present
        } else if confidence >= config.late_threshold {
            AttendanceStatus::Late
        } else {
            AttendanceStatus::Absent
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "PRESENT",
            AttendanceStatus::Late => "LATE",
            AttendanceStatus::Absent => "ABSENT",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_boundaries() {
        let config = AttendanceConfig::default();
        assert_eq!(AttendanceStatus::classify(0.9, &config), AttendanceStatus::Present);
        assert_eq!(AttendanceStatus::classify(0.7, &config), AttendanceStatus::Late);
        assert_eq!(AttendanceStatus::classify(0.69999, &config), AttendanceStatus::Absent);
    }

    #[test]
    fn test_extremes() {
        let config = AttendanceConfig::default();
        assert_eq!(AttendanceStatus::classify(1.0, &config), AttendanceStatus::Present);
        assert_eq!(AttendanceStatus::classify(0.0, &config), AttendanceStatus::Absent);
    }
}
