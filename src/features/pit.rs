//! Point-in-time cutoff filter
//!
//! Every history lookup made while computing features goes through
//! [`PitFilter::filter`], which drops rows dated on or after the cutoff and
//! records what it dropped.

use chrono::NaiveDate;
use serde::Serialize;
use std::sync::{Mutex, MutexGuard};

/// Violation details kept in the report
const MAX_REPORTED: usize = 10;

/// Anything carrying an (optional) calendar date
pub trait Dated {
    /// `None` when the date is unknown; such rows are never blocked
    fn date(&self) -> Option<NaiveDate>;
}

impl Dated for crate::MatchRecord {
    fn date(&self) -> Option<NaiveDate> {
        Some(self.date)
    }
}

/// One blocked lookup
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PitViolation {
    pub feature: String,
    pub asof: NaiveDate,
    pub blocked: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PitStatus {
    Clean,
    ViolationsBlocked,
}

impl std::fmt::Display for PitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PitStatus::Clean => write!(f, "CLEAN"),
            PitStatus::ViolationsBlocked => write!(f, "VIOLATIONS_BLOCKED"),
        }
    }
}

/// Summary of all filter calls since the last reset
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PitReport {
    pub status: PitStatus,
    pub message: String,
    pub total_calls: usize,
    pub violations_blocked: usize,
    pub total_rows_blocked: usize,
    /// First few violations only
    pub details: Vec<PitViolation>,
}

#[derive(Debug, Default)]
struct PitLog {
    calls: usize,
    violations: Vec<PitViolation>,
}

/// Cutoff filter with a shared violation log
#[derive(Debug, Default)]
pub struct PitFilter {
    log: Mutex<PitLog>,
}

impl PitFilter {
    pub fn new() -> Self {
        Self::default()
    }

    fn log(&self) -> MutexGuard<'_, PitLog> {
        // The log is plain data, a panic elsewhere cannot leave it inconsistent
        self.log.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Keep rows dated strictly before `cutoff`, returning the kept rows and
    /// the number blocked
    pub fn filter<'a, T: Dated>(
        &self,
        feature_name: &str,
        rows: &'a [T],
        cutoff: NaiveDate,
    ) -> (Vec<&'a T>, usize) {
        let kept: Vec<&T> = rows
            .iter()
            .filter(|r| r.date().map_or(true, |d| d < cutoff))
            .collect();
        let blocked = rows.len() - kept.len();

        let mut log = self.log();
        log.calls += 1;
        if blocked > 0 {
            log.violations.push(PitViolation {
                feature: feature_name.to_string(),
                asof: cutoff,
                blocked,
            });
        }

        (kept, blocked)
    }

    pub fn report(&self) -> PitReport {
        let log = self.log();
        let total_rows_blocked = log.violations.iter().map(|v| v.blocked).sum();
        let (status, message) = if log.violations.is_empty() {
            (PitStatus::Clean, "No PIT violations detected".to_string())
        } else {
            (
                PitStatus::ViolationsBlocked,
                format!(
                    "Blocked {} future rows across {} lookups",
                    total_rows_blocked,
                    log.violations.len()
                ),
            )
        };

        PitReport {
            status,
            message,
            total_calls: log.calls,
            violations_blocked: log.violations.len(),
            total_rows_blocked,
            details: log.violations.iter().take(MAX_REPORTED).cloned().collect(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.log().violations.is_empty()
    }

    /// Clear the violation log and call counter
    pub fn reset(&self) {
        *self.log() = PitLog::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Row(Option<NaiveDate>);

    impl Dated for Row {
        fn date(&self) -> Option<NaiveDate> {
            self.0
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn test_blocks_rows_on_or_after_cutoff() {
        let rows: Vec<Row> = (1..=10).map(|d| Row(Some(day(d)))).collect();
        let pit = PitFilter::new();

        let (kept, blocked) = pit.filter("rolling", &rows, day(5));
        assert_eq!(kept.len(), 4);
        assert_eq!(blocked, 6);
        assert!(kept.iter().all(|r| r.0.unwrap() < day(5)));

        let report = pit.report();
        assert_eq!(report.status, PitStatus::ViolationsBlocked);
        assert_eq!(report.total_calls, 1);
        assert_eq!(report.total_rows_blocked, 6);
        assert_eq!(report.details[0].feature, "rolling");
    }

    #[test]
    fn test_unknown_dates_are_kept() {
        let rows = vec![Row(None), Row(Some(day(3))), Row(Some(day(9)))];
        let pit = PitFilter::new();
        let (kept, blocked) = pit.filter("h2h", &rows, day(5));
        assert_eq!(kept.len(), 2);
        assert_eq!(blocked, 1);
    }

    #[test]
    fn test_clean_and_empty_calls() {
        let pit = PitFilter::new();
        let empty: Vec<Row> = Vec::new();
        let (kept, blocked) = pit.filter("history", &empty, day(5));
        assert!(kept.is_empty());
        assert_eq!(blocked, 0);

        let rows = vec![Row(Some(day(1)))];
        pit.filter("history", &rows, day(5));

        let report = pit.report();
        assert_eq!(report.status, PitStatus::Clean);
        assert_eq!(report.total_calls, 2);
        assert!(pit.is_clean());
    }

    #[test]
    fn test_report_caps_details_and_reset_clears() {
        let rows = vec![Row(Some(day(20)))];
        let pit = PitFilter::new();
        for _ in 0..15 {
            pit.filter("history", &rows, day(1));
        }

        let report = pit.report();
        assert_eq!(report.violations_blocked, 15);
        assert_eq!(report.details.len(), MAX_REPORTED);

        pit.reset();
        let report = pit.report();
        assert_eq!(report.status, PitStatus::Clean);
        assert_eq!(report.total_calls, 0);
    }
}
