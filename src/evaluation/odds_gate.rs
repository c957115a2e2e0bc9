//! Odds orientation gate
//!
//! Closing odds scraped from bookmaker pages are sometimes joined with the
//! home and away prices the wrong way round. A correctly oriented market
//! predicts the home result with a clearly positive logistic slope, so the
//! gate fits the de-vigged market in both orientations and keeps whichever
//! one is healthy.

use crate::evaluation::metrics::{market_baseline, MarketBaseline, MetricError, MetricResult};
use crate::{MatchRecord, NrlError, OddsConfig, Result};
use serde::Serialize;
use std::fmt;

/// Slope threshold used by [`quick_odds_check`]
const QUICK_CHECK_SLOPE: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    AsIs,
    Swapped,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateAction {
    None,
    AutoSwapped,
    ManualFixNeeded,
    InvestigationNeeded,
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Orientation::AsIs => "as_is",
            Orientation::Swapped => "swapped",
            Orientation::Unknown => "unknown",
        };
        write!(f, "{}", name)
    }
}

impl fmt::Display for GateAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GateAction::None => "none",
            GateAction::AutoSwapped => "auto_swapped",
            GateAction::ManualFixNeeded => "manual_fix_needed",
            GateAction::InvestigationNeeded => "investigation_needed",
        };
        write!(f, "{}", name)
    }
}

/// Market evidence for one orientation
#[derive(Debug, Clone, Serialize)]
pub struct OrientationEvidence {
    #[serde(with = "crate::evaluation::metrics::metric_result")]
    pub baseline: MetricResult<MarketBaseline>,
    pub healthy: bool,
}

impl OrientationEvidence {
    fn from_baseline(baseline: MetricResult<MarketBaseline>, min_slope: f64) -> Self {
        // A missing slope means the outcome column had a single class
        let baseline = baseline.and_then(|b| match b.slope {
            Some(_) => Ok(b),
            None => Err(MetricError::SingleClass),
        });
        let healthy = matches!(&baseline, Ok(b) if b.slope.is_some_and(|s| s > min_slope));
        OrientationEvidence { baseline, healthy }
    }

    pub fn slope(&self) -> Option<f64> {
        self.baseline.as_ref().ok().and_then(|b| b.slope)
    }

    fn describe_slope(&self) -> String {
        match &self.baseline {
            Ok(b) => b
                .slope
                .map(|s| format!("{:.3}", s))
                .unwrap_or_else(|| "n/a".to_string()),
            Err(e) => format!("n/a ({})", e),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OrientationReport {
    pub chosen: Orientation,
    pub action: GateAction,
    pub as_is: OrientationEvidence,
    pub swapped: OrientationEvidence,
}

/// Result of the non-mutating check
#[derive(Debug, Clone, Serialize)]
pub struct QuickCheck {
    pub as_is: OrientationEvidence,
    pub swapped: OrientationEvidence,
    pub likely_swapped: bool,
}

fn evidence(
    matches: &[MatchRecord],
    swap: bool,
    min_rows: usize,
    min_slope: f64,
) -> OrientationEvidence {
    let odds: Vec<(Option<f64>, Option<f64>)> = matches
        .iter()
        .map(|m| {
            if swap {
                (m.away_odds_close, m.home_odds_close)
            } else {
                (m.home_odds_close, m.away_odds_close)
            }
        })
        .collect();
    let outcomes: Vec<u8> = matches.iter().map(|m| m.home_win_label()).collect();
    OrientationEvidence::from_baseline(market_baseline(&odds, &outcomes, min_rows), min_slope)
}

fn swap_odds(matches: &mut [MatchRecord]) {
    for m in matches.iter_mut() {
        std::mem::swap(&mut m.home_odds_close, &mut m.away_odds_close);
    }
}

/// Decide the odds orientation and, when configured, swap the odds
/// columns in place. Only the two odds fields are ever modified.
pub fn enforce_odds_orientation(
    matches: &mut [MatchRecord],
    config: &OddsConfig,
) -> Result<OrientationReport> {
    let as_is = evidence(matches, false, config.min_rows, config.min_healthy_slope);
    let swapped = evidence(matches, true, config.min_rows, config.min_healthy_slope);

    let swapped_wins = match (as_is.healthy, swapped.healthy) {
        (true, false) => Some(false),
        (false, true) => Some(true),
        // Ties keep the data as it is
        (true, true) => Some(swapped.slope() > as_is.slope()),
        (false, false) => None,
    };

    let (chosen, action) = match swapped_wins {
        Some(false) => (Orientation::AsIs, GateAction::None),
        Some(true) if config.auto_fix => {
            swap_odds(matches);
            (Orientation::Swapped, GateAction::AutoSwapped)
        }
        Some(true) => (Orientation::Swapped, GateAction::ManualFixNeeded),
        None => {
            if config.fail_on_ambiguous {
                return Err(NrlError::OrientationAmbiguous {
                    as_is: as_is.describe_slope(),
                    swapped: swapped.describe_slope(),
                });
            }
            (Orientation::Unknown, GateAction::InvestigationNeeded)
        }
    };

    match action {
        GateAction::None => log::info!(
            "Odds orientation OK (slope {})",
            as_is.describe_slope()
        ),
        GateAction::AutoSwapped => log::warn!(
            "Odds columns were swapped; fixed automatically (slope {} -> {})",
            as_is.describe_slope(),
            swapped.describe_slope()
        ),
        GateAction::ManualFixNeeded => log::warn!(
            "Odds columns appear swapped (slope {} vs {}); auto-fix disabled, data left unchanged",
            as_is.describe_slope(),
            swapped.describe_slope()
        ),
        GateAction::InvestigationNeeded => log::warn!(
            "Odds orientation ambiguous (as-is slope {}, swapped slope {}); investigate the odds join",
            as_is.describe_slope(),
            swapped.describe_slope()
        ),
    }

    Ok(OrientationReport {
        chosen,
        action,
        as_is,
        swapped,
    })
}

/// Same evidence as the gate without touching the data
pub fn quick_odds_check(matches: &[MatchRecord], min_rows: usize) -> QuickCheck {
    let as_is = evidence(matches, false, min_rows, QUICK_CHECK_SLOPE);
    let swapped = evidence(matches, true, min_rows, QUICK_CHECK_SLOPE);
    let likely_swapped = !as_is.healthy && swapped.healthy;
    QuickCheck {
        as_is,
        swapped,
        likely_swapped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Config;
    use chrono::NaiveDate;

    fn make_match(i: usize, home_odds: f64, away_odds: f64, home_win: bool) -> MatchRecord {
        MatchRecord {
            match_id: format!("M{}", i),
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap() + chrono::Duration::days(i as i64),
            season: 2024,
            home_team: "Storm".to_string(),
            away_team: "Eels".to_string(),
            home_score: if home_win { 24 } else { 10 },
            away_score: if home_win { 12 } else { 18 },
            home_odds_close: Some(home_odds),
            away_odds_close: Some(away_odds),
            is_finals: None,
            venue: None,
            round: None,
        }
    }

    /// Favourites win four times in five
    fn make_informative(n: usize) -> Vec<MatchRecord> {
        (0..n)
            .map(|i| {
                let home_fav = i % 2 == 0;
                let (h, a) = if home_fav { (1.40, 3.00) } else { (3.00, 1.40) };
                let fav_wins = i % 5 != 0;
                make_match(i, h, a, home_fav == fav_wins)
            })
            .collect()
    }

    fn swapped_copy(matches: &[MatchRecord]) -> Vec<MatchRecord> {
        let mut out = matches.to_vec();
        swap_odds(&mut out);
        out
    }

    #[test]
    fn test_correct_orientation_untouched() {
        let mut matches = make_informative(100);
        let original = matches.clone();
        let report = enforce_odds_orientation(&mut matches, &Config::default().odds).unwrap();

        assert_eq!(report.chosen, Orientation::AsIs);
        assert_eq!(report.action, GateAction::None);
        assert!(report.as_is.healthy);
        assert!(!report.swapped.healthy);
        assert_eq!(matches, original);
    }

    #[test]
    fn test_swapped_odds_detected_and_restored() {
        let original = make_informative(100);
        let mut matches = swapped_copy(&original);
        let report = enforce_odds_orientation(&mut matches, &Config::default().odds).unwrap();

        assert_eq!(report.chosen, Orientation::Swapped);
        assert_eq!(report.action, GateAction::AutoSwapped);
        assert_eq!(matches, original);
    }

    #[test]
    fn test_gate_is_idempotent() {
        let mut matches = swapped_copy(&make_informative(100));
        let config = Config::default().odds;
        enforce_odds_orientation(&mut matches, &config).unwrap();
        let after_first = matches.clone();

        let second = enforce_odds_orientation(&mut matches, &config).unwrap();
        assert_eq!(second.action, GateAction::None);
        assert_eq!(matches, after_first);
    }

    #[test]
    fn test_manual_fix_leaves_data() {
        let mut matches = swapped_copy(&make_informative(100));
        let before = matches.clone();
        let mut config = Config::default().odds;
        config.auto_fix = false;

        let report = enforce_odds_orientation(&mut matches, &config).unwrap();
        assert_eq!(report.chosen, Orientation::Swapped);
        assert_eq!(report.action, GateAction::ManualFixNeeded);
        assert_eq!(matches, before);
    }

    #[test]
    fn test_ambiguous_orientation() {
        // Too few rows for either orientation
        let mut matches = make_informative(10);
        let mut config = Config::default().odds;
        let err = enforce_odds_orientation(&mut matches, &config).unwrap_err();
        assert!(matches!(err, NrlError::OrientationAmbiguous { .. }));

        config.fail_on_ambiguous = false;
        let report = enforce_odds_orientation(&mut matches, &config).unwrap();
        assert_eq!(report.chosen, Orientation::Unknown);
        assert_eq!(report.action, GateAction::InvestigationNeeded);
        assert!(matches!(
            report.as_is.baseline,
            Err(MetricError::TooFewRows(10))
        ));
    }

    #[test]
    fn test_both_healthy_larger_slope_wins() {
        let mut config = Config::default().odds;
        config.min_healthy_slope = -10.0;

        let original = make_informative(100);
        let mut matches = original.clone();
        let report = enforce_odds_orientation(&mut matches, &config).unwrap();
        assert!(report.as_is.healthy && report.swapped.healthy);
        assert!(report.as_is.slope().unwrap() > report.swapped.slope().unwrap());
        assert_eq!(report.chosen, Orientation::AsIs);
        assert_eq!(report.action, GateAction::None);
        assert_eq!(matches, original);

        let mut matches = swapped_copy(&original);
        let report = enforce_odds_orientation(&mut matches, &config).unwrap();
        assert!(report.as_is.healthy && report.swapped.healthy);
        assert_eq!(report.chosen, Orientation::Swapped);
        assert_eq!(report.action, GateAction::AutoSwapped);
        assert_eq!(matches, original);
    }

    #[test]
    fn test_both_healthy_equal_slopes_keep_as_is() {
        let mut config = Config::default().odds;
        config.min_healthy_slope = -10.0;

        // Even prices carry no signal, so both orientations fit the same slope
        let mut matches: Vec<MatchRecord> = (0..40)
            .map(|i| make_match(i, 1.90, 1.90, i % 2 == 0))
            .collect();
        let before = matches.clone();
        let report = enforce_odds_orientation(&mut matches, &config).unwrap();

        assert!(report.as_is.healthy && report.swapped.healthy);
        assert_eq!(report.as_is.slope(), report.swapped.slope());
        assert_eq!(report.chosen, Orientation::AsIs);
        assert_eq!(report.action, GateAction::None);
        assert_eq!(matches, before);
    }

    #[test]
    fn test_single_class_is_unhealthy() {
        let mut matches: Vec<MatchRecord> = (0..40)
            .map(|i| make_match(i, 1.5, 2.6, true))
            .collect();
        let mut config = Config::default().odds;
        config.fail_on_ambiguous = false;
        let report = enforce_odds_orientation(&mut matches, &config).unwrap();
        assert!(matches!(report.as_is.baseline, Err(MetricError::SingleClass)));
        assert!(!report.as_is.healthy);
    }

    #[test]
    fn test_quick_check_reports_swap_without_mutating() {
        let matches = swapped_copy(&make_informative(100));
        let check = quick_odds_check(&matches, 20);
        assert!(check.likely_swapped);

        let check = quick_odds_check(&make_informative(100), 20);
        assert!(!check.likely_swapped);
        assert!(check.as_is.slope().unwrap() > 0.3);
    }

    #[test]
    fn test_report_serializes_labels() {
        let mut matches = make_informative(100);
        let report = enforce_odds_orientation(&mut matches, &Config::default().odds).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["chosen"], "as_is");
        assert_eq!(json["action"], "none");
        assert_eq!(json["as_is"]["healthy"], true);
        assert!(json["as_is"]["baseline"]["slope"].as_f64().unwrap() > 0.3);
    }
}
