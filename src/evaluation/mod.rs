//! Walk-forward evaluation
//!
//! Season folds, the odds orientation gate, metrics and the harness that
//! runs them end to end.

pub mod artifacts;
pub mod folds;
pub mod harness;
pub mod metrics;
pub mod odds_gate;
pub mod regression;

pub use folds::{create_folds, Fold, FoldPolicy};
pub use harness::{EvaluationHarness, EvaluationResult, FoldResult, OddsCheck};
pub use metrics::{compute_all_metrics, AllMetrics, MetricError};
pub use odds_gate::{enforce_odds_orientation, quick_odds_check, OrientationReport};

use chrono::NaiveDate;
use serde::Serialize;

/// One out-of-sample prediction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionRecord {
    pub match_id: String,
    pub date: NaiveDate,
    pub home_team: String,
    pub away_team: String,
    pub home_win: u8,
    pub home_odds_close: Option<f64>,
    pub away_odds_close: Option<f64>,
    pub pred_home_win_prob: f64,
    pub fold_id: usize,
    pub test_season: i32,
}
