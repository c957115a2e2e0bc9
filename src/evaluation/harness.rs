//! End-to-end walk-forward evaluation

use crate::data::MatchTable;
use crate::evaluation::folds::{create_folds, FoldPolicy};
use crate::evaluation::metrics::{accuracy, compute_all_metrics, AllMetrics};
use crate::evaluation::odds_gate::{enforce_odds_orientation, OrientationReport};
use crate::evaluation::PredictionRecord;
use crate::features::engineer::{match_column_value, MATCH_NUMERIC_COLUMNS};
use crate::features::{FeatureEngineer, FeatureMatrix, PitReport};
use crate::model::{Classifier, DesignMatrix};
use crate::{Config, MatchRecord, Result};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// What the odds gate did for this run
#[derive(Debug, Clone)]
pub enum OddsCheck {
    Checked(OrientationReport),
    /// The data had no odds columns
    Skipped,
}

impl Serialize for OddsCheck {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            OddsCheck::Checked(report) => report.serialize(serializer),
            OddsCheck::Skipped => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("chosen", "no_odds")?;
                map.serialize_entry("action", "skipped")?;
                map.end()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FoldResult {
    pub fold_id: usize,
    pub test_season: i32,
    pub n_train: usize,
    pub n_test: usize,
    pub accuracy: f64,
}

/// Everything one evaluation run produced
#[derive(Debug, Clone)]
pub struct EvaluationResult {
    pub predictions: Vec<PredictionRecord>,
    pub fold_results: Vec<FoldResult>,
    pub metrics: AllMetrics,
    pub odds: OddsCheck,
    pub feature_columns: Vec<String>,
    pub pit_report: PitReport,
    pub has_odds: bool,
    pub model_name: String,
    /// Run timestamp, `%Y%m%d_%H%M%S`
    pub timestamp: String,
}

/// Where a training column's values come from
enum ColumnSource {
    Match(&'static str),
    Feature(usize),
    Missing,
}

fn column_sources(columns: &[String], matrix: &FeatureMatrix) -> Vec<ColumnSource> {
    columns
        .iter()
        .map(|name| {
            if let Some(c) = MATCH_NUMERIC_COLUMNS.iter().find(|c| **c == name.as_str()) {
                ColumnSource::Match(*c)
            } else if let Some(idx) = matrix.column_index(name) {
                ColumnSource::Feature(idx)
            } else {
                ColumnSource::Missing
            }
        })
        .collect()
}

/// Design matrix for the given rows; nulls become 0.0
fn design_matrix(
    matches: &[MatchRecord],
    rows: &[usize],
    sources: &[ColumnSource],
    matrix: &FeatureMatrix,
) -> Result<DesignMatrix> {
    let mut data = Vec::with_capacity(rows.len() * sources.len());
    for &i in rows {
        let record = &matches[i];
        let features = matrix.row(&record.match_id);
        for source in sources {
            let value = match source {
                ColumnSource::Match(name) => match_column_value(record, name),
                ColumnSource::Feature(idx) => features.and_then(|r| r[*idx]),
                ColumnSource::Missing => None,
            };
            data.push(value.unwrap_or(0.0));
        }
    }
    DesignMatrix::new(rows.len(), sources.len(), data)
}

/// Runs one classifier through the walk-forward pipeline
pub struct EvaluationHarness<C: Classifier> {
    classifier: C,
    config: Config,
}

impl<C: Classifier> EvaluationHarness<C> {
    pub fn new(classifier: C, config: Config) -> Self {
        EvaluationHarness { classifier, config }
    }

    /// Gate the odds, engineer features, then train and predict fold by fold
    pub fn run(
        &self,
        table: MatchTable,
        test_seasons: Option<&[i32]>,
        policy: FoldPolicy,
    ) -> Result<EvaluationResult> {
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
        let has_odds = table.has_odds;
        let mut matches = table.matches;
        matches.sort_by_key(|m| m.date);

        log::info!(
            "Evaluating {} matches with {} ({} folds)",
            matches.len(),
            self.classifier.name(),
            policy
        );

        let odds = if has_odds {
            OddsCheck::Checked(enforce_odds_orientation(&mut matches, &self.config.odds)?)
        } else {
            log::info!("No odds columns, skipping orientation check");
            OddsCheck::Skipped
        };

        log::info!("Computing features...");
        let engineer = FeatureEngineer::new(&matches, self.config.features.clone());
        let feature_matrix = engineer.build_feature_matrix(&matches);
        let feature_columns =
            engineer.feature_columns(&feature_matrix, has_odds, &self.config.model.feature_exclude);
        log::info!(
            "Features: {} rows, {} training columns",
            feature_matrix.len(),
            feature_columns.len()
        );
        let sources = column_sources(&feature_columns, &feature_matrix);

        log::info!("Creating {} folds...", policy);
        let folds = create_folds(&matches, policy, test_seasons, &self.config.evaluation)?;

        let mut predictions = Vec::new();
        let mut fold_results = Vec::with_capacity(folds.len());

        for fold in &folds {
            let x_train = design_matrix(&matches, &fold.train, &sources, &feature_matrix)?;
            let y_train: Vec<u8> = fold
                .train
                .iter()
                .map(|&i| matches[i].home_win_label())
                .collect();
            let x_test = design_matrix(&matches, &fold.test, &sources, &feature_matrix)?;
            let y_test: Vec<u8> = fold
                .test
                .iter()
                .map(|&i| matches[i].home_win_label())
                .collect();

            let model = self.classifier.train(&x_train, &y_train)?;
            let probs = self.classifier.predict(&model, &x_test)?;

            let fold_accuracy = accuracy(&probs, &y_test)
                .map(|a| a.accuracy)
                .unwrap_or(f64::NAN);
            log::info!(
                "  Fold {} ({}): accuracy {:.3} on {} matches",
                fold.fold_id,
                fold.test_season,
                fold_accuracy,
                fold.test.len()
            );

            fold_results.push(FoldResult {
                fold_id: fold.fold_id,
                test_season: fold.test_season,
                n_train: fold.train.len(),
                n_test: fold.test.len(),
                accuracy: fold_accuracy,
            });

            for (&i, &p) in fold.test.iter().zip(&probs) {
                let m = &matches[i];
                predictions.push(PredictionRecord {
                    match_id: m.match_id.clone(),
                    date: m.date,
                    home_team: m.home_team.clone(),
                    away_team: m.away_team.clone(),
                    home_win: m.home_win_label(),
                    home_odds_close: m.home_odds_close,
                    away_odds_close: m.away_odds_close,
                    pred_home_win_prob: p,
                    fold_id: fold.fold_id,
                    test_season: fold.test_season,
                });
            }
        }

        let metrics = compute_all_metrics(
            &predictions,
            has_odds,
            self.config.evaluation.calibration_bins,
            self.config.odds.min_rows,
        );
        log_metrics(&metrics);

        Ok(EvaluationResult {
            predictions,
            fold_results,
            metrics,
            odds,
            feature_columns,
            pit_report: engineer.pit_report(),
            has_odds,
            model_name: self.classifier.name().to_string(),
            timestamp,
        })
    }
}

fn log_metrics(metrics: &AllMetrics) {
    let m = &metrics.model_metrics;
    match &m.brier {
        Ok(b) => log::info!("Brier: {:.4} (skill {:.4})", b.brier, b.brier_skill),
        Err(e) => log::warn!("Brier unavailable: {}", e),
    }
    match &m.auc {
        Ok(a) => log::info!("AUC: {:.4}", a.auc),
        Err(e) => log::warn!("AUC unavailable: {}", e),
    }
    match &m.accuracy {
        Ok(a) => log::info!("Accuracy: {:.4}", a.accuracy),
        Err(e) => log::warn!("Accuracy unavailable: {}", e),
    }
    if let Some(market) = &metrics.market_metrics {
        match &market.clv {
            Ok(c) => log::info!("Mean CLV: {:+.4} (positive {:.1}%)", c.mean_clv, c.positive_rate * 100.0),
            Err(e) => log::warn!("CLV unavailable: {}", e),
        }
        if let Ok(b) = &market.market_baseline {
            log::info!("Market Brier: {:.4}", b.brier);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::generate_sample_data;
    use crate::model::{GradientBoostedTrees, LogisticClassifier};

    fn make_table() -> MatchTable {
        generate_sample_data(300, &[2022, 2023, 2024], 42)
    }

    fn fast_gbt() -> GradientBoostedTrees {
        GradientBoostedTrees {
            max_iter: 20,
            ..GradientBoostedTrees::default()
        }
    }

    #[test]
    fn test_end_to_end_last_season_held_out() {
        let table = make_table();
        let n_2024 = table.matches.iter().filter(|m| m.season == 2024).count();
        let mut config = Config::default();
        config.odds.fail_on_ambiguous = false;

        let harness = EvaluationHarness::new(fast_gbt(), config);
        let result = harness
            .run(table, Some(&[2024]), FoldPolicy::Anchored)
            .unwrap();

        assert_eq!(result.predictions.len(), n_2024);
        assert_eq!(result.fold_results.len(), 1);
        let fold = &result.fold_results[0];
        assert_eq!(fold.fold_id, 1);
        assert_eq!(fold.n_test, n_2024);
        assert!(fold.accuracy > 0.0 && fold.accuracy < 1.0);

        assert!(result
            .predictions
            .iter()
            .all(|p| p.test_season == 2024 && (0.0..=1.0).contains(&p.pred_home_win_prob)));
        assert!(matches!(result.odds, OddsCheck::Checked(_)));
        assert!(result.metrics.market_metrics.is_some());
        assert!(!result.feature_columns.iter().any(|c| c.ends_with("_odds_close")));
        assert!(result.feature_columns.contains(&"diff_5_margin".to_string()));
        assert!(result.pit_report.total_calls > 0);
    }

    #[test]
    fn test_no_odds_skips_gate_and_market_metrics() {
        let mut table = make_table();
        for m in &mut table.matches {
            m.home_odds_close = None;
            m.away_odds_close = None;
        }
        table.has_odds = false;

        let harness = EvaluationHarness::new(fast_gbt(), Config::default());
        let result = harness
            .run(table, None, FoldPolicy::Rolling { window: 2 })
            .unwrap();

        assert!(matches!(result.odds, OddsCheck::Skipped));
        assert!(result.metrics.market_metrics.is_none());
        assert_eq!(result.fold_results.len(), 1);
        assert_eq!(result.fold_results[0].test_season, 2024);

        let json = serde_json::to_value(&result.odds).unwrap();
        assert_eq!(json["chosen"], "no_odds");
        assert_eq!(json["action"], "skipped");
    }

    #[test]
    fn test_predictions_ordered_by_fold() {
        let table = generate_sample_data(400, &[2021, 2022, 2023, 2024], 7);
        let mut config = Config::default();
        config.odds.fail_on_ambiguous = false;
        let clf = LogisticClassifier {
            epochs: 50,
            learning_rate: 0.1,
            seed: 42,
        };
        let result = EvaluationHarness::new(clf, config)
            .run(table, None, FoldPolicy::Anchored)
            .unwrap();

        assert_eq!(result.fold_results.len(), 2);
        assert_eq!(result.model_name, "logistic");
        assert!(result
            .predictions
            .windows(2)
            .all(|w| (w[0].fold_id, w[0].date) <= (w[1].fold_id, w[1].date)));
    }

    #[test]
    fn test_zero_folds_is_fatal() {
        let table = make_table();
        let mut config = Config::default();
        config.odds.fail_on_ambiguous = false;
        let harness = EvaluationHarness::new(fast_gbt(), config);
        let result = harness.run(table, Some(&[2022]), FoldPolicy::Anchored);
        assert!(matches!(result, Err(crate::NrlError::NoValidFolds { .. })));
    }
}
