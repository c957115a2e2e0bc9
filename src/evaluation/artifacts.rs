//! Evaluation artifacts: predictions CSV, summary JSON and calibration
//! points

use crate::evaluation::harness::{EvaluationResult, FoldResult, OddsCheck};
use crate::evaluation::metrics::{AllMetrics, CalibrationCurve};
use crate::evaluation::PredictionRecord;
use crate::features::PitReport;
use crate::Result;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactPaths {
    pub predictions: PathBuf,
    pub summary: PathBuf,
    /// Only written when calibration could be computed
    pub calibration: Option<PathBuf>,
}

#[derive(Serialize)]
struct Summary<'a> {
    timestamp: &'a str,
    model: &'a str,
    odds_report: &'a OddsCheck,
    fold_results: &'a [FoldResult],
    metrics: &'a AllMetrics,
    n_features: usize,
    feature_columns: &'a [String],
    pit_report: &'a PitReport,
}

fn format_opt(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Write predictions; odds columns only when the data carried them
pub fn write_predictions<W: Write>(
    writer: W,
    predictions: &[PredictionRecord],
    has_odds: bool,
) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    let mut header = vec!["match_id", "date", "home_team", "away_team", "home_win"];
    if has_odds {
        header.extend(["home_odds_close", "away_odds_close"]);
    }
    header.extend(["pred_home_win_prob", "fold_id", "test_season"]);
    wtr.write_record(&header)?;

    for p in predictions {
        let mut record = vec![
            p.match_id.clone(),
            p.date.format("%Y-%m-%d").to_string(),
            p.home_team.clone(),
            p.away_team.clone(),
            p.home_win.to_string(),
        ];
        if has_odds {
            record.push(format_opt(p.home_odds_close));
            record.push(format_opt(p.away_odds_close));
        }
        record.push(format!("{:.6}", p.pred_home_win_prob));
        record.push(p.fold_id.to_string());
        record.push(p.test_season.to_string());
        wtr.write_record(&record)?;
    }

    wtr.flush()?;
    Ok(())
}

pub fn write_calibration<W: Write>(writer: W, curve: &CalibrationCurve) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(["predicted", "actual", "count"])?;
    for ((predicted, actual), count) in curve
        .predicted
        .iter()
        .zip(&curve.actual)
        .zip(&curve.counts)
    {
        wtr.write_record([
            format!("{:.6}", predicted),
            format!("{:.6}", actual),
            count.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Save all artifacts for a run under `dir`, named by the run timestamp
pub fn save_artifacts<P: AsRef<Path>>(result: &EvaluationResult, dir: P) -> Result<ArtifactPaths> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;
    let ts = &result.timestamp;

    let predictions = dir.join(format!("predictions_{}.csv", ts));
    write_predictions(
        std::fs::File::create(&predictions)?,
        &result.predictions,
        result.has_odds,
    )?;
    log::info!("Saved predictions to {}", predictions.display());

    let summary = dir.join(format!("summary_{}.json", ts));
    let content = serde_json::to_string_pretty(&Summary {
        timestamp: ts,
        model: &result.model_name,
        odds_report: &result.odds,
        fold_results: &result.fold_results,
        metrics: &result.metrics,
        n_features: result.feature_columns.len(),
        feature_columns: &result.feature_columns,
        pit_report: &result.pit_report,
    })?;
    std::fs::write(&summary, content)?;
    log::info!("Saved summary to {}", summary.display());

    let calibration = match &result.metrics.model_metrics.calibration {
        Ok(curve) => {
            let path = dir.join(format!("calibration_{}.csv", ts));
            write_calibration(std::fs::File::create(&path)?, curve)?;
            log::info!("Saved calibration curve to {}", path.display());
            Some(path)
        }
        Err(e) => {
            log::warn!("Calibration unavailable, no curve saved: {}", e);
            None
        }
    };

    Ok(ArtifactPaths {
        predictions,
        summary,
        calibration,
    })
}
