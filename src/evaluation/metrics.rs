//! Evaluation metrics
//!
//! Model metrics (Brier, AUC, accuracy, calibration) and market metrics
//! (closing line value, de-vigged market baseline). Degenerate inputs give a
//! [`MetricError`] value rather than failing the run; serialised, an error
//! reads `{"error": "..."}`.

use crate::evaluation::regression::fit_logistic_1d;
use crate::evaluation::PredictionRecord;
use serde::Serialize;
use thiserror::Error;

/// Probabilities are clipped to `[EPS, 1 - EPS]` before taking log-odds
const EPS: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MetricError {
    #[error("no data")]
    NoData,
    #[error("single class in outcomes")]
    SingleClass,
    #[error("too few valid rows: {0}")]
    TooFewRows(usize),
    #[error("no valid odds rows")]
    NoValidOdds,
    #[error("{0}")]
    InvalidInput(String),
}

pub type MetricResult<T> = std::result::Result<T, MetricError>;

/// Serialize a `MetricResult` as the value itself or `{"error": message}`
pub mod metric_result {
    use super::MetricResult;
    use serde::ser::SerializeMap;
    use serde::{Serialize, Serializer};

    pub fn serialize<T, S>(value: &MetricResult<T>, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Serialize,
        S: Serializer,
    {
        match value {
            Ok(v) => v.serialize(serializer),
            Err(e) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("error", &e.to_string())?;
                map.end()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BrierScore {
    pub n: usize,
    pub brier: f64,
    /// 1 - brier / (base_rate * (1 - base_rate))
    pub brier_skill: f64,
    pub base_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AucScore {
    pub n: usize,
    pub auc: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Accuracy {
    pub n: usize,
    pub accuracy: f64,
}

/// Mean predicted probability against observed frequency per non-empty bin
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationCurve {
    pub predicted: Vec<f64>,
    pub actual: Vec<f64>,
    pub counts: Vec<usize>,
    pub n_bins: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClvSummary {
    pub n: usize,
    pub mean_clv: f64,
    pub median_clv: f64,
    pub std_clv: f64,
    pub positive_rate: f64,
}

/// The de-vigged closing market scored as if it were a model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketBaseline {
    pub n: usize,
    pub brier: f64,
    /// Logistic slope of outcome on market log-odds; `None` for a
    /// single-class outcome
    pub slope: Option<f64>,
    pub intercept: Option<f64>,
    pub correlation: f64,
    pub home_win_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelMetrics {
    #[serde(with = "metric_result")]
    pub brier: MetricResult<BrierScore>,
    #[serde(with = "metric_result")]
    pub auc: MetricResult<AucScore>,
    #[serde(with = "metric_result")]
    pub accuracy: MetricResult<Accuracy>,
    #[serde(with = "metric_result")]
    pub calibration: MetricResult<CalibrationCurve>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MarketMetrics {
    #[serde(with = "metric_result")]
    pub clv: MetricResult<ClvSummary>,
    #[serde(with = "metric_result")]
    pub market_baseline: MetricResult<MarketBaseline>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AllMetrics {
    pub model_metrics: ModelMetrics,
    /// Present only when the data carried odds columns
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_metrics: Option<MarketMetrics>,
}

fn clip(p: f64) -> f64 {
    p.clamp(EPS, 1.0 - EPS)
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn is_single_class(outcomes: &[u8]) -> bool {
    outcomes.windows(2).all(|w| w[0] == w[1])
}

fn check_lengths(probs: &[f64], outcomes: &[u8]) -> MetricResult<()> {
    if probs.len() != outcomes.len() {
        return Err(MetricError::InvalidInput(format!(
            "{} probabilities but {} outcomes",
            probs.len(),
            outcomes.len()
        )));
    }
    if probs.is_empty() {
        return Err(MetricError::NoData);
    }
    Ok(())
}

/// Fair probabilities from decimal odds, `(None, None)` if either price is
/// not a valid decimal price
pub fn devig(home_odds: f64, away_odds: f64) -> (Option<f64>, Option<f64>) {
    if !home_odds.is_finite() || !away_odds.is_finite() || home_odds <= 1.0 || away_odds <= 1.0
    {
        return (None, None);
    }
    let p_home = 1.0 / home_odds;
    let p_away = 1.0 / away_odds;
    let total = p_home + p_away;
    (Some(p_home / total), Some(p_away / total))
}

/// Pearson correlation, 0 when either side has no variance
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    if x.len() != y.len() || x.len() < 2 {
        return 0.0;
    }
    let (mx, my) = (mean(x), mean(y));
    let mut cov = 0.0;
    let mut vx = 0.0;
    let mut vy = 0.0;
    for (a, b) in x.iter().zip(y) {
        cov += (a - mx) * (b - my);
        vx += (a - mx).powi(2);
        vy += (b - my).powi(2);
    }
    if vx <= 0.0 || vy <= 0.0 {
        return 0.0;
    }
    cov / (vx.sqrt() * vy.sqrt())
}

pub fn brier(probs: &[f64], outcomes: &[u8]) -> MetricResult<BrierScore> {
    check_lengths(probs, outcomes)?;
    let y: Vec<f64> = outcomes.iter().map(|&v| f64::from(v)).collect();
    let brier = probs
        .iter()
        .zip(&y)
        .map(|(p, y)| (p - y).powi(2))
        .sum::<f64>()
        / probs.len() as f64;

    let base_rate = mean(&y);
    let clim = base_rate * (1.0 - base_rate);
    let brier_skill = if clim > 0.0 { 1.0 - brier / clim } else { 0.0 };

    Ok(BrierScore {
        n: probs.len(),
        brier,
        brier_skill,
        base_rate,
    })
}

/// Rank-based AUC (Mann-Whitney U with average ranks for ties)
pub fn auc(probs: &[f64], outcomes: &[u8]) -> MetricResult<AucScore> {
    check_lengths(probs, outcomes)?;
    if is_single_class(outcomes) {
        return Err(MetricError::SingleClass);
    }

    let mut order: Vec<usize> = (0..probs.len()).collect();
    order.sort_by(|&a, &b| probs[a].total_cmp(&probs[b]));

    let mut ranks = vec![0.0; probs.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && probs[order[j + 1]] == probs[order[i]] {
            j += 1;
        }
        // Ranks are 1-based; tied block shares the average
        let avg = (i + j) as f64 / 2.0 + 1.0;
        for &k in &order[i..=j] {
            ranks[k] = avg;
        }
        i = j + 1;
    }

    let n_pos = outcomes.iter().filter(|&&v| v == 1).count() as f64;
    let n_neg = outcomes.len() as f64 - n_pos;
    let rank_sum: f64 = ranks
        .iter()
        .zip(outcomes)
        .filter(|(_, &y)| y == 1)
        .map(|(r, _)| r)
        .sum();
    let u = rank_sum - n_pos * (n_pos + 1.0) / 2.0;

    Ok(AucScore {
        n: probs.len(),
        auc: u / (n_pos * n_neg),
    })
}

/// Accuracy at threshold 0.5; `p > 0.5` predicts a home win
pub fn accuracy(probs: &[f64], outcomes: &[u8]) -> MetricResult<Accuracy> {
    check_lengths(probs, outcomes)?;
    let correct = probs
        .iter()
        .zip(outcomes)
        .filter(|(&p, &y)| u8::from(p > 0.5) == y)
        .count();
    Ok(Accuracy {
        n: probs.len(),
        accuracy: correct as f64 / probs.len() as f64,
    })
}

/// Equal-width calibration bins over [0, 1]; empty bins are dropped
pub fn calibration(probs: &[f64], outcomes: &[u8], n_bins: usize) -> MetricResult<CalibrationCurve> {
    check_lengths(probs, outcomes)?;
    if n_bins == 0 {
        return Err(MetricError::InvalidInput("n_bins must be positive".to_string()));
    }
    if probs.iter().any(|p| !(0.0..=1.0).contains(p)) {
        return Err(MetricError::InvalidInput(
            "probabilities must lie in [0, 1]".to_string(),
        ));
    }

    // The top edge sits just above 1 so p = 1.0 lands in the last bin
    let width = (1.0 + 1e-8) / n_bins as f64;
    let mut sum_pred = vec![0.0; n_bins];
    let mut sum_true = vec![0.0; n_bins];
    let mut counts = vec![0usize; n_bins];
    for (&p, &y) in probs.iter().zip(outcomes) {
        // Values on an inner edge belong to the lower bin
        let bin = (1..n_bins).filter(|&k| k as f64 * width < p).count();
        sum_pred[bin] += p;
        sum_true[bin] += f64::from(y);
        counts[bin] += 1;
    }

    let mut curve = CalibrationCurve {
        predicted: Vec::new(),
        actual: Vec::new(),
        counts: Vec::new(),
        n_bins: 0,
    };
    for b in 0..n_bins {
        if counts[b] == 0 {
            continue;
        }
        let n = counts[b] as f64;
        curve.predicted.push(sum_pred[b] / n);
        curve.actual.push(sum_true[b] / n);
        curve.counts.push(counts[b]);
    }
    curve.n_bins = curve.predicted.len();
    Ok(curve)
}

/// Model probability minus fair market probability over rows with valid odds
pub fn clv(probs: &[f64], odds: &[(Option<f64>, Option<f64>)]) -> MetricResult<ClvSummary> {
    if probs.len() != odds.len() {
        return Err(MetricError::InvalidInput(format!(
            "{} probabilities but {} odds rows",
            probs.len(),
            odds.len()
        )));
    }
    let mut values: Vec<f64> = probs
        .iter()
        .zip(odds)
        .filter_map(|(&p, &(h, a))| match (h, a) {
            (Some(h), Some(a)) => devig(h, a).0.map(|fair| p - fair),
            _ => None,
        })
        .collect();
    if values.is_empty() {
        return Err(MetricError::NoValidOdds);
    }

    let n = values.len();
    let mean_clv = mean(&values);
    let std_clv = (values.iter().map(|v| (v - mean_clv).powi(2)).sum::<f64>() / n as f64).sqrt();
    let positive_rate = values.iter().filter(|&&v| v > 0.0).count() as f64 / n as f64;

    values.sort_by(f64::total_cmp);
    let median_clv = if n % 2 == 1 {
        values[n / 2]
    } else {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    };

    Ok(ClvSummary {
        n,
        mean_clv,
        median_clv,
        std_clv,
        positive_rate,
    })
}

/// Score the de-vigged market over rows whose odds are both present and
/// above 1.0; needs at least `min_rows` such rows
pub fn market_baseline(
    odds: &[(Option<f64>, Option<f64>)],
    outcomes: &[u8],
    min_rows: usize,
) -> MetricResult<MarketBaseline> {
    if odds.len() != outcomes.len() {
        return Err(MetricError::InvalidInput(format!(
            "{} odds rows but {} outcomes",
            odds.len(),
            outcomes.len()
        )));
    }

    let (p_market, y): (Vec<f64>, Vec<u8>) = odds
        .iter()
        .zip(outcomes)
        .filter_map(|(&(h, a), &y)| match (h, a) {
            (Some(h), Some(a)) => devig(h, a).0.map(|p| (clip(p), y)),
            _ => None,
        })
        .unzip();

    if p_market.len() < min_rows || p_market.is_empty() {
        return Err(MetricError::TooFewRows(p_market.len()));
    }

    let y_f: Vec<f64> = y.iter().map(|&v| f64::from(v)).collect();
    let brier = p_market
        .iter()
        .zip(&y_f)
        .map(|(p, y)| (p - y).powi(2))
        .sum::<f64>()
        / p_market.len() as f64;
    let correlation = if is_single_class(&y) {
        0.0
    } else {
        pearson(&p_market, &y_f)
    };

    let log_odds: Vec<f64> = p_market.iter().map(|p| (p / (1.0 - p)).ln()).collect();
    let (slope, intercept) = match fit_logistic_1d(&log_odds, &y, 1.0) {
        Ok(fit) => (Some(fit.slope), Some(fit.intercept)),
        Err(e) => {
            log::debug!("Market slope unavailable: {}", e);
            (None, None)
        }
    };

    Ok(MarketBaseline {
        n: p_market.len(),
        brier,
        slope,
        intercept,
        correlation,
        home_win_rate: mean(&y_f),
    })
}

/// Model metrics always, market metrics only when odds columns exist
pub fn compute_all_metrics(
    predictions: &[PredictionRecord],
    has_odds: bool,
    calibration_bins: usize,
    odds_min_rows: usize,
) -> AllMetrics {
    let probs: Vec<f64> = predictions.iter().map(|p| p.pred_home_win_prob).collect();
    let outcomes: Vec<u8> = predictions.iter().map(|p| p.home_win).collect();

    let model_metrics = ModelMetrics {
        brier: brier(&probs, &outcomes),
        auc: auc(&probs, &outcomes),
        accuracy: accuracy(&probs, &outcomes),
        calibration: calibration(&probs, &outcomes, calibration_bins),
    };

    let market_metrics = if has_odds {
        let odds: Vec<(Option<f64>, Option<f64>)> = predictions
            .iter()
            .map(|p| (p.home_odds_close, p.away_odds_close))
            .collect();
        Some(MarketMetrics {
            clv: clv(&probs, &odds),
            market_baseline: market_baseline(&odds, &outcomes, odds_min_rows),
        })
    } else {
        None
    };

    AllMetrics {
        model_metrics,
        market_metrics,
    }
}
