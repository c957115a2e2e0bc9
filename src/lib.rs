//! NRL match prediction backtesting
//!
//! Walk-forward evaluation of a match-outcome classifier with point-in-time
//! safe features and a market-odds orientation check.

pub mod data;
pub mod evaluation;
pub mod features;
pub mod model;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// A single completed match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub match_id: String,
    pub date: NaiveDate,
    pub season: i32,
    pub home_team: String,
    pub away_team: String,
    pub home_score: u32,
    pub away_score: u32,
    /// Closing decimal odds for the home side
    pub home_odds_close: Option<f64>,
    /// Closing decimal odds for the away side
    pub away_odds_close: Option<f64>,
    pub is_finals: Option<bool>,
    pub venue: Option<String>,
    pub round: Option<u32>,
}

impl MatchRecord {
    /// True if the home side won (draws count as not a home win)
    pub fn home_win(&self) -> bool {
        self.home_score > self.away_score
    }

    /// Home win as a 0/1 label
    pub fn home_win_label(&self) -> u8 {
        u8::from(self.home_win())
    }

    /// Score margin (positive = home win)
    pub fn margin(&self) -> i64 {
        self.home_score as i64 - self.away_score as i64
    }

    /// Check if a team played in this match
    pub fn involves(&self, team: &str) -> bool {
        self.home_team == team || self.away_team == team
    }

    /// Both closing odds, if present
    pub fn odds(&self) -> Option<(f64, f64)> {
        match (self.home_odds_close, self.away_odds_close) {
            (Some(h), Some(a)) => Some((h, a)),
            _ => None,
        }
    }
}

/// Application-wide errors
#[derive(Debug, Error)]
pub enum NrlError {
    #[error("Data missing required columns: {}", missing.join(", "))]
    Schema { missing: Vec<String> },

    #[error(
        "Odds orientation ambiguous: neither as-is (slope {as_is}) nor swapped (slope {swapped}) \
         produces a healthy market baseline. Check join integrity and label correctness."
    )]
    OrientationAmbiguous { as_is: String, swapped: String },

    #[error("No valid {policy} folds created")]
    NoValidFolds { policy: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, NrlError>;

/// Application configuration loaded from config.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub features: FeatureConfig,
    pub evaluation: EvaluationConfig,
    pub odds: OddsConfig,
    pub model: ModelConfig,
    pub data: DataConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Window sizes for rolling team stats
    pub rolling_windows: Vec<usize>,
    /// Minimum games before a rolling stat is non-null
    pub min_games_for_rolling: usize,
    pub pythagorean_exponent: f64,
    /// Recent games summed for the Pythagorean expectation
    pub pythagorean_window: usize,
    /// Most recent head-to-head meetings considered
    pub h2h_window: usize,
    /// Bump whenever feature definitions change
    pub feature_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    pub min_train_seasons: usize,
    pub min_test_matches: usize,
    /// Training seasons for rolling folds
    pub train_window: usize,
    pub calibration_bins: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OddsConfig {
    /// Minimum market slope for an orientation to count as healthy
    pub min_healthy_slope: f64,
    /// Minimum rows with usable odds
    pub min_rows: usize,
    /// Swap the columns back (true) or only report (false)
    pub auto_fix: bool,
    /// Abort the run when neither orientation is healthy
    pub fail_on_ambiguous: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub random_seed: u64,
    pub max_iter: usize,
    pub max_depth: usize,
    pub learning_rate: f64,
    pub min_samples_leaf: usize,
    pub l2_regularization: f64,
    /// Row fraction sampled per boosting iteration
    pub subsample: f64,
    pub logistic_epochs: usize,
    pub logistic_learning_rate: f64,
    /// Columns never used as training features
    pub feature_exclude: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    pub base_dir: String,
}

impl DataConfig {
    /// Processed data directory (scraper output)
    pub fn proc_dir(&self) -> PathBuf {
        PathBuf::from(&self.base_dir).join("proc")
    }

    /// Manual uploads
    pub fn raw_dir(&self) -> PathBuf {
        PathBuf::from(&self.base_dir).join("raw_data")
    }

    /// Evaluation artifacts
    pub fn eval_dir(&self) -> PathBuf {
        PathBuf::from(&self.base_dir).join("eval")
    }

    /// Create all data directories
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [self.proc_dir(), self.raw_dir(), self.eval_dir()] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            features: FeatureConfig {
                rolling_windows: vec![3, 5, 10],
                min_games_for_rolling: 3,
                pythagorean_exponent: 2.5,
                pythagorean_window: 10,
                h2h_window: 10,
                feature_version: "v1.0.0".to_string(),
            },
            evaluation: EvaluationConfig {
                min_train_seasons: 2,
                min_test_matches: 20,
                train_window: 3,
                calibration_bins: 10,
            },
            odds: OddsConfig {
                min_healthy_slope: 0.3,
                min_rows: 20,
                auto_fix: true,
                fail_on_ambiguous: true,
            },
            model: ModelConfig {
                random_seed: 42,
                max_iter: 100,
                max_depth: 5,
                learning_rate: 0.1,
                min_samples_leaf: 20,
                l2_regularization: 0.0,
                subsample: 1.0,
                logistic_epochs: 300,
                logistic_learning_rate: 0.1,
                feature_exclude: [
                    "match_id",
                    "date",
                    "season",
                    "home_team",
                    "away_team",
                    "home_score",
                    "away_score",
                    "home_win",
                    "home_odds_close",
                    "away_odds_close",
                    "home_odds_open",
                    "away_odds_open",
                    "asof_ts",
                    "feature_version",
                    "venue",
                    "referee",
                ]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            },
            data: DataConfig {
                base_dir: "nrl_data".to_string(),
            },
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            NrlError::Config(format!("Failed to read config file {}: {}", path, e))
        })?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| NrlError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| NrlError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject settings no component can work with
    pub fn validate(&self) -> Result<()> {
        if self.features.rolling_windows.iter().any(|&w| w == 0) {
            return Err(NrlError::Config(
                "rolling_windows must all be positive".to_string(),
            ));
        }
        if self.evaluation.train_window == 0 {
            return Err(NrlError::Config(
                "train_window must be at least 1".to_string(),
            ));
        }
        if self.evaluation.calibration_bins == 0 {
            return Err(NrlError::Config(
                "calibration_bins must be positive".to_string(),
            ));
        }
        if !(self.model.subsample > 0.0 && self.model.subsample <= 1.0) {
            return Err(NrlError::Config(format!(
                "subsample must be in (0, 1], got {}",
                self.model.subsample
            )));
        }
        if self.model.max_depth == 0 {
            return Err(NrlError::Config("max_depth must be positive".to_string()));
        }
        Ok(())
    }
}
