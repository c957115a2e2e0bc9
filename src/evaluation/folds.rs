//! Walk-forward season folds
//!
//! Anchored folds train on every earlier season; rolling folds train on a
//! fixed window of the most recent earlier seasons.

use crate::{EvaluationConfig, MatchRecord, NrlError, Result};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoldPolicy {
    Anchored,
    Rolling { window: usize },
}

impl fmt::Display for FoldPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FoldPolicy::Anchored => write!(f, "anchored"),
            FoldPolicy::Rolling { .. } => write!(f, "rolling"),
        }
    }
}

impl FoldPolicy {
    /// Parse `anchored` or `rolling`, the latter using `window`
    pub fn parse(name: &str, window: usize) -> Result<Self> {
        match name.to_lowercase().as_str() {
            "anchored" => Ok(FoldPolicy::Anchored),
            "rolling" if window == 0 => Err(NrlError::Config(
                "rolling folds need a train window of at least 1 season".to_string(),
            )),
            "rolling" => Ok(FoldPolicy::Rolling { window }),
            other => Err(NrlError::Config(format!(
                "unknown fold type '{}', expected anchored or rolling",
                other
            ))),
        }
    }
}

/// Row indices for one train/test split
#[derive(Debug, Clone, PartialEq)]
pub struct Fold {
    /// 1-based, in test-season order
    pub fold_id: usize,
    pub test_season: i32,
    pub train_seasons: Vec<i32>,
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Row indices per season, seasons ascending
fn season_rows(matches: &[MatchRecord]) -> BTreeMap<i32, Vec<usize>> {
    let mut rows: BTreeMap<i32, Vec<usize>> = BTreeMap::new();
    for (i, m) in matches.iter().enumerate() {
        rows.entry(m.season).or_default().push(i);
    }
    rows
}

/// Build folds under `policy`; `test_seasons` of `None` auto-detects every
/// season with enough history
pub fn create_folds(
    matches: &[MatchRecord],
    policy: FoldPolicy,
    test_seasons: Option<&[i32]>,
    config: &EvaluationConfig,
) -> Result<Vec<Fold>> {
    let by_season = season_rows(matches);
    let available: Vec<i32> = by_season.keys().copied().collect();

    let min_prior = match policy {
        FoldPolicy::Anchored => config.min_train_seasons,
        FoldPolicy::Rolling { window } => window,
    };

    let candidates: Vec<i32> = match test_seasons {
        Some(seasons) => seasons.to_vec(),
        None => available
            .iter()
            .copied()
            .filter(|&s| available.iter().filter(|&&p| p < s).count() >= min_prior)
            .collect(),
    };

    let mut folds = Vec::new();
    for test_season in candidates {
        let prior: Vec<i32> = available
            .iter()
            .copied()
            .filter(|&s| s < test_season)
            .collect();
        if prior.len() < min_prior {
            log::info!(
                "  Skipping {}: only {} prior seasons (need {})",
                test_season,
                prior.len(),
                min_prior
            );
            continue;
        }

        let train_seasons = match policy {
            FoldPolicy::Anchored => prior,
            FoldPolicy::Rolling { window } => prior[prior.len() - window..].to_vec(),
        };

        let test = by_season.get(&test_season).cloned().unwrap_or_default();
        if test.is_empty() || test.len() < config.min_test_matches {
            log::info!(
                "  Skipping {}: only {} test matches (need {})",
                test_season,
                test.len(),
                config.min_test_matches
            );
            continue;
        }

        let mut train: Vec<usize> = train_seasons
            .iter()
            .filter_map(|s| by_season.get(s))
            .flatten()
            .copied()
            .collect();
        train.sort_unstable();
        if train.is_empty() {
            log::info!("  Skipping {}: no training matches", test_season);
            continue;
        }

        let fold_id = folds.len() + 1;
        if let (Some(first), Some(last)) = (train_seasons.first(), train_seasons.last()) {
            log::info!(
                "  Fold {}: Train {}-{} ({}), Test {} ({})",
                fold_id,
                first,
                last,
                train.len(),
                test_season,
                test.len()
            );
        }

        folds.push(Fold {
            fold_id,
            test_season,
            train_seasons,
            train,
            test,
        });
    }

    if folds.is_empty() {
        return Err(NrlError::NoValidFolds {
            policy: policy.to_string(),
        });
    }
    Ok(folds)
}

/// The most recent `n_test_seasons` seasons with at least
/// `min_matches_per_season` matches
pub fn auto_detect_test_seasons(
    matches: &[MatchRecord],
    min_matches_per_season: usize,
    n_test_seasons: usize,
) -> Vec<i32> {
    let valid: Vec<i32> = season_rows(matches)
        .into_iter()
        .filter(|(_, rows)| rows.len() >= min_matches_per_season)
        .map(|(s, _)| s)
        .collect();
    let skip = valid.len().saturating_sub(n_test_seasons);
    valid[skip..].to_vec()
}
