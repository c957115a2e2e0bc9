//! Point-in-time safe feature engineering
//!
//! Rolling team form, Pythagorean expectation, head-to-head record and rest
//! days, each computed from games strictly before the match being described.

use crate::features::history::{MatchupIndex, TeamGame, TeamHistoryIndex};
use crate::features::matchup::HeadToHead;
use crate::features::pit::{PitFilter, PitReport, PitStatus};
use crate::features::team_stats::{pythagorean_expectation, RollingStats, DIFF_STATS};
use crate::features::temporal::RestContext;
use crate::{FeatureConfig, MatchRecord};
use chrono::NaiveDate;
use std::collections::HashMap;

/// Numeric columns carried by the match table itself
pub const MATCH_NUMERIC_COLUMNS: [&str; 7] = [
    "season",
    "home_score",
    "away_score",
    "home_win",
    "home_odds_close",
    "away_odds_close",
    "round",
];

/// Value of a numeric match column, `None` if null or not a match column
pub fn match_column_value(record: &MatchRecord, name: &str) -> Option<f64> {
    match name {
        "season" => Some(f64::from(record.season)),
        "home_score" => Some(f64::from(record.home_score)),
        "away_score" => Some(f64::from(record.away_score)),
        "home_win" => Some(f64::from(record.home_win_label())),
        "home_odds_close" => record.home_odds_close,
        "away_odds_close" => record.away_odds_close,
        "round" => record.round.map(f64::from),
        _ => None,
    }
}

/// Named features for one match
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    pub match_id: String,
    pub asof: NaiveDate,
    pub feature_version: String,
    pub values: Vec<(String, Option<f64>)>,
}

impl FeatureVector {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, v)| *v)
    }
}

/// Feature rows aligned to a shared column list
#[derive(Debug, Clone, Default)]
pub struct FeatureMatrix {
    pub columns: Vec<String>,
    pub match_ids: Vec<String>,
    pub rows: Vec<Vec<Option<f64>>>,
    /// Matches skipped for an empty match id
    pub skipped: usize,
    index: HashMap<String, usize>,
}

impl FeatureMatrix {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Feature row for a match (first occurrence)
    pub fn row(&self, match_id: &str) -> Option<&[Option<f64>]> {
        self.index.get(match_id).map(|&i| self.rows[i].as_slice())
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

/// Accumulates feature vectors and aligns them once
#[derive(Debug, Default)]
pub struct FeatureMatrixBuilder {
    columns: Vec<String>,
    column_index: HashMap<String, usize>,
    vectors: Vec<FeatureVector>,
    skipped: usize,
}

impl FeatureMatrixBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, vector: FeatureVector) {
        for (name, _) in &vector.values {
            if !self.column_index.contains_key(name) {
                self.column_index.insert(name.clone(), self.columns.len());
                self.columns.push(name.clone());
            }
        }
        self.vectors.push(vector);
    }

    pub fn skip(&mut self) {
        self.skipped += 1;
    }

    pub fn build(self) -> FeatureMatrix {
        let n_cols = self.columns.len();
        let mut match_ids = Vec::with_capacity(self.vectors.len());
        let mut rows = Vec::with_capacity(self.vectors.len());
        let mut index = HashMap::new();

        for vector in self.vectors {
            let mut row = vec![None; n_cols];
            for (name, value) in vector.values {
                if let Some(&j) = self.column_index.get(&name) {
                    row[j] = value;
                }
            }
            index.entry(vector.match_id.clone()).or_insert(rows.len());
            match_ids.push(vector.match_id);
            rows.push(row);
        }

        FeatureMatrix {
            columns: self.columns,
            match_ids,
            rows,
            skipped: self.skipped,
            index,
        }
    }
}

/// Computes features against a fixed match history
pub struct FeatureEngineer {
    config: FeatureConfig,
    history: TeamHistoryIndex,
    matchups: MatchupIndex,
    pit: PitFilter,
}

impl FeatureEngineer {
    /// Index the full history; the input need not be sorted
    pub fn new(matches: &[MatchRecord], config: FeatureConfig) -> Self {
        let mut sorted = matches.to_vec();
        sorted.sort_by_key(|m| m.date);

        let history = TeamHistoryIndex::build(&sorted);
        let matchups = MatchupIndex::build(&sorted);
        log::debug!(
            "Indexed {} matches across {} teams",
            sorted.len(),
            history.n_teams()
        );

        FeatureEngineer {
            config,
            history,
            matchups,
            pit: PitFilter::new(),
        }
    }

    /// A team's games before `before`, most recent first
    fn team_history(&self, team: &str, before: NaiveDate) -> Vec<&TeamGame> {
        let name = format!("history_{}", team.chars().take(10).collect::<String>());
        let (mut kept, _) = self.pit.filter(&name, self.history.games(team), before);
        kept.reverse();
        kept
    }

    fn head_to_head(&self, home_team: &str, away_team: &str, before: NaiveDate) -> HeadToHead {
        let meetings = self.matchups.meetings(home_team, away_team);
        let (mut kept, _) = self.pit.filter("h2h", meetings, before);
        kept.reverse();
        HeadToHead::compute(&kept, home_team, self.config.h2h_window)
    }

    /// All features for one match
    pub fn compute_features(&self, record: &MatchRecord) -> FeatureVector {
        let cfg = &self.config;
        let home_history = self.team_history(&record.home_team, record.date);
        let away_history = self.team_history(&record.away_team, record.date);

        let mut values = Vec::new();

        for &window in &cfg.rolling_windows {
            let home = RollingStats::compute(&home_history, window, cfg.min_games_for_rolling);
            let away = RollingStats::compute(&away_history, window, cfg.min_games_for_rolling);
            values.extend(home.named(&format!("home_{}", window)));
            values.extend(away.named(&format!("away_{}", window)));

            for stat in DIFF_STATS {
                let diff = match (home.stat(stat), away.stat(stat)) {
                    (Some(h), Some(a)) => Some(h - a),
                    _ => None,
                };
                values.push((format!("diff_{}_{}", window, stat), diff));
            }
        }

        let pythag = |history: &[&TeamGame]| {
            pythagorean_expectation(
                history,
                cfg.pythagorean_window,
                cfg.pythagorean_exponent,
                cfg.min_games_for_rolling,
            )
        };
        let home_pythag = pythag(&home_history);
        let away_pythag = pythag(&away_history);
        let pythag_diff = match (home_pythag, away_pythag) {
            (Some(h), Some(a)) => Some(h - a),
            _ => None,
        };
        values.push(("home_pythag".to_string(), home_pythag));
        values.push(("away_pythag".to_string(), away_pythag));
        values.push(("pythag_diff".to_string(), pythag_diff));

        values.extend(
            self.head_to_head(&record.home_team, &record.away_team, record.date)
                .named(),
        );
        values.extend(RestContext::compute(&home_history, &away_history, record.date).named());

        FeatureVector {
            match_id: record.match_id.clone(),
            asof: record.date,
            feature_version: cfg.feature_version.clone(),
            values,
        }
    }

    /// One feature row per match, skipping matches without a join key
    pub fn build_feature_matrix(&self, matches: &[MatchRecord]) -> FeatureMatrix {
        let mut builder = FeatureMatrixBuilder::new();
        for record in matches {
            if record.match_id.is_empty() {
                builder.skip();
                continue;
            }
            builder.push(self.compute_features(record));
        }
        let matrix = builder.build();

        if matrix.skipped > 0 {
            log::warn!("Skipped {} matches without a match_id", matrix.skipped);
        }

        let report = self.pit.report();
        log::info!("PIT status: {}", report.status);
        if report.status == PitStatus::ViolationsBlocked {
            log::info!("  Blocked {} future rows", report.total_rows_blocked);
        }

        matrix
    }

    pub fn pit_report(&self) -> PitReport {
        self.pit.report()
    }

    /// Numeric columns usable for training: match columns then feature
    /// columns, minus the deny-list
    pub fn feature_columns(
        &self,
        matrix: &FeatureMatrix,
        has_odds: bool,
        exclude: &[String],
    ) -> Vec<String> {
        MATCH_NUMERIC_COLUMNS
            .iter()
            .filter(|c| has_odds || !c.ends_with("_odds_close"))
            .map(|c| c.to_string())
            .chain(matrix.columns.iter().cloned())
            .filter(|c| !exclude.contains(c))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Config;

    fn make_match(id: &str, day: i64, home: &str, away: &str, hs: u32, aws: u32) -> MatchRecord {
        MatchRecord {
            match_id: id.to_string(),
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap() + chrono::Duration::days(day),
            season: 2024,
            home_team: home.to_string(),
            away_team: away.to_string(),
            home_score: hs,
            away_score: aws,
            home_odds_close: None,
            away_odds_close: None,
            is_finals: None,
            venue: None,
            round: None,
        }
    }

    fn make_season() -> Vec<MatchRecord> {
        vec![
            make_match("M1", 0, "Storm", "Eels", 30, 10),
            make_match("M2", 7, "Eels", "Storm", 12, 20),
            make_match("M3", 14, "Storm", "Broncos", 24, 18),
            make_match("M4", 21, "Broncos", "Eels", 6, 30),
            make_match("M5", 28, "Eels", "Broncos", 22, 16),
            make_match("M6", 35, "Storm", "Eels", 18, 20),
            // Scores that only a leaking feature could see
            make_match("M7", 42, "Eels", "Storm", 99, 0),
        ]
    }

    #[test]
    fn test_rolling_features_use_only_prior_games() {
        let matches = make_season();
        let engineer = FeatureEngineer::new(&matches, Config::default().features);
        let fv = engineer.compute_features(&matches[5]);

        assert_eq!(fv.asof, matches[5].date);
        // Storm before M6: won 30-10, 20-12, 24-18
        assert_eq!(fv.get("home_3_games"), Some(3.0));
        assert_eq!(fv.get("home_3_pf"), Some(74.0 / 3.0));
        assert_eq!(fv.get("home_3_win_rate"), Some(1.0));
        // Only three prior games, so the 5 window counts them but still has stats
        assert_eq!(fv.get("home_5_games"), Some(3.0));
        // Eels before M6: lost, lost, won, won
        assert_eq!(fv.get("away_3_games"), Some(3.0));
        assert_eq!(fv.get("away_3_win_rate"), Some(2.0 / 3.0));
        assert_eq!(fv.get("diff_3_win_rate"), Some(1.0 - 2.0 / 3.0));
        assert_eq!(fv.get("home_rest"), Some(21.0));
        assert_eq!(fv.get("away_rest"), Some(7.0));
    }

    #[test]
    fn test_first_match_has_null_stats() {
        let matches = make_season();
        let engineer = FeatureEngineer::new(&matches, Config::default().features);
        let fv = engineer.compute_features(&matches[0]);

        assert_eq!(fv.get("home_3_games"), Some(0.0));
        assert_eq!(fv.get("home_3_pf"), None);
        assert_eq!(fv.get("diff_3_pf"), None);
        assert_eq!(fv.get("home_pythag"), None);
        assert_eq!(fv.get("h2h_games"), Some(0.0));
        assert_eq!(fv.get("h2h_margin"), None);
        assert_eq!(fv.get("home_rest"), None);
        assert_eq!(fv.get("rest_diff"), None);
    }

    #[test]
    fn test_head_to_head_before_match() {
        let matches = make_season();
        let engineer = FeatureEngineer::new(&matches, Config::default().features);
        let fv = engineer.compute_features(&matches[5]);

        // Storm vs Eels before M6: Storm +20 at home, Storm +8 away
        assert_eq!(fv.get("h2h_games"), Some(2.0));
        assert_eq!(fv.get("h2h_home_win_rate"), Some(1.0));
        assert_eq!(fv.get("h2h_margin"), Some(14.0));
    }

    #[test]
    fn test_features_unchanged_by_future_rows() {
        let matches = make_season();
        let full = FeatureEngineer::new(&matches, Config::default().features);
        let truncated = FeatureEngineer::new(&matches[..6], Config::default().features);

        assert_eq!(
            full.compute_features(&matches[5]).values,
            truncated.compute_features(&matches[5]).values
        );
        // The full index had to block M6 and M7 rows
        assert_eq!(
            full.pit_report().status,
            crate::features::pit::PitStatus::ViolationsBlocked
        );
    }

    #[test]
    fn test_feature_matrix_columns_and_skips() {
        let mut matches = make_season();
        matches[2].match_id = String::new();
        let config = Config::default();
        let engineer = FeatureEngineer::new(&matches, config.features.clone());
        let matrix = engineer.build_feature_matrix(&matches);

        assert_eq!(matrix.len(), 6);
        assert_eq!(matrix.skipped, 1);
        assert_eq!(matrix.columns[0], "home_3_games");
        assert_eq!(matrix.columns.last().unwrap(), "rest_diff");
        // 3 windows * 14 + pythag 3 + h2h 3 + rest 3
        assert_eq!(matrix.columns.len(), 51);
        assert!(matrix.row("M2").is_some());
        assert!(matrix.row("M3").is_none());

        let cols = engineer.feature_columns(&matrix, true, &config.model.feature_exclude);
        assert!(!cols.contains(&"home_win".to_string()));
        assert!(!cols.contains(&"home_odds_close".to_string()));
        assert!(cols.contains(&"round".to_string()));
        assert_eq!(cols.len(), 52);
    }
}
