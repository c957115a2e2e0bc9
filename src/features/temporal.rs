//! Temporal feature extraction
//!
//! Rest periods between a team's games.

use chrono::NaiveDate;

use crate::features::history::TeamGame;

/// Rest context for a match
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RestContext {
    /// Days since the home side's previous game
    pub home_rest: Option<i64>,
    /// Days since the away side's previous game
    pub away_rest: Option<i64>,
    /// home_rest - away_rest
    pub rest_diff: Option<i64>,
}

impl RestContext {
    /// Both histories most recent first
    pub fn compute(home: &[&TeamGame], away: &[&TeamGame], match_date: NaiveDate) -> Self {
        let home_rest = days_since_last_match(home, match_date);
        let away_rest = days_since_last_match(away, match_date);
        let rest_diff = match (home_rest, away_rest) {
            (Some(h), Some(a)) => Some(h - a),
            _ => None,
        };
        RestContext {
            home_rest,
            away_rest,
            rest_diff,
        }
    }

    pub fn named(&self) -> Vec<(String, Option<f64>)> {
        vec![
            ("home_rest".to_string(), self.home_rest.map(|d| d as f64)),
            ("away_rest".to_string(), self.away_rest.map(|d| d as f64)),
            ("rest_diff".to_string(), self.rest_diff.map(|d| d as f64)),
        ]
    }
}

/// Days since the most recent game in `history`, clamped at zero
fn days_since_last_match(history: &[&TeamGame], current_date: NaiveDate) -> Option<i64> {
    history
        .first()
        .map(|last| (current_date - last.date).num_days().max(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_game(date: NaiveDate) -> TeamGame {
        TeamGame {
            match_id: "M".to_string(),
            date,
            is_home: true,
            points_for: 20,
            points_against: 10,
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn test_rest_days() {
        let home_games = [make_game(day(8)), make_game(day(1))];
        let away_games = [make_game(day(12))];
        let home: Vec<&TeamGame> = home_games.iter().collect();
        let away: Vec<&TeamGame> = away_games.iter().collect();

        let ctx = RestContext::compute(&home, &away, day(15));
        assert_eq!(ctx.home_rest, Some(7));
        assert_eq!(ctx.away_rest, Some(3));
        assert_eq!(ctx.rest_diff, Some(4));
    }

    #[test]
    fn test_no_history_is_null() {
        let home_games = [make_game(day(8))];
        let home: Vec<&TeamGame> = home_games.iter().collect();

        let ctx = RestContext::compute(&home, &[], day(15));
        assert_eq!(ctx.home_rest, Some(7));
        assert_eq!(ctx.away_rest, None);
        assert_eq!(ctx.rest_diff, None);
    }

    #[test]
    fn test_rest_clamped_at_zero() {
        let games = [make_game(day(20))];
        let history: Vec<&TeamGame> = games.iter().collect();
        let ctx = RestContext::compute(&history, &history, day(15));
        assert_eq!(ctx.home_rest, Some(0));
    }
}
