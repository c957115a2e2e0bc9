//! Team statistics computation
//!
//! Rolling form and Pythagorean expectation from a team's prior games.

use crate::features::history::TeamGame;

/// Aggregate statistics over a run of games
#[derive(Debug, Clone, Default)]
pub struct TeamStatistics {
    /// Total games played
    pub games: usize,
    /// Wins
    pub wins: usize,
    /// Total points scored
    pub points_for: u64,
    /// Total points conceded
    pub points_against: u64,
}

impl TeamStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulate over a sequence of games
    pub fn from_games<'a, I>(games: I) -> Self
    where
        I: IntoIterator<Item = &'a TeamGame>,
    {
        let mut stats = Self::new();
        for game in games {
            stats.update(game);
        }
        stats
    }

    pub fn update(&mut self, game: &TeamGame) {
        self.games += 1;
        self.wins += game.win() as usize;
        self.points_for += u64::from(game.points_for);
        self.points_against += u64::from(game.points_against);
    }

    /// Win ratio (0-1)
    pub fn win_ratio(&self) -> f64 {
        if self.games == 0 {
            0.0
        } else {
            self.wins as f64 / self.games as f64
        }
    }

    /// Average points scored per game
    pub fn avg_points_for(&self) -> f64 {
        if self.games == 0 {
            0.0
        } else {
            self.points_for as f64 / self.games as f64
        }
    }

    /// Average points conceded per game
    pub fn avg_points_against(&self) -> f64 {
        if self.games == 0 {
            0.0
        } else {
            self.points_against as f64 / self.games as f64
        }
    }

    /// Average point differential per game
    pub fn avg_margin(&self) -> f64 {
        self.avg_points_for() - self.avg_points_against()
    }

    /// Pythagorean win expectation `pf^e / (pf^e + pa^e)`
    pub fn pythagorean(&self, exponent: f64) -> Option<f64> {
        if self.points_for + self.points_against == 0 {
            return None;
        }
        let pf = (self.points_for as f64).powf(exponent);
        let pa = (self.points_against as f64).powf(exponent);
        Some(pf / (pf + pa))
    }
}

/// Rolling form over a team's most recent games
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RollingStats {
    /// Games actually in the window
    pub games: usize,
    pub pf: Option<f64>,
    pub pa: Option<f64>,
    pub margin: Option<f64>,
    pub win_rate: Option<f64>,
}

/// Stat suffixes that get home-minus-away differentials
pub const DIFF_STATS: [&str; 4] = ["pf", "pa", "margin", "win_rate"];

impl RollingStats {
    /// `history` is most recent first; averages stay null until the window
    /// holds at least `min_games`
    pub fn compute(history: &[&TeamGame], window: usize, min_games: usize) -> Self {
        let recent = &history[..window.min(history.len())];
        let mut rolling = RollingStats {
            games: recent.len(),
            ..Default::default()
        };
        if recent.is_empty() || recent.len() < min_games {
            return rolling;
        }

        let stats = TeamStatistics::from_games(recent.iter().copied());
        rolling.pf = Some(stats.avg_points_for());
        rolling.pa = Some(stats.avg_points_against());
        rolling.margin = Some(stats.avg_margin());
        rolling.win_rate = Some(stats.win_ratio());
        rolling
    }

    /// Value of a differential stat by suffix
    pub fn stat(&self, name: &str) -> Option<f64> {
        match name {
            "pf" => self.pf,
            "pa" => self.pa,
            "margin" => self.margin,
            "win_rate" => self.win_rate,
            _ => None,
        }
    }

    /// Named values under `prefix`, e.g. `home_5_pf`
    pub fn named(&self, prefix: &str) -> Vec<(String, Option<f64>)> {
        vec![
            (format!("{}_games", prefix), Some(self.games as f64)),
            (format!("{}_pf", prefix), self.pf),
            (format!("{}_pa", prefix), self.pa),
            (format!("{}_margin", prefix), self.margin),
            (format!("{}_win_rate", prefix), self.win_rate),
        ]
    }
}

/// Pythagorean expectation over the most recent `window` games, null while
/// the full prior history is shorter than `min_games`
pub fn pythagorean_expectation(
    history: &[&TeamGame],
    window: usize,
    exponent: f64,
    min_games: usize,
) -> Option<f64> {
    if history.is_empty() || history.len() < min_games {
        return None;
    }
    let recent = &history[..window.min(history.len())];
    TeamStatistics::from_games(recent.iter().copied()).pythagorean(exponent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn make_game(points_for: u32, points_against: u32) -> TeamGame {
        TeamGame {
            match_id: "M".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            is_home: true,
            points_for,
            points_against,
        }
    }

    #[test]
    fn test_team_statistics() {
        let games = [make_game(30, 20), make_game(10, 24), make_game(12, 12)];
        let stats = TeamStatistics::from_games(games.iter());
        assert_eq!(stats.games, 3);
        // Draw does not count as a win
        assert_eq!(stats.wins, 1);
        assert_eq!(stats.points_for, 52);
        assert!((stats.avg_margin() - (52.0 - 56.0) / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_rolling_window_and_minimum() {
        let games: Vec<TeamGame> = vec![make_game(20, 10), make_game(10, 20), make_game(30, 0)];
        let history: Vec<&TeamGame> = games.iter().collect();

        let two = RollingStats::compute(&history, 2, 3);
        assert_eq!(two.games, 2);
        assert_eq!(two.pf, None);

        let five = RollingStats::compute(&history, 5, 3);
        assert_eq!(five.games, 3);
        assert_eq!(five.pf, Some(20.0));
        assert_eq!(five.margin, Some(10.0));
        assert!((five.win_rate.unwrap() - 2.0 / 3.0).abs() < 1e-12);

        let empty = RollingStats::compute(&[], 5, 0);
        assert_eq!(empty.games, 0);
        assert_eq!(empty.win_rate, None);
    }

    #[test]
    fn test_pythagorean() {
        let games = vec![make_game(20, 10), make_game(20, 10), make_game(20, 10)];
        let history: Vec<&TeamGame> = games.iter().collect();
        let p = pythagorean_expectation(&history, 10, 2.0, 3).unwrap();
        assert!((p - 0.8).abs() < 1e-12);

        assert_eq!(pythagorean_expectation(&history[..2], 10, 2.0, 3), None);

        let scoreless = vec![make_game(0, 0); 3];
        let history: Vec<&TeamGame> = scoreless.iter().collect();
        assert_eq!(pythagorean_expectation(&history, 10, 2.5, 3), None);
    }
}
