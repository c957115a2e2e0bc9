//! Team history and matchup indexes
//!
//! Both indexes are built once from the full, date-sorted match list and are
//! read-only afterwards. Lookups still have to go through the PIT filter.

use crate::features::pit::Dated;
use crate::MatchRecord;
use chrono::NaiveDate;
use std::collections::HashMap;

/// One game seen from a single team's side
#[derive(Debug, Clone, PartialEq)]
pub struct TeamGame {
    pub match_id: String,
    pub date: NaiveDate,
    pub is_home: bool,
    pub points_for: u32,
    pub points_against: u32,
}

impl TeamGame {
    fn from_record(record: &MatchRecord, team: &str) -> Self {
        let is_home = record.home_team == team;
        let (points_for, points_against) = if is_home {
            (record.home_score, record.away_score)
        } else {
            (record.away_score, record.home_score)
        };
        TeamGame {
            match_id: record.match_id.clone(),
            date: record.date,
            is_home,
            points_for,
            points_against,
        }
    }

    pub fn margin(&self) -> i64 {
        self.points_for as i64 - self.points_against as i64
    }

    /// 1 for a win, 0 for a loss or draw
    pub fn win(&self) -> u8 {
        u8::from(self.points_for > self.points_against)
    }
}

impl Dated for TeamGame {
    fn date(&self) -> Option<NaiveDate> {
        Some(self.date)
    }
}

/// Per-team games in ascending date order
#[derive(Debug, Default)]
pub struct TeamHistoryIndex {
    games: HashMap<String, Vec<TeamGame>>,
}

impl TeamHistoryIndex {
    /// `matches` must already be sorted by date
    pub fn build(matches: &[MatchRecord]) -> Self {
        let mut games: HashMap<String, Vec<TeamGame>> = HashMap::new();
        for record in matches {
            for team in [&record.home_team, &record.away_team] {
                games
                    .entry(team.clone())
                    .or_default()
                    .push(TeamGame::from_record(record, team));
            }
        }
        TeamHistoryIndex { games }
    }

    /// Every game for a team, including ones after any cutoff
    pub fn games(&self, team: &str) -> &[TeamGame] {
        self.games.get(team).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn n_teams(&self) -> usize {
        self.games.len()
    }
}

/// A meeting between two teams
#[derive(Debug, Clone, PartialEq)]
pub struct Meeting {
    pub date: NaiveDate,
    pub home_team: String,
    pub home_score: u32,
    pub away_score: u32,
}

impl Meeting {
    /// Margin from `team`'s perspective
    pub fn margin_for(&self, team: &str) -> i64 {
        let home_margin = self.home_score as i64 - self.away_score as i64;
        if self.home_team == team {
            home_margin
        } else {
            -home_margin
        }
    }

    pub fn won_by(&self, team: &str) -> bool {
        self.margin_for(team) > 0
    }
}

impl Dated for Meeting {
    fn date(&self) -> Option<NaiveDate> {
        Some(self.date)
    }
}

/// Meetings keyed by unordered team pair
#[derive(Debug, Default)]
pub struct MatchupIndex {
    meetings: HashMap<(String, String), Vec<Meeting>>,
}

impl MatchupIndex {
    /// `matches` must already be sorted by date
    pub fn build(matches: &[MatchRecord]) -> Self {
        let mut meetings: HashMap<(String, String), Vec<Meeting>> = HashMap::new();
        for record in matches {
            meetings
                .entry(Self::key(&record.home_team, &record.away_team))
                .or_default()
                .push(Meeting {
                    date: record.date,
                    home_team: record.home_team.clone(),
                    home_score: record.home_score,
                    away_score: record.away_score,
                });
        }
        MatchupIndex { meetings }
    }

    /// Canonical key for a team pair (lexicographically smaller name first)
    fn key(team1: &str, team2: &str) -> (String, String) {
        if team1 <= team2 {
            (team1.to_string(), team2.to_string())
        } else {
            (team2.to_string(), team1.to_string())
        }
    }

    /// Every meeting between the two teams, either venue
    pub fn meetings(&self, team1: &str, team2: &str) -> &[Meeting] {
        self.meetings
            .get(&Self::key(team1, team2))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_match(id: &str, day: u32, home: &str, away: &str, hs: u32, aws: u32) -> MatchRecord {
        MatchRecord {
            match_id: id.to_string(),
            date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
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

    #[test]
    fn test_team_perspective() {
        let matches = vec![
            make_match("M1", 1, "Storm", "Eels", 30, 20),
            make_match("M2", 8, "Broncos", "Storm", 25, 15),
        ];
        let index = TeamHistoryIndex::build(&matches);
        assert_eq!(index.n_teams(), 3);

        let storm = index.games("Storm");
        assert_eq!(storm.len(), 2);
        assert!(storm[0].is_home);
        assert_eq!(storm[0].margin(), 10);
        assert_eq!(storm[0].win(), 1);
        assert!(!storm[1].is_home);
        assert_eq!(storm[1].points_for, 15);
        assert_eq!(storm[1].win(), 0);

        assert!(index.games("Titans").is_empty());
    }

    #[test]
    fn test_matchups_ignore_venue() {
        let matches = vec![
            make_match("M1", 1, "Storm", "Eels", 30, 20),
            make_match("M2", 8, "Eels", "Storm", 18, 12),
            make_match("M3", 9, "Storm", "Broncos", 18, 12),
        ];
        let index = MatchupIndex::build(&matches);
        let meetings = index.meetings("Eels", "Storm");
        assert_eq!(meetings.len(), 2);
        assert_eq!(index.meetings("Storm", "Eels").len(), 2);
        assert_eq!(meetings[0].margin_for("Eels"), -10);
        assert!(meetings[1].won_by("Eels"));
    }
}
