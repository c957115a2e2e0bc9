//! Head-to-head features

use crate::features::history::Meeting;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HeadToHead {
    pub games: usize,
    /// Share of meetings won by the current home side
    pub home_win_rate: Option<f64>,
    /// Average margin from the current home side's perspective
    pub margin: Option<f64>,
}

impl HeadToHead {
    /// `meetings` most recent first, already cut off at the match date
    pub fn compute(meetings: &[&Meeting], home_team: &str, window: usize) -> Self {
        let recent = &meetings[..window.min(meetings.len())];
        if recent.is_empty() {
            return HeadToHead::default();
        }

        let wins = recent.iter().filter(|m| m.won_by(home_team)).count();
        let total_margin: i64 = recent.iter().map(|m| m.margin_for(home_team)).sum();
        let n = recent.len() as f64;

        HeadToHead {
            games: recent.len(),
            home_win_rate: Some(wins as f64 / n),
            margin: Some(total_margin as f64 / n),
        }
    }

    pub fn named(&self) -> Vec<(String, Option<f64>)> {
        vec![
            ("h2h_games".to_string(), Some(self.games as f64)),
            ("h2h_home_win_rate".to_string(), self.home_win_rate),
            ("h2h_margin".to_string(), self.margin),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn meeting(day: u32, home: &str, hs: u32, aws: u32) -> Meeting {
        Meeting {
            date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            home_team: home.to_string(),
            home_score: hs,
            away_score: aws,
        }
    }

    #[test]
    fn test_home_perspective_across_venues() {
        let meetings = [
            meeting(20, "Eels", 10, 20), // Storm won away by 10
            meeting(10, "Storm", 12, 18), // Storm lost at home by 6
        ];
        let refs: Vec<&Meeting> = meetings.iter().collect();
        let h2h = HeadToHead::compute(&refs, "Storm", 10);
        assert_eq!(h2h.games, 2);
        assert_eq!(h2h.home_win_rate, Some(0.5));
        assert_eq!(h2h.margin, Some(2.0));
    }

    #[test]
    fn test_window_and_empty() {
        let meetings = [meeting(20, "Eels", 10, 20), meeting(10, "Storm", 12, 18)];
        let refs: Vec<&Meeting> = meetings.iter().collect();
        let h2h = HeadToHead::compute(&refs, "Storm", 1);
        assert_eq!(h2h.games, 1);
        assert_eq!(h2h.home_win_rate, Some(1.0));

        let none = HeadToHead::compute(&[], "Storm", 10);
        assert_eq!(none.games, 0);
        assert_eq!(none.margin, None);
    }
}
