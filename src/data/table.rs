//! Tabular match data
//!
//! Reads and writes the match CSV exchanged with the acquisition layer.

use crate::{MatchRecord, NrlError, Result};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use std::collections::{HashMap, HashSet};
use std::io::{Read, Write};
use std::path::Path;

/// Columns every input table must carry
pub const REQUIRED_COLUMNS: [&str; 6] = [
    "match_id",
    "date",
    "home_team",
    "away_team",
    "home_score",
    "away_score",
];

/// Optional market columns
pub const ODDS_COLUMNS: [&str; 2] = ["home_odds_close", "away_odds_close"];

/// Ordered match records plus which optional columns were supplied
#[derive(Debug, Clone, Default)]
pub struct MatchTable {
    pub matches: Vec<MatchRecord>,
    /// Both closing-odds columns were present in the source
    pub has_odds: bool,
    /// Rows dropped for an empty match id, an unparsable date or a repeated match id
    pub dropped_rows: usize,
}

impl MatchTable {
    /// Build a table from records, sorting by date (stable)
    pub fn new(mut matches: Vec<MatchRecord>, has_odds: bool) -> Self {
        matches.sort_by_key(|m| m.date);
        MatchTable {
            matches,
            has_odds,
            dropped_rows: 0,
        }
    }

    pub fn from_csv_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)?;
        let table = Self::from_reader(file)?;
        log::info!(
            "Loaded {} matches from {} (odds: {})",
            table.len(),
            path.display(),
            table.has_odds
        );
        Ok(table)
    }

    /// Parse a CSV table, validating the schema before reading any row
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

        let headers = rdr.headers()?.clone();
        let index: HashMap<String, usize> = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.to_string(), i))
            .collect();

        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|c| !index.contains_key(**c))
            .map(|c| c.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(NrlError::Schema { missing });
        }

        let has_odds = ODDS_COLUMNS.iter().all(|c| index.contains_key(*c));

        let mut matches = Vec::new();
        let mut dropped = 0;
        let mut seen_ids: HashSet<String> = HashSet::new();
        let mut duplicates = 0;

        for (row_no, result) in rdr.records().enumerate() {
            let row = result?;
            let field = |name: &str| column_value(&row, &index, name);

            let match_id = field("match_id");
            let date = match parse_date(field("date")) {
                Some(d) if !match_id.is_empty() => d,
                _ => {
                    dropped += 1;
                    continue;
                }
            };

            // First occurrence of a match_id wins
            if !seen_ids.insert(match_id.to_string()) {
                duplicates += 1;
                continue;
            }

            let home_score = parse_integer(field("home_score"), "home_score", row_no)?;
            let away_score = parse_integer(field("away_score"), "away_score", row_no)?;

            let season = match field("season") {
                "" => date.year(),
                value => parse_integer(value, "season", row_no)?,
            };
            let round = match field("round") {
                "" => None,
                value => Some(parse_integer(value, "round", row_no)?),
            };

            matches.push(MatchRecord {
                match_id: match_id.to_string(),
                date,
                season,
                home_team: field("home_team").to_string(),
                away_team: field("away_team").to_string(),
                home_score,
                away_score,
                home_odds_close: parse_odds(field("home_odds_close")),
                away_odds_close: parse_odds(field("away_odds_close")),
                is_finals: parse_flag(field("is_finals")),
                venue: Some(field("venue"))
                    .filter(|v| !v.is_empty())
                    .map(str::to_string),
                round,
            });
        }

        if dropped > 0 {
            log::warn!(
                "Dropped {} rows with missing match_id or unparsable date",
                dropped
            );
        }

        if duplicates > 0 {
            log::warn!("Dropped {} rows with a duplicate match_id", duplicates);
        }

        let mut table = MatchTable::new(matches, has_odds);
        table.dropped_rows = dropped + duplicates;
        Ok(table)
    }

    /// Write the table in the input CSV layout
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        let mut header = vec![
            "match_id",
            "date",
            "season",
            "home_team",
            "away_team",
            "home_score",
            "away_score",
        ];
        if self.has_odds {
            header.extend(ODDS_COLUMNS);
        }
        header.extend(["is_finals", "venue", "round"]);
        wtr.write_record(&header)?;

        for m in &self.matches {
            let mut record = vec![
                m.match_id.clone(),
                m.date.format("%Y-%m-%d").to_string(),
                m.season.to_string(),
                m.home_team.clone(),
                m.away_team.clone(),
                m.home_score.to_string(),
                m.away_score.to_string(),
            ];
            if self.has_odds {
                record.push(opt_to_string(m.home_odds_close));
                record.push(opt_to_string(m.away_odds_close));
            }
            record.push(opt_to_string(m.is_finals));
            record.push(m.venue.clone().unwrap_or_default());
            record.push(opt_to_string(m.round));
            wtr.write_record(&record)?;
        }

        wtr.flush()?;
        Ok(())
    }

    pub fn save_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::File::create(path)?;
        self.write_csv(file)
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Distinct seasons, ascending
    pub fn seasons(&self) -> Vec<i32> {
        let mut seasons: Vec<i32> = self.matches.iter().map(|m| m.season).collect();
        seasons.sort_unstable();
        seasons.dedup();
        seasons
    }

    /// Fraction of matches won by the home side
    pub fn home_win_rate(&self) -> f64 {
        if self.matches.is_empty() {
            return 0.0;
        }
        let wins = self.matches.iter().filter(|m| m.home_win()).count();
        wins as f64 / self.matches.len() as f64
    }
}

/// Parse the date formats seen in exported match files
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(dt.date());
        }
    }
    for fmt in ["%Y-%m-%d", "%d/%m/%Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(value, fmt) {
            return Some(d);
        }
    }
    None
}

fn column_value<'a>(
    row: &'a csv::StringRecord,
    index: &HashMap<String, usize>,
    name: &str,
) -> &'a str {
    index.get(name).and_then(|&i| row.get(i)).unwrap_or("")
}

/// Integer column value; whole floats such as "24.0" are accepted
fn parse_integer<T: TryFrom<i64>>(value: &str, column: &str, row_no: usize) -> Result<T> {
    value
        .parse::<i64>()
        .ok()
        .or_else(|| {
            value
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15)
                .map(|v| v as i64)
        })
        .and_then(|v| T::try_from(v).ok())
        .ok_or_else(|| {
            NrlError::Parse(format!(
                "row {}: invalid {} value '{}'",
                row_no + 1,
                column,
                value
            ))
        })
}

fn parse_odds(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}

fn opt_to_string<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}
