//! Directory search loader
//!
//! Looks for the newest match table under the processed and raw data
//! directories and falls back to synthetic seasons when nothing is found.

use crate::data::{generate_sample_data, MatchTable};
use crate::{DataConfig, NrlError, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const FALLBACK_MATCHES: usize = 500;
const FALLBACK_SEASONS: [i32; 5] = [2021, 2022, 2023, 2024, 2025];

/// Which directory is searched first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Preference {
    #[default]
    Proc,
    Raw,
}

impl FromStr for Preference {
    type Err = NrlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "proc" => Ok(Preference::Proc),
            "raw" => Ok(Preference::Raw),
            other => Err(NrlError::Config(format!(
                "unknown data preference '{}', expected proc or raw",
                other
            ))),
        }
    }
}

/// Where the loaded table came from
#[derive(Debug, Clone, Serialize)]
pub struct LoadMeta {
    /// "file" or "sample"
    pub source: String,
    pub path: Option<PathBuf>,
    pub notes: Vec<String>,
    pub has_odds: bool,
    pub n_matches: usize,
    pub seasons: Vec<i32>,
}

/// A filename pattern of the form `<prefix>*<suffix>`
struct FilePattern {
    prefix: &'static str,
    suffix: &'static str,
}

impl FilePattern {
    fn matches(&self, name: &str) -> bool {
        name.len() >= self.prefix.len() + self.suffix.len()
            && name.starts_with(self.prefix)
            && name.ends_with(self.suffix)
    }
}

const PROC_PATTERNS: [FilePattern; 3] = [
    FilePattern {
        prefix: "nrl_backfill_",
        suffix: ".csv",
    },
    FilePattern {
        prefix: "nrl_matches_",
        suffix: ".csv",
    },
    FilePattern {
        prefix: "model_data_",
        suffix: ".csv",
    },
];

const RAW_PATTERNS: [FilePattern; 1] = [FilePattern {
    prefix: "",
    suffix: ".csv",
}];

pub struct DataLoader {
    config: DataConfig,
}

impl DataLoader {
    pub fn new(config: DataConfig) -> Result<Self> {
        config.ensure_dirs()?;
        Ok(DataLoader { config })
    }

    /// Load the newest table, searching the preferred directory first
    pub fn load(&self, prefer: Preference) -> Result<(MatchTable, LoadMeta)> {
        let proc = (self.config.proc_dir(), &PROC_PATTERNS[..]);
        let raw = (self.config.raw_dir(), &RAW_PATTERNS[..]);
        let order = match prefer {
            Preference::Proc => [proc, raw],
            Preference::Raw => [raw, proc],
        };

        let mut chosen = None;
        for (dir, patterns) in &order {
            if let Some(path) = find_latest(dir, patterns)? {
                chosen = Some(path);
                break;
            }
        }

        let mut notes = Vec::new();
        let (table, source) = match &chosen {
            Some(path) => {
                let table = MatchTable::from_csv_path(path)?;
                notes.push(format!(
                    "Loaded: {}",
                    path.file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default()
                ));
                (table, "file")
            }
            None => {
                log::warn!("No data files found, generating sample data");
                notes.push("No data files found - generated sample data".to_string());
                (
                    generate_sample_data(FALLBACK_MATCHES, &FALLBACK_SEASONS, 42),
                    "sample",
                )
            }
        };

        if table.has_odds {
            notes.push("Odds columns present".to_string());
        } else {
            notes.push("Odds columns missing - market metrics will be skipped".to_string());
        }
        if table.dropped_rows > 0 {
            notes.push(format!(
                "Dropped {} rows without match_id or date",
                table.dropped_rows
            ));
        }
        if let (Some(first), Some(last)) = (table.matches.first(), table.matches.last()) {
            notes.push(format!("Date range: {} to {}", first.date, last.date));
        }
        notes.push(format!("Home win rate: {:.3}", table.home_win_rate()));

        let meta = LoadMeta {
            source: source.to_string(),
            path: chosen,
            notes,
            has_odds: table.has_odds,
            n_matches: table.len(),
            seasons: table.seasons(),
        };
        Ok((table, meta))
    }

    /// Save a table to the processed directory with a timestamped name
    pub fn save_to_proc(&self, table: &MatchTable, prefix: &str) -> Result<PathBuf> {
        self.config.ensure_dirs()?;
        let ts = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let path = self
            .config
            .proc_dir()
            .join(format!("{}_{}.csv", prefix, ts));
        table.save_csv(&path)?;
        log::info!("Saved {} matches to {}", table.len(), path.display());
        Ok(path)
    }
}

/// Lexicographically latest file in `dir` matching any pattern
fn find_latest(dir: &Path, patterns: &[FilePattern]) -> Result<Option<PathBuf>> {
    if !dir.is_dir() {
        return Ok(None);
    }
    let mut candidates = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(n) => n,
            None => continue,
        };
        if patterns.iter().any(|p| p.matches(name)) {
            candidates.push(path);
        }
    }
    candidates.sort();
    Ok(candidates.pop())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "match_id,date,home_team,away_team,home_score,away_score\n\
                       M1,2023-03-03,Storm,Eels,20,10\n";

    fn make_loader(dir: &Path) -> DataLoader {
        DataLoader::new(DataConfig {
            base_dir: dir.to_string_lossy().into_owned(),
        })
        .unwrap()
    }

    #[test]
    fn test_falls_back_to_sample() {
        let dir = tempfile::tempdir().unwrap();
        let loader = make_loader(dir.path());
        let (table, meta) = loader.load(Preference::Proc).unwrap();
        assert_eq!(meta.source, "sample");
        assert!(meta.path.is_none());
        assert_eq!(table.len(), 500);
        assert_eq!(meta.seasons, FALLBACK_SEASONS.to_vec());
    }

    #[test]
    fn test_picks_latest_and_respects_preference() {
        let dir = tempfile::tempdir().unwrap();
        let loader = make_loader(dir.path());
        let proc = loader.config.proc_dir();
        let raw = loader.config.raw_dir();

        std::fs::write(proc.join("nrl_matches_20240101.csv"), CSV).unwrap();
        std::fs::write(proc.join("nrl_matches_20240301.csv"), CSV).unwrap();
        // Does not match any processed pattern
        std::fs::write(proc.join("notes.csv"), CSV).unwrap();
        std::fs::write(raw.join("upload.csv"), CSV).unwrap();

        let (_, meta) = loader.load(Preference::Proc).unwrap();
        assert_eq!(meta.source, "file");
        assert_eq!(
            meta.path.unwrap().file_name().unwrap(),
            "nrl_matches_20240301.csv"
        );

        let (_, meta) = loader.load(Preference::Raw).unwrap();
        assert_eq!(meta.path.unwrap().file_name().unwrap(), "upload.csv");
    }

    #[test]
    fn test_save_to_proc_is_loadable() {
        let dir = tempfile::tempdir().unwrap();
        let loader = make_loader(dir.path());
        let table = MatchTable::from_reader(CSV.as_bytes()).unwrap();
        let path = loader.save_to_proc(&table, "nrl_matches").unwrap();
        assert!(path.exists());

        let (loaded, meta) = loader.load(Preference::Proc).unwrap();
        assert_eq!(meta.path.unwrap(), path);
        assert_eq!(loaded.matches, table.matches);
    }

    #[test]
    fn test_parse_preference() {
        assert_eq!("raw".parse::<Preference>().unwrap(), Preference::Raw);
        assert_eq!("PROC".parse::<Preference>().unwrap(), Preference::Proc);
        assert!("eval".parse::<Preference>().is_err());
    }
}
