//! Feature extraction
//!
//! Converts match history into point-in-time safe model features.

pub mod engineer;
pub mod history;
pub mod matchup;
pub mod pit;
pub mod team_stats;
pub mod temporal;

pub use engineer::{FeatureEngineer, FeatureMatrix, FeatureVector};
pub use pit::{PitFilter, PitReport, PitStatus};
pub use team_stats::TeamStatistics;
