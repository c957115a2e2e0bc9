//! Data ingestion
//!
//! CSV match tables, directory search loading and synthetic sample seasons.

pub mod loader;
pub mod sample;
pub mod table;

pub use loader::{DataLoader, LoadMeta, Preference};
pub use sample::{generate_sample_data, validate_sample_data, SampleValidation};
pub use table::MatchTable;
