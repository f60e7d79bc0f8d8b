//! What a run did with each season table.

use std::path::PathBuf;

use analysis::ReviewFlag;
use serde::Serialize;
use timeline_io::MalformedRecord;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeasonOutcome {
    pub source: String,
    #[serde(flatten)]
    pub status: SeasonStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SeasonStatus {
    Loaded {
        laps: usize,
        races: usize,
        results: usize,
        skipped_rows: Vec<MalformedRecord>,
    },
    /// The table loaded but yielded no classified result.
    Empty,
    Failed { reason: String },
}

impl SeasonOutcome {
    pub fn is_loaded(&self) -> bool {
        matches!(self.status, SeasonStatus::Loaded { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub output_path: PathBuf,
    pub seasons: Vec<SeasonOutcome>,
    pub review_flags: Vec<ReviewFlag>,
    pub drivers: usize,
    pub races: usize,
}

impl RunReport {
    pub fn skipped_seasons(&self) -> impl Iterator<Item = &SeasonOutcome> {
        self.seasons.iter().filter(|s| !s.is_loaded())
    }
}
