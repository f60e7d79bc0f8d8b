use std::path::PathBuf;

use analysis::SessionError;
use thiserror::Error;
use timeline_io::{LoadError, WriteError};

use crate::report::SeasonOutcome;

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Broken internal invariant. The run is aborted.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Nothing was persisted.
    #[error(transparent)]
    Write(#[from] WriteError),

    #[error("cannot list season tables")]
    Discover(#[source] LoadError),

    #[error("no season produced results ({} sources tried)", .seasons.len())]
    NoSeasons { seasons: Vec<SeasonOutcome> },

    #[error("invalid config: {0}")]
    Config(String),

    #[error("cannot read config {path}")]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config {path}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot format run timestamp")]
    Timestamp(#[from] time::error::Format),
}

impl PipelineError {
    /// Per-season manifest, when the run got far enough to produce one.
    pub fn seasons(&self) -> Option<&[SeasonOutcome]> {
        match self {
            Self::NoSeasons { seasons } => Some(seasons),
            _ => None,
        }
    }
}
