//! Errors raised while reading season tables and persisting timelines.

use serde::Serialize;
use std::{fmt, path::PathBuf};
use thiserror::Error;

pub type Result<T, E = LoadError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum LoadError {
    /// Required columns are absent. Fatal for the season, other seasons continue.
    #[error("{source_name}: missing required columns {missing:?}")]
    Schema { source_name: String, missing: Vec<String> },

    #[error("{source_name}: {record}")]
    Malformed { source_name: String, record: MalformedRecord },

    #[error("{source_name}: no loadable lap records")]
    EmptySeason { source_name: String },

    #[error("cannot open {path}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{source_name}: failed to read table")]
    Csv {
        source_name: String,
        #[source]
        source: csv::Error,
    },
}

impl LoadError {
    /// A malformed row only costs that row; everything else ends the season.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Malformed { .. })
    }
}

/// A row that was skipped because one of its cells could not be parsed.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MalformedRecord {
    pub line: u64,
    pub season: Option<u16>,
    pub race: Option<String>,
    pub driver: Option<String>,
    pub field: String,
    pub value: String,
}

impl fmt::Display for MalformedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: cannot parse {}={:?}", self.line, self.field, self.value)?;
        if let Some(season) = self.season {
            write!(f, " season={season}")?;
        }
        if let Some(race) = &self.race {
            write!(f, " race={race:?}")?;
        }
        if let Some(driver) = &self.driver {
            write!(f, " driver={driver}")?;
        }
        Ok(())
    }
}

impl std::error::Error for MalformedRecord {}

/// The output artifact was not written. The previous artifact, if any, is untouched.
#[derive(Error, Debug)]
pub enum WriteError {
    #[error("failed writing {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed encoding timeline for {path}")]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed replacing {path}")]
    Persist {
        path: PathBuf,
        #[source]
        source: tempfile::PersistError,
    },
}

#[derive(Error, Debug)]
pub enum ReadError {
    #[error("cannot open {path}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not a timeline document")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
