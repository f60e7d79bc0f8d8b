use std::path::{Path, PathBuf};

use analysis::{LapFilter, DEFAULT_TREND_TOLERANCE_MS};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory scanned for `*.csv` season tables.
    pub input_dir: PathBuf,
    pub output_path: PathBuf,
    /// Load and reduce seasons on worker threads. Output is identical either way.
    pub parallel: bool,
    /// Mean gaps closer than this count as unchanged.
    pub trend_tolerance_ms: f64,
    pub lap_filter: LapFilter,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_dir: "data/results_data".into(),
            output_path: "data/career_timeline.json".into(),
            parallel: false,
            trend_tolerance_ms: DEFAULT_TREND_TOLERANCE_MS,
            lap_filter: LapFilter::default(),
        }
    }
}

impl PipelineConfig {
    /// Reads a JSON config file; absent keys keep their defaults.
    pub fn from_path(path: &Path) -> Result<Self, PipelineError> {
        let text = std::fs::read_to_string(path).map_err(|source| PipelineError::ConfigFile {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg: Self = serde_json::from_str(&text).map_err(|source| PipelineError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if !self.trend_tolerance_ms.is_finite() || self.trend_tolerance_ms < 0.0 {
            return Err(PipelineError::Config(format!(
                "trend_tolerance_ms must be a non-negative number, got {}",
                self.trend_tolerance_ms
            )));
        }
        if self.output_path.as_os_str().is_empty() {
            return Err(PipelineError::Config("output_path is empty".into()));
        }
        Ok(())
    }
}
