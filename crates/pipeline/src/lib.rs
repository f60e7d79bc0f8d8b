//! Qualifying career-timeline pipeline.
//!
//! Loader -> session reducer -> metric calculator -> timeline builder -> serializer.
//! Failures are isolated per season table; the run succeeds when at least one
//! table contributes to the timeline.

pub mod config;
pub mod error;
pub mod report;
pub mod run;

pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use report::{RunReport, SeasonOutcome, SeasonStatus};
pub use run::{Assembled, Pipeline};
