//! The derivation pipeline: laps -> classified results -> race metrics -> timeline.

pub mod error;
pub mod metrics;
pub mod session;
pub mod timeline;

pub use error::SessionError;
pub use metrics::{compute_race_metrics, gap_to_pole, pole_time, teammate_delta, RaceOutcome, ReviewFlag, TeamOverlap};
pub use session::{group_sessions, reduce_session, LapFilter};
pub use timeline::{build_timeline, trend, TimelineAccumulator, DEFAULT_TREND_TOLERANCE_MS};
