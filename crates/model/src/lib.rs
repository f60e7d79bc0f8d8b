use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Identifies one qualifying session. Orders by season, then round.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionKey {
    pub season: u16,
    pub round: u32,
    pub race: String,
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct SpeedTraps {
    pub i1_kph: Option<f64>,
    pub i2_kph: Option<f64>,
    pub fl_kph: Option<f64>,
    pub st_kph: Option<f64>,
}

/// One timed lap attempt as read from a season table.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct LapRecord {
    pub season: u16,
    pub race: String,
    pub round: u32,
    pub driver: String,
    pub team: String,
    pub lap_number: u32,
    /// `None` when the lap was not completed ("no time").
    pub lap_time_ms: Option<u64>,
    pub sectors_ms: [Option<u64>; 3],
    pub speeds: SpeedTraps,
    pub compound: Option<String>,
    pub stint: Option<u32>,
    pub personal_best: bool,
    /// Session time at which the lap was completed.
    pub completed_at_ms: Option<u64>,
    pub deleted: Option<bool>,
    pub track_status: Option<String>,
    pub accurate: Option<bool>,
    pub wet_session: Option<bool>,
}

impl LapRecord {
    pub fn session_key(&self) -> SessionKey {
        SessionKey { season: self.season, round: self.round, race: self.race.clone() }
    }
}

/// The classified outcome of one driver in one qualifying session.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct QualifyingResult {
    pub season: u16,
    pub race: String,
    pub round: u32,
    pub driver: String,
    pub team: String,
    pub position: u32,
    pub best_lap_ms: u64,
    pub lap_number: u32,
    pub completed_at_ms: Option<u64>,
    pub sectors_ms: [Option<u64>; 3],
    pub speeds: SpeedTraps,
    pub compound: Option<String>,
    pub stint: Option<u32>,
    pub personal_best: bool,
    pub wet_session: bool,
}

impl QualifyingResult {
    pub fn session_key(&self) -> SessionKey {
        SessionKey { season: self.season, round: self.round, race: self.race.clone() }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct RaceMetrics {
    pub pole_ms: u64,
    pub gap_to_pole_ms: u64,
    pub teammate: Option<String>,
    /// Own best minus teammate's best. Negative means the driver was quicker.
    pub teammate_delta_ms: Option<i64>,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct RaceEntry {
    pub result: QualifyingResult,
    pub metrics: RaceMetrics,
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Improved,
    Declined,
    Unchanged,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct SeasonRecord {
    pub season: u16,
    /// Ordered by the first race driven for each team.
    pub teams: Vec<String>,
    pub best_position: u32,
    pub best_position_race: String,
    pub mean_gap_to_pole_ms: f64,
    pub teammate_beats: u32,
    pub trend: Option<Trend>,
    pub avg_position: f64,
    pub avg_teammate_delta_ms: Option<f64>,
    pub teammate_comparisons: u32,
    pub data_completeness: f64,
    #[serde(default)]
    pub races: Vec<RaceEntry>,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct CareerTimeline {
    #[serde(default)]
    pub drivers: BTreeMap<String, Vec<SeasonRecord>>,
}

impl CareerTimeline {
    pub fn driver(&self, id: &str) -> Option<&[SeasonRecord]> {
        self.drivers.get(id).map(Vec::as_slice)
    }

    pub fn season(&self, id: &str, season: u16) -> Option<&SeasonRecord> {
        self.driver(id)?.iter().find(|s| s.season == season)
    }

    pub fn race_count(&self) -> usize {
        self.drivers.values().flatten().map(|s| s.races.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }
}

/// The persisted artifact: a timeline plus the run that produced it.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct TimelineDocument {
    #[serde(with = "uuid::serde::simple")]
    pub run_id: Uuid,
    pub generated_at: String,
    pub timeline: CareerTimeline,
}
