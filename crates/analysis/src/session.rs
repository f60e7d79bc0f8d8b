//! Reduces the laps of one qualifying session to one classified result per driver.

use std::collections::{BTreeMap, HashSet};

use model::*;
use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// Which laps count towards a classification, beyond having a time at all.
/// Each rule only applies when the table carried the corresponding column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LapFilter {
    pub drop_deleted: bool,
    pub require_green_track: bool,
    pub require_accurate: bool,
}

impl Default for LapFilter {
    fn default() -> Self {
        Self { drop_deleted: true, require_green_track: true, require_accurate: true }
    }
}

impl LapFilter {
    /// Why a lap cannot be a qualifying time, or `None` if it can.
    pub fn rejects(&self, lap: &LapRecord) -> Option<&'static str> {
        if lap.lap_time_ms.is_none() {
            return Some("no time");
        }
        if self.drop_deleted && lap.deleted == Some(true) {
            return Some("deleted");
        }
        if self.require_green_track {
            if let Some(status) = &lap.track_status {
                if status != "1" {
                    return Some("track not green");
                }
            }
        }
        if self.require_accurate && lap.accurate == Some(false) {
            return Some("inaccurate timing");
        }
        None
    }
}

/// Splits loaded laps into sessions. Laps keep their table order inside a session.
pub fn group_sessions(records: Vec<LapRecord>) -> BTreeMap<SessionKey, Vec<LapRecord>> {
    let mut sessions: BTreeMap<SessionKey, Vec<LapRecord>> = BTreeMap::new();
    for r in records {
        sessions.entry(r.session_key()).or_default().push(r);
    }
    sessions
}

// Earlier in the session wins; laps without a session time sort after those with one.
fn achieved_key(completed_at_ms: Option<u64>, lap_number: u32) -> (bool, u64, u32) {
    (completed_at_ms.is_none(), completed_at_ms.unwrap_or(0), lap_number)
}

/// Classifies every driver that set at least one valid lap in `key`'s session.
///
/// Results come back in position order, positions running 1..=N.
pub fn reduce_session(
    key: &SessionKey,
    laps: &[LapRecord],
    filter: &LapFilter,
) -> Result<Vec<QualifyingResult>, SessionError> {
    let mut by_driver: BTreeMap<&str, Vec<&LapRecord>> = BTreeMap::new();
    for lap in laps {
        if lap.season != key.season || lap.race != key.race {
            return Err(SessionError::ForeignLap {
                season: key.season,
                race: key.race.clone(),
                driver: lap.driver.clone(),
                found_season: lap.season,
                found_race: lap.race.clone(),
            });
        }
        by_driver.entry(lap.driver.as_str()).or_default().push(lap);
    }
    let wet_session = laps.iter().any(|l| l.wet_session == Some(true));

    let mut results = Vec::with_capacity(by_driver.len());
    for (driver, driver_laps) in by_driver {
        let best = driver_laps
            .iter()
            .copied()
            .filter(|lap| match filter.rejects(lap) {
                Some(reason) => {
                    tracing::debug!(
                        season = key.season,
                        race = %key.race,
                        driver,
                        lap = lap.lap_number,
                        reason,
                        "lap not counted"
                    );
                    false
                }
                None => true,
            })
            .filter_map(|lap| lap.lap_time_ms.map(|t| (t, lap)))
            .min_by_key(|(t, lap)| (*t, achieved_key(lap.completed_at_ms, lap.lap_number)));

        let Some((best_lap_ms, lap)) = best else {
            tracing::info!(
                season = key.season,
                race = %key.race,
                driver,
                laps = driver_laps.len(),
                reason = "no valid lap",
                "driver not classified"
            );
            continue;
        };
        results.push(QualifyingResult {
            season: key.season,
            race: key.race.clone(),
            round: key.round,
            driver: driver.to_string(),
            team: lap.team.clone(),
            position: 0,
            best_lap_ms,
            lap_number: lap.lap_number,
            completed_at_ms: lap.completed_at_ms,
            sectors_ms: lap.sectors_ms,
            speeds: lap.speeds,
            compound: lap.compound.clone(),
            stint: lap.stint,
            personal_best: lap.personal_best,
            wet_session,
        });
    }

    results.sort_by(|a, b| {
        let ka = (a.best_lap_ms, achieved_key(a.completed_at_ms, a.lap_number));
        let kb = (b.best_lap_ms, achieved_key(b.completed_at_ms, b.lap_number));
        ka.cmp(&kb).then_with(|| a.driver.cmp(&b.driver))
    });

    let mut seen = HashSet::with_capacity(results.len());
    for (i, r) in results.iter_mut().enumerate() {
        if !seen.insert(r.driver.clone()) {
            return Err(SessionError::DuplicateDriver {
                season: key.season,
                race: key.race.clone(),
                driver: r.driver.clone(),
            });
        }
        r.position = (i + 1) as u32;
    }
    Ok(results)
}
