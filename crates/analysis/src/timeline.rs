//! Assembles per-driver career timelines from race entries.

use std::collections::{BTreeMap, HashSet};

use model::*;

use crate::error::SessionError;

pub const DEFAULT_TREND_TOLERANCE_MS: f64 = 1.0;

/// Collects race entries keyed by driver and season. Nothing is sorted or
/// aggregated until [`TimelineAccumulator::finish`].
#[derive(Debug, Default)]
pub struct TimelineAccumulator {
    drivers: BTreeMap<String, BTreeMap<u16, Vec<RaceEntry>>>,
    seen: HashSet<(u16, String, String)>,
}

impl TimelineAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: RaceEntry) -> Result<(), SessionError> {
        let r = &entry.result;
        if !self.seen.insert(entry_key(r)) {
            return Err(duplicate(r));
        }
        self.drivers
            .entry(r.driver.clone())
            .or_default()
            .entry(r.season)
            .or_default()
            .push(entry);
        Ok(())
    }

    /// Adds every entry, or none of them if any would be a duplicate.
    pub fn push_all(&mut self, entries: Vec<RaceEntry>) -> Result<(), SessionError> {
        let mut batch = HashSet::with_capacity(entries.len());
        for e in &entries {
            let key = entry_key(&e.result);
            if self.seen.contains(&key) || !batch.insert(key) {
                return Err(duplicate(&e.result));
            }
        }
        for e in entries {
            self.push(e)?;
        }
        Ok(())
    }

    /// Sorts and aggregates every season. A season's trend is measured
    /// against the driver's previous recorded season, which is not
    /// necessarily the previous calendar year.
    pub fn finish(self, trend_tolerance_ms: f64) -> CareerTimeline {
        let drivers = self
            .drivers
            .into_iter()
            .map(|(driver, seasons)| {
                let mut records: Vec<SeasonRecord> = seasons
                    .into_iter()
                    .map(|(season, races)| summarize_season(season, races))
                    .collect();
                for i in 1..records.len() {
                    let prev = records[i - 1].mean_gap_to_pole_ms;
                    let cur = records[i].mean_gap_to_pole_ms;
                    records[i].trend = Some(trend(prev, cur, trend_tolerance_ms));
                }
                (driver, records)
            })
            .collect();
        CareerTimeline { drivers }
    }
}

fn entry_key(r: &QualifyingResult) -> (u16, String, String) {
    (r.season, r.race.clone(), r.driver.clone())
}

fn duplicate(r: &QualifyingResult) -> SessionError {
    SessionError::DuplicateDriver {
        season: r.season,
        race: r.race.clone(),
        driver: r.driver.clone(),
    }
}

pub fn build_timeline<I>(entries: I, trend_tolerance_ms: f64) -> Result<CareerTimeline, SessionError>
where
    I: IntoIterator<Item = RaceEntry>,
{
    let mut acc = TimelineAccumulator::new();
    for e in entries {
        acc.push(e)?;
    }
    Ok(acc.finish(trend_tolerance_ms))
}

/// Compares mean gap to pole against the previous season. Lower is better.
pub fn trend(previous_mean_ms: f64, current_mean_ms: f64, tolerance_ms: f64) -> Trend {
    let diff = current_mean_ms - previous_mean_ms;
    if diff.abs() <= tolerance_ms {
        Trend::Unchanged
    } else if diff < 0.0 {
        Trend::Improved
    } else {
        Trend::Declined
    }
}

fn mean(sum: f64, n: usize) -> f64 {
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

// `races` is non-empty: a season only exists once a race has been pushed for it.
fn summarize_season(season: u16, mut races: Vec<RaceEntry>) -> SeasonRecord {
    races.sort_by(|a, b| {
        (a.result.round, &a.result.race).cmp(&(b.result.round, &b.result.race))
    });

    let mut teams: Vec<String> = Vec::new();
    for e in &races {
        if !teams.contains(&e.result.team) {
            teams.push(e.result.team.clone());
        }
    }

    let mut best: Option<&RaceEntry> = None;
    for e in &races {
        if best.map_or(true, |b| e.result.position < b.result.position) {
            best = Some(e);
        }
    }
    let (best_position, best_position_race) = best
        .map(|b| (b.result.position, b.result.race.clone()))
        .unwrap_or_default();

    let n = races.len();
    let gap_sum: f64 = races.iter().map(|e| e.metrics.gap_to_pole_ms as f64).sum();
    let pos_sum: f64 = races.iter().map(|e| e.result.position as f64).sum();
    let deltas: Vec<i64> = races.iter().filter_map(|e| e.metrics.teammate_delta_ms).collect();
    let teammate_beats = deltas.iter().filter(|d| **d < 0).count() as u32;
    let avg_teammate_delta_ms = (!deltas.is_empty())
        .then(|| mean(deltas.iter().map(|d| *d as f64).sum(), deltas.len()));

    SeasonRecord {
        season,
        teams,
        best_position,
        best_position_race,
        mean_gap_to_pole_ms: mean(gap_sum, n),
        teammate_beats,
        trend: None,
        avg_position: mean(pos_sum, n),
        avg_teammate_delta_ms,
        teammate_comparisons: deltas.len() as u32,
        data_completeness: mean(deltas.len() as f64, n),
        races,
    }
}
