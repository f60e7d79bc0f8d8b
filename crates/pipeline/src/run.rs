//! Season tables in, one persisted career timeline out.
//!
//! Each source is loaded, reduced and measured on its own; a broken or empty
//! table is recorded in the manifest and the run carries on. Only the timeline
//! accumulation is shared, and it happens after every source is done.

use std::collections::BTreeMap;

use analysis::{
    compute_race_metrics, group_sessions, reduce_session, LapFilter, RaceOutcome, ReviewFlag,
    SessionError, TeamOverlap, TimelineAccumulator,
};
use model::{CareerTimeline, QualifyingResult, SessionKey, TimelineDocument};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use timeline_io::{discover_seasons, write_timeline, LoadError, SeasonSource};
use uuid::Uuid;

use crate::{
    config::PipelineConfig,
    error::{PipelineError, Result},
    report::{RunReport, SeasonOutcome, SeasonStatus},
};

/// The in-memory product of a run, before anything is written.
#[derive(Debug, Clone)]
pub struct Assembled {
    pub run_id: Uuid,
    pub timeline: CareerTimeline,
    pub seasons: Vec<SeasonOutcome>,
    pub review_flags: Vec<ReviewFlag>,
}

enum SourceResult {
    Loaded { status: SeasonStatus, races: Vec<RaceOutcome> },
    Skipped(SeasonStatus),
    Fatal(SessionError),
}

pub struct Pipeline {
    cfg: PipelineConfig,
}

impl Pipeline {
    pub fn new(cfg: PipelineConfig) -> Result<Self> {
        cfg.validate()?;
        Ok(Self { cfg })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.cfg
    }

    /// Runs over every `*.csv` table in the configured input directory.
    pub fn run_dir(&self) -> Result<RunReport> {
        let sources = discover_seasons(&self.cfg.input_dir).map_err(PipelineError::Discover)?;
        tracing::info!(dir = %self.cfg.input_dir.display(), sources = sources.len(), "season tables found");
        self.run(&sources)
    }

    /// Assembles the timeline and atomically replaces the output artifact.
    pub fn run<S: SeasonSource>(&self, sources: &[S]) -> Result<RunReport> {
        let assembled = self.assemble(sources)?;
        let doc = TimelineDocument {
            run_id: assembled.run_id,
            generated_at: OffsetDateTime::now_utc().format(&Rfc3339)?,
            timeline: assembled.timeline,
        };
        write_timeline(&doc, &self.cfg.output_path)?;
        Ok(RunReport {
            run_id: assembled.run_id,
            output_path: self.cfg.output_path.clone(),
            drivers: doc.timeline.drivers.len(),
            races: doc.timeline.race_count(),
            seasons: assembled.seasons,
            review_flags: assembled.review_flags,
        })
    }

    pub fn assemble<S: SeasonSource>(&self, sources: &[S]) -> Result<Assembled> {
        let run_id = Uuid::new_v4();
        let _span = tracing::info_span!("pipeline", run_id = %run_id).entered();
        let filter = self.cfg.lap_filter;

        let results: Vec<SourceResult> = if self.cfg.parallel && sources.len() > 1 {
            let (tx, rx) = crossbeam_channel::unbounded();
            std::thread::scope(|scope| {
                for (i, src) in sources.iter().enumerate() {
                    let tx = tx.clone();
                    scope.spawn(move || {
                        let _ = tx.send((i, process_source(src, &filter)));
                    });
                }
            });
            drop(tx);
            let mut done: Vec<(usize, SourceResult)> = rx.iter().collect();
            done.sort_by_key(|(i, _)| *i);
            done.into_iter().map(|(_, r)| r).collect()
        } else {
            sources.iter().map(|src| process_source(src, &filter)).collect()
        };

        let mut acc = TimelineAccumulator::new();
        let mut seasons = Vec::with_capacity(sources.len());
        let mut review_flags = Vec::new();
        for (src, result) in sources.iter().zip(results) {
            let status = match result {
                SourceResult::Fatal(e) => {
                    tracing::error!(source = src.name(), error = %e, "aborting run");
                    return Err(e.into());
                }
                SourceResult::Skipped(status) => status,
                SourceResult::Loaded { status, races } => {
                    let mut flags = Vec::new();
                    let mut entries = Vec::new();
                    for race in races {
                        flags.extend(race.review_flags);
                        entries.extend(race.entries);
                    }
                    match acc.push_all(entries) {
                        Ok(()) => {
                            review_flags.extend(flags);
                            status
                        }
                        // another table already classified this result
                        Err(e) => {
                            tracing::error!(source = src.name(), error = %e, "season rejected");
                            SeasonStatus::Failed { reason: e.to_string() }
                        }
                    }
                }
            };
            seasons.push(SeasonOutcome { source: src.name().to_string(), status });
        }

        if !seasons.iter().any(SeasonOutcome::is_loaded) {
            tracing::error!(sources = seasons.len(), "no season produced results");
            return Err(PipelineError::NoSeasons { seasons });
        }

        let timeline = acc.finish(self.cfg.trend_tolerance_ms);
        tracing::info!(
            drivers = timeline.drivers.len(),
            races = timeline.race_count(),
            skipped_seasons = seasons.iter().filter(|s| !s.is_loaded()).count(),
            "timeline assembled"
        );
        Ok(Assembled { run_id, timeline, seasons, review_flags })
    }
}

fn process_source<S: SeasonSource + ?Sized>(src: &S, filter: &LapFilter) -> SourceResult {
    let name = src.name();
    let load = match src.load() {
        Ok(load) => load,
        Err(LoadError::EmptySeason { .. }) => {
            tracing::warn!(source = name, reason = "no loadable lap records", "season skipped");
            return SourceResult::Skipped(SeasonStatus::Empty);
        }
        Err(e) => {
            tracing::error!(source = name, error = %e, "season failed to load");
            return SourceResult::Skipped(SeasonStatus::Failed { reason: error_chain(&e) });
        }
    };
    let laps = load.records.len();

    let mut sessions: Vec<(SessionKey, Vec<QualifyingResult>)> = Vec::new();
    for (key, session_laps) in group_sessions(load.records) {
        match reduce_session(&key, &session_laps, filter) {
            Ok(results) => sessions.push((key, results)),
            Err(e) => return SourceResult::Fatal(e),
        }
    }

    // pairings only look at races of the same season
    let mut by_season: BTreeMap<u16, Vec<&[QualifyingResult]>> = BTreeMap::new();
    for (key, results) in &sessions {
        by_season.entry(key.season).or_default().push(results.as_slice());
    }
    let overlaps: BTreeMap<u16, TeamOverlap> = by_season
        .into_iter()
        .map(|(season, races)| (season, TeamOverlap::from_sessions(races)))
        .collect();

    let race_count = sessions.len();
    let no_overlap = TeamOverlap::default();
    let mut classified = 0;
    let mut races = Vec::with_capacity(race_count);
    for (key, results) in sessions {
        if results.is_empty() {
            tracing::warn!(source = name, season = key.season, race = %key.race, "race has no classified driver");
            continue;
        }
        classified += results.len();
        let overlap = overlaps.get(&key.season).unwrap_or(&no_overlap);
        races.push(compute_race_metrics(results, overlap));
    }

    if classified == 0 {
        tracing::warn!(source = name, laps, reason = "no classified results", "season skipped");
        return SourceResult::Skipped(SeasonStatus::Empty);
    }
    tracing::info!(source = name, laps, races = race_count, results = classified, skipped_rows = load.skipped.len(), "season processed");
    SourceResult::Loaded {
        status: SeasonStatus::Loaded {
            laps,
            races: race_count,
            results: classified,
            skipped_rows: load.skipped,
        },
        races,
    }
}

fn error_chain(e: &dyn std::error::Error) -> String {
    let mut out = e.to_string();
    let mut cur = e.source();
    while let Some(s) = cur {
        out.push_str(": ");
        out.push_str(&s.to_string());
        cur = s.source();
    }
    out
}
