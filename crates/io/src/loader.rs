//! Season table reader.
//!
//! One CSV table per season, one row per lap attempt. Column names follow the
//! timing provider's lap table. Races are numbered either from an explicit
//! `RoundNumber` column or, when it is absent, by first appearance in the file;
//! rows are never re-sorted.

use std::{
    collections::{hash_map::Entry, HashMap},
    fs::File,
    io::Read,
    path::{Path, PathBuf},
};

use model::{LapRecord, SpeedTraps};

use crate::error::{LoadError, MalformedRecord, Result};

pub const REQUIRED_COLUMNS: [&str; 16] = [
    "Year",
    "EventName",
    "Driver",
    "Team",
    "LapNumber",
    "LapTime",
    "Sector1Time",
    "Sector2Time",
    "Sector3Time",
    "SpeedI1",
    "SpeedI2",
    "SpeedFL",
    "SpeedST",
    "Compound",
    "Stint",
    "IsPersonalBest",
];

const NO_TIME: [&str; 5] = ["nat", "nan", "none", "null", "-"];

// Times must survive signed subtraction downstream.
const MAX_DURATION_MS: u64 = i64::MAX as u64;

/// Anything that can hand over the lap records of one season table.
pub trait SeasonSource: Send + Sync {
    fn name(&self) -> &str;
    fn load(&self) -> Result<SeasonLoad>;
}

#[derive(Debug, Clone)]
pub struct SeasonLoad {
    pub source_name: String,
    pub records: Vec<LapRecord>,
    pub skipped: Vec<MalformedRecord>,
}

#[derive(Debug, Clone)]
pub struct CsvFileSource {
    path: PathBuf,
    name: String,
}

impl CsvFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self { path, name }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SeasonSource for CsvFileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn load(&self) -> Result<SeasonLoad> {
        let f = File::open(&self.path).map_err(|source| LoadError::Open {
            path: self.path.clone(),
            source,
        })?;
        load_season(SeasonReader::new(&self.name, f)?)
    }
}

/// An in-memory table, for callers that already hold the bytes.
#[derive(Debug, Clone)]
pub struct CsvTextSource {
    name: String,
    text: String,
}

impl CsvTextSource {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self { name: name.into(), text: text.into() }
    }
}

impl SeasonSource for CsvTextSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn load(&self) -> Result<SeasonLoad> {
        load_season(SeasonReader::new(&self.name, self.text.as_bytes())?)
    }
}

/// Lists the `*.csv` tables in `dir`, sorted by file name.
pub fn discover_seasons(dir: &Path) -> Result<Vec<CsvFileSource>> {
    let open_err = |source| LoadError::Open { path: dir.to_path_buf(), source };
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(open_err)? {
        let path = entry.map_err(open_err)?.path();
        let is_csv = path
            .extension()
            .map(|e| e.eq_ignore_ascii_case("csv"))
            .unwrap_or(false);
        if is_csv && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths.into_iter().map(CsvFileSource::new).collect())
}

/// Drains a reader, skipping (and logging) malformed rows, then settles the
/// round of every race.
pub fn load_season<R: Read>(mut reader: SeasonReader<R>) -> Result<SeasonLoad> {
    let source_name = reader.source_name.clone();
    let mut records = Vec::new();
    let mut skipped = Vec::new();
    for item in reader.by_ref() {
        match item {
            Ok(rec) => records.push(rec),
            Err(LoadError::Malformed { record, .. }) => {
                tracing::warn!(
                    source = %source_name,
                    line = record.line,
                    season = ?record.season,
                    race = ?record.race,
                    driver = ?record.driver,
                    field = %record.field,
                    value = %record.value,
                    "skipping malformed lap record"
                );
                skipped.push(record);
            }
            Err(e) => return Err(e),
        }
    }
    if records.is_empty() {
        return Err(LoadError::EmptySeason { source_name });
    }
    reader.settle_rounds(&mut records);
    tracing::debug!(source = %source_name, laps = records.len(), skipped = skipped.len(), "season table loaded");
    Ok(SeasonLoad { source_name, records, skipped })
}

#[derive(Debug)]
struct Columns {
    required: [usize; 16],
    completed_at: Option<usize>,
    round: Option<usize>,
    deleted: Option<usize>,
    track_status: Option<usize>,
    accurate: Option<usize>,
    wet: Option<usize>,
}

impl Columns {
    fn resolve(source_name: &str, headers: &csv::StringRecord) -> Result<Self> {
        let find = |name: &str| headers.iter().position(|h| h.trim() == name);
        let mut required = [0usize; 16];
        let mut missing = Vec::new();
        for (slot, name) in required.iter_mut().zip(REQUIRED_COLUMNS) {
            match find(name) {
                Some(i) => *slot = i,
                None => missing.push(name.to_string()),
            }
        }
        if !missing.is_empty() {
            return Err(LoadError::Schema { source_name: source_name.to_string(), missing });
        }
        Ok(Self {
            required,
            completed_at: find("LapCompletionTime").or_else(|| find("Time")),
            round: find("RoundNumber"),
            deleted: find("Deleted"),
            track_status: find("TrackStatus"),
            accurate: find("IsAccurate"),
            wet: find("WetSession"),
        })
    }
}

/// Lazily yields the lap records of one season table.
///
/// Construction validates the header; iteration yields `LoadError::Malformed`
/// for rows that should be skipped and any other error for a broken table.
///
/// With a `RoundNumber` column, a row whose cell is blank takes the round
/// already recorded for its race. Rows read before their race's first explicit
/// round carry a provisional number until [`SeasonReader::settle_rounds`].
pub struct SeasonReader<R: Read> {
    source_name: String,
    rdr: csv::Reader<R>,
    cols: Columns,
    // first-appearance number per race
    rounds: HashMap<(u16, String), u32>,
    races_seen: HashMap<u16, u32>,
    explicit_rounds: HashMap<(u16, String), u32>,
    row: csv::StringRecord,
    done: bool,
}

impl<R: Read> SeasonReader<R> {
    pub fn new(source_name: &str, reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        let headers = rdr.headers().map_err(|source| LoadError::Csv {
            source_name: source_name.to_string(),
            source,
        })?;
        let cols = Columns::resolve(source_name, headers)?;
        Ok(Self {
            source_name: source_name.to_string(),
            rdr,
            cols,
            rounds: HashMap::new(),
            races_seen: HashMap::new(),
            explicit_rounds: HashMap::new(),
            row: csv::StringRecord::new(),
            done: false,
        })
    }

    fn parse_row(&mut self) -> std::result::Result<LapRecord, MalformedRecord> {
        let line = self.row.position().map(|p| p.line()).unwrap_or(0);
        let row = &self.row;
        let cols = &self.cols;
        let cell = |i: usize| row.get(i).unwrap_or("").trim();
        let req = |k: usize| cell(cols.required[k]);

        let mut bad = MalformedRecord {
            line,
            season: None,
            race: None,
            driver: None,
            field: String::new(),
            value: String::new(),
        };
        let fail = |bad: &mut MalformedRecord, k: usize| {
            bad.field = REQUIRED_COLUMNS[k].to_string();
            bad.value = req(k).to_string();
            bad.clone()
        };

        bad.race = text(req(1));
        bad.driver = text(req(2));
        let season = match parse_count(req(0)) {
            Ok(Some(y)) if y <= u16::MAX as u64 => y as u16,
            _ => return Err(fail(&mut bad, 0)),
        };
        bad.season = Some(season);
        let Some(race) = bad.race.clone() else { return Err(fail(&mut bad, 1)) };
        let Some(driver) = bad.driver.clone() else { return Err(fail(&mut bad, 2)) };
        let Some(team) = text(req(3)) else { return Err(fail(&mut bad, 3)) };
        let lap_number = match parse_count(req(4)) {
            Ok(Some(n)) if n <= u32::MAX as u64 => n as u32,
            _ => return Err(fail(&mut bad, 4)),
        };
        let lap_time_ms = parse_duration_ms(req(5)).map_err(|_| fail(&mut bad, 5))?;
        let mut sectors_ms = [None; 3];
        for (i, s) in sectors_ms.iter_mut().enumerate() {
            *s = parse_duration_ms(req(6 + i)).map_err(|_| fail(&mut bad, 6 + i))?;
        }
        let mut speed = [None; 4];
        for (i, s) in speed.iter_mut().enumerate() {
            *s = parse_speed(req(9 + i)).map_err(|_| fail(&mut bad, 9 + i))?;
        }
        let stint = match parse_count(req(14)) {
            Ok(n) => n.map(|n| n as u32),
            Err(_) => return Err(fail(&mut bad, 14)),
        };
        let personal_best = parse_flag(req(15)).map_err(|_| fail(&mut bad, 15))?.unwrap_or(false);

        let optional = |idx: Option<usize>, name: &str, bad: &mut MalformedRecord| {
            let v = idx.map(cell).unwrap_or("");
            bad.field = name.to_string();
            bad.value = v.to_string();
            v
        };
        let completed_at_ms = {
            let v = optional(cols.completed_at, "LapCompletionTime", &mut bad);
            parse_duration_ms(v).map_err(|_| bad.clone())?
        };
        let deleted = {
            let v = optional(cols.deleted, "Deleted", &mut bad);
            parse_flag(v).map_err(|_| bad.clone())?
        };
        let accurate = {
            let v = optional(cols.accurate, "IsAccurate", &mut bad);
            parse_flag(v).map_err(|_| bad.clone())?
        };
        let wet_session = {
            let v = optional(cols.wet, "WetSession", &mut bad);
            parse_flag(v).map_err(|_| bad.clone())?
        };
        let track_status = cols.track_status.map(cell).and_then(text).map(normalize_status);
        let explicit_round = {
            let v = optional(cols.round, "RoundNumber", &mut bad);
            match parse_count(v) {
                Ok(n) if n.map_or(true, |n| n <= u32::MAX as u64) => n.map(|n| n as u32),
                _ => return Err(bad.clone()),
            }
        };

        let seen = self.races_seen.entry(season).or_insert(0);
        let appearance = *self.rounds.entry((season, race.clone())).or_insert_with(|| {
            *seen += 1;
            *seen
        });
        let round = match (explicit_round, self.explicit_rounds.entry((season, race.clone()))) {
            (Some(r), Entry::Occupied(e)) if *e.get() != r => return Err(bad),
            (Some(r), Entry::Occupied(_)) => r,
            (Some(r), Entry::Vacant(e)) => *e.insert(r),
            (None, Entry::Occupied(e)) => *e.get(),
            (None, Entry::Vacant(_)) => appearance,
        };

        Ok(LapRecord {
            season,
            race,
            round,
            driver,
            team,
            lap_number,
            lap_time_ms,
            sectors_ms,
            speeds: SpeedTraps {
                i1_kph: speed[0],
                i2_kph: speed[1],
                fl_kph: speed[2],
                st_kph: speed[3],
            },
            compound: text(req(13)),
            stint,
            personal_best,
            completed_at_ms,
            deleted,
            track_status,
            accurate,
            wet_session,
        })
    }
}

impl<R: Read> SeasonReader<R> {
    /// Gives every record of a race the same round once the table is read.
    ///
    /// Without a `RoundNumber` column first-appearance numbering is already
    /// final. With one, races take their explicit round; races that never
    /// carried one are numbered after the season's highest explicit round,
    /// in order of first appearance.
    pub fn settle_rounds(&self, records: &mut [LapRecord]) {
        if self.cols.round.is_none() {
            return;
        }
        let mut last: HashMap<u16, u32> = HashMap::new();
        for ((season, _), r) in &self.explicit_rounds {
            let m = last.entry(*season).or_insert(0);
            *m = (*m).max(*r);
        }
        let mut implicit: HashMap<(u16, String), u32> = HashMap::new();
        for rec in records.iter_mut() {
            let key = (rec.season, rec.race.clone());
            rec.round = match self.explicit_rounds.get(&key) {
                Some(r) => *r,
                None => {
                    let next = last.entry(rec.season).or_insert(0);
                    *implicit.entry(key).or_insert_with(|| {
                        *next = next.saturating_add(1);
                        *next
                    })
                }
            };
        }
    }
}

impl<R: Read> Iterator for SeasonReader<R> {
    type Item = Result<LapRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.rdr.read_record(&mut self.row) {
            Ok(true) => Some(self.parse_row().map_err(|record| LoadError::Malformed {
                source_name: self.source_name.clone(),
                record,
            })),
            Ok(false) => {
                self.done = true;
                None
            }
            Err(e) if e.is_io_error() => {
                self.done = true;
                Some(Err(LoadError::Csv { source_name: self.source_name.clone(), source: e }))
            }
            Err(e) => {
                let line = e.position().map(|p| p.line()).unwrap_or(0);
                Some(Err(LoadError::Malformed {
                    source_name: self.source_name.clone(),
                    record: MalformedRecord {
                        line,
                        season: None,
                        race: None,
                        driver: None,
                        field: "<row>".into(),
                        value: e.to_string(),
                    },
                }))
            }
        }
    }
}

fn text(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

fn is_missing(s: &str) -> bool {
    s.is_empty() || NO_TIME.iter().any(|m| s.eq_ignore_ascii_case(m))
}

// "1.0" -> "1"
fn normalize_status(s: String) -> String {
    match s.strip_suffix(".0") {
        Some(head) if !head.is_empty() && head.bytes().all(|b| b.is_ascii_digit()) => head.to_string(),
        _ => s,
    }
}

/// Parses `0 days 00:01:20.123000`, `00:01:20.123`, `1:20.123` or `80.123`
/// into whole milliseconds. Empty and NaT-like cells are `Ok(None)`.
pub(crate) fn parse_duration_ms(s: &str) -> std::result::Result<Option<u64>, ()> {
    let s = s.trim();
    if is_missing(s) {
        return Ok(None);
    }
    let (days, clock) = match s.split_once("days") {
        Some((d, rest)) => (d.trim().parse::<u64>().map_err(|_| ())?, rest.trim()),
        None => match s.split_once("day") {
            Some((d, rest)) => (d.trim().parse::<u64>().map_err(|_| ())?, rest.trim()),
            None => (0, s),
        },
    };
    let parts: Vec<&str> = clock.split(':').collect();
    if parts.is_empty() || parts.len() > 3 {
        return Err(());
    }
    let (units, secs) = parts.split_at(parts.len() - 1);
    let secs: f64 = secs[0].trim().parse().map_err(|_| ())?;
    if !secs.is_finite() || secs < 0.0 {
        return Err(());
    }
    let frac_ms = (secs * 1_000.0).round();
    if frac_ms >= MAX_DURATION_MS as f64 {
        return Err(());
    }
    let mut whole_secs = days.checked_mul(86_400).ok_or(())?;
    for (unit, scale) in units.iter().rev().zip([60u64, 3_600]) {
        let v: u64 = unit.trim().parse().map_err(|_| ())?;
        whole_secs = v.checked_mul(scale).and_then(|v| whole_secs.checked_add(v)).ok_or(())?;
    }
    let ms = whole_secs
        .checked_mul(1_000)
        .and_then(|ms| ms.checked_add(frac_ms as u64))
        .filter(|ms| *ms <= MAX_DURATION_MS)
        .ok_or(())?;
    Ok(Some(ms))
}

/// Non-negative integer, accepting the float spelling (`3.0`) pandas writes.
pub(crate) fn parse_count(s: &str) -> std::result::Result<Option<u64>, ()> {
    let s = s.trim();
    if is_missing(s) {
        return Ok(None);
    }
    if let Ok(v) = s.parse::<u64>() {
        return Ok(Some(v));
    }
    let f: f64 = s.parse().map_err(|_| ())?;
    if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 {
        Ok(Some(f as u64))
    } else {
        Err(())
    }
}

pub(crate) fn parse_speed(s: &str) -> std::result::Result<Option<f64>, ()> {
    let s = s.trim();
    if is_missing(s) {
        return Ok(None);
    }
    match s.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => Ok(Some(v)),
        _ => Err(()),
    }
}

pub(crate) fn parse_flag(s: &str) -> std::result::Result<Option<bool>, ()> {
    let s = s.trim();
    if is_missing(s) {
        return Ok(None);
    }
    match s.to_ascii_lowercase().as_str() {
        "true" | "1" | "1.0" | "yes" => Ok(Some(true)),
        "false" | "0" | "0.0" | "no" => Ok(Some(false)),
        _ => Err(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "Year,EventName,Driver,Team,LapNumber,LapTime,Sector1Time,Sector2Time,Sector3Time,SpeedI1,SpeedI2,SpeedFL,SpeedST,Compound,Stint,IsPersonalBest";

    fn create_test_table(rows: &[&str]) -> String {
        let mut s = String::from(HEADER);
        for r in rows {
            s.push('\n');
            s.push_str(r);
        }
        s
    }

    fn read_all(text: &str) -> Vec<Result<LapRecord>> {
        SeasonReader::new("test.csv", text.as_bytes()).unwrap().collect()
    }

    #[test]
    fn test_parse_duration_formats() {
        assert_eq!(parse_duration_ms("0 days 00:01:20.123000"), Ok(Some(80_123)));
        assert_eq!(parse_duration_ms("00:01:20.123"), Ok(Some(80_123)));
        assert_eq!(parse_duration_ms("1:20.123"), Ok(Some(80_123)));
        assert_eq!(parse_duration_ms("80.1236"), Ok(Some(80_124)));
        assert_eq!(parse_duration_ms("1 day 00:00:00"), Ok(Some(86_400_000)));
        assert_eq!(parse_duration_ms(""), Ok(None));
        assert_eq!(parse_duration_ms("NaT"), Ok(None));
        assert!(parse_duration_ms("fast").is_err());
        assert!(parse_duration_ms("1:2:3:4").is_err());
        assert!(parse_duration_ms("-1.0").is_err());
    }

    #[test]
    fn test_parse_duration_rejects_overflow() {
        assert!(parse_duration_ms("1e300").is_err());
        assert!(parse_duration_ms("1:1e300").is_err());
        assert!(parse_duration_ms("999999999999999999 days 00:00:01").is_err());
        assert!(parse_duration_ms("18446744073709551615:00").is_err());
        assert!(parse_duration_ms("9223372036854776").is_err());
        assert_eq!(parse_duration_ms("106751 days 00:00:00"), Ok(Some(9_223_286_400_000)));
    }

    #[test]
    fn test_overflowing_lap_time_is_skipped() {
        let t = create_test_table(&[
            "2023,Bahrain,VER,Red Bull,1,1e300,,,,,,,,SOFT,1,False",
            "2023,Bahrain,PER,Red Bull,1,1:30.000,,,,,,,,SOFT,1,False",
        ]);
        let load = load_season(SeasonReader::new("s.csv", t.as_bytes()).unwrap()).unwrap();
        assert_eq!(load.records.len(), 1);
        assert_eq!(load.skipped[0].field, "LapTime");
        assert_eq!(load.skipped[0].value, "1e300");
    }

    #[test]
    fn test_parse_scalars() {
        assert_eq!(parse_count("3.0"), Ok(Some(3)));
        assert_eq!(parse_count("12"), Ok(Some(12)));
        assert!(parse_count("2.5").is_err());
        assert_eq!(parse_flag("True"), Ok(Some(true)));
        assert_eq!(parse_flag("false"), Ok(Some(false)));
        assert_eq!(parse_flag(""), Ok(None));
        assert!(parse_flag("maybe").is_err());
        assert_eq!(parse_speed("NaN"), Ok(None));
        assert_eq!(parse_speed("301.5"), Ok(Some(301.5)));
    }

    #[test]
    fn test_reads_typed_records() {
        let t = create_test_table(&[
            "2023,Bahrain Grand Prix,VER,Red Bull Racing,3.0,0 days 00:01:29.708000,0 days 00:00:28.500000,0 days 00:00:38.100000,0 days 00:00:23.108000,231.0,250.0,280.5,305.0,SOFT,1.0,True",
        ]);
        let recs = read_all(&t);
        assert_eq!(recs.len(), 1);
        let r = recs[0].as_ref().unwrap();
        assert_eq!(r.season, 2023);
        assert_eq!(r.race, "Bahrain Grand Prix");
        assert_eq!(r.round, 1);
        assert_eq!(r.lap_number, 3);
        assert_eq!(r.lap_time_ms, Some(89_708));
        assert_eq!(r.sectors_ms, [Some(28_500), Some(38_100), Some(23_108)]);
        assert_eq!(r.speeds.st_kph, Some(305.0));
        assert_eq!(r.compound.as_deref(), Some("SOFT"));
        assert_eq!(r.stint, Some(1));
        assert!(r.personal_best);
        assert_eq!(r.deleted, None);
    }

    #[test]
    fn test_missing_columns_is_schema_error() {
        let text = "Year,EventName,Team\n2023,Bahrain,Ferrari";
        match SeasonReader::new("bad.csv", text.as_bytes()) {
            Err(LoadError::Schema { missing, .. }) => {
                assert!(missing.contains(&"Driver".to_string()));
                assert!(missing.contains(&"LapTime".to_string()));
                assert!(!missing.contains(&"Team".to_string()));
            }
            other => panic!("expected schema error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_malformed_row_is_skipped() {
        let t = create_test_table(&[
            "2023,Bahrain,VER,Red Bull,1,fast,,,,,,,,SOFT,1,False",
            "2023,Bahrain,PER,Red Bull,1,1:30.000,,,,,,,,SOFT,1,False",
        ]);
        let load = load_season(SeasonReader::new("s.csv", t.as_bytes()).unwrap()).unwrap();
        assert_eq!(load.records.len(), 1);
        assert_eq!(load.records[0].driver, "PER");
        assert_eq!(load.skipped.len(), 1);
        let bad = &load.skipped[0];
        assert_eq!(bad.field, "LapTime");
        assert_eq!(bad.value, "fast");
        assert_eq!(bad.driver.as_deref(), Some("VER"));
        assert_eq!(bad.season, Some(2023));
        assert_eq!(bad.line, 2);
    }

    #[test]
    fn test_empty_season() {
        let t = create_test_table(&[]);
        let err = load_season(SeasonReader::new("empty.csv", t.as_bytes()).unwrap()).unwrap_err();
        assert!(matches!(err, LoadError::EmptySeason { .. }));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_no_time_lap_is_kept() {
        let t = create_test_table(&["2023,Bahrain,SAR,Williams,2,,,,,,,,,SOFT,1,False"]);
        let recs = read_all(&t);
        assert_eq!(recs[0].as_ref().unwrap().lap_time_ms, None);
    }

    #[test]
    fn test_rounds_follow_first_appearance() {
        let t = create_test_table(&[
            "2023,Bahrain,VER,Red Bull,1,1:30.0,,,,,,,,SOFT,1,False",
            "2023,Jeddah,VER,Red Bull,1,1:28.0,,,,,,,,SOFT,1,False",
            "2023,Bahrain,PER,Red Bull,1,1:31.0,,,,,,,,SOFT,1,False",
            "2024,Bahrain,VER,Red Bull,1,1:29.0,,,,,,,,SOFT,1,False",
        ]);
        let rounds: Vec<(u16, u32)> = read_all(&t)
            .into_iter()
            .map(|r| r.unwrap())
            .map(|r| (r.season, r.round))
            .collect();
        assert_eq!(rounds, vec![(2023, 1), (2023, 2), (2023, 1), (2024, 1)]);
    }

    #[test]
    fn test_explicit_round_and_optional_columns() {
        let t = format!(
            "{HEADER},RoundNumber,Time,Deleted,TrackStatus,IsAccurate,WetSession\n\
             2023,Monaco,LEC,Ferrari,5,1:11.365,,,,,,,,SOFT,3,True,6,0 days 00:41:02.000,False,1.0,True,True"
        );
        let recs = read_all(&t);
        let r = recs[0].as_ref().unwrap();
        assert_eq!(r.round, 6);
        assert_eq!(r.completed_at_ms, Some(2_462_000));
        assert_eq!(r.deleted, Some(false));
        assert_eq!(r.track_status.as_deref(), Some("1"));
        assert_eq!(r.accurate, Some(true));
        assert_eq!(r.wet_session, Some(true));
    }

    fn round_table(rows: &[&str]) -> String {
        let mut s = format!("{HEADER},RoundNumber");
        for r in rows {
            s.push('\n');
            s.push_str(r);
        }
        s
    }

    fn settled_rounds(text: &str) -> (Vec<(String, String, u32)>, Vec<MalformedRecord>) {
        let load = load_season(SeasonReader::new("r.csv", text.as_bytes()).unwrap()).unwrap();
        let rounds = load
            .records
            .into_iter()
            .map(|r| (r.race, r.driver, r.round))
            .collect();
        (rounds, load.skipped)
    }

    #[test]
    fn test_blank_round_cells_join_their_race() {
        let t = round_table(&[
            "2023,Miami,SAI,Ferrari,1,1:27.0,,,,,,,,SOFT,1,False,",
            "2023,Monaco,LEC,Ferrari,1,1:11.3,,,,,,,,SOFT,1,False,6",
            "2023,Monaco,SAI,Ferrari,1,1:11.9,,,,,,,,SOFT,1,False,",
            "2023,Miami,LEC,Ferrari,1,1:27.2,,,,,,,,SOFT,1,False,5",
            "2023,Monaco,SAI,Ferrari,2,1:11.6,,,,,,,,SOFT,1,False,6",
            "2023,Spain,LEC,Ferrari,1,1:13.0,,,,,,,,SOFT,1,False,",
        ]);
        let (rounds, skipped) = settled_rounds(&t);
        assert!(skipped.is_empty());
        let rounds: Vec<(&str, &str, u32)> =
            rounds.iter().map(|(r, d, n)| (r.as_str(), d.as_str(), *n)).collect();
        assert_eq!(
            rounds,
            vec![
                ("Miami", "SAI", 5),
                ("Monaco", "LEC", 6),
                ("Monaco", "SAI", 6),
                ("Miami", "LEC", 5),
                ("Monaco", "SAI", 6),
                ("Spain", "LEC", 7),
            ]
        );
    }

    #[test]
    fn test_conflicting_rounds_for_one_race_are_malformed() {
        let t = round_table(&[
            "2023,Monaco,LEC,Ferrari,1,1:11.3,,,,,,,,SOFT,1,False,6",
            "2023,Monaco,SAI,Ferrari,1,1:11.9,,,,,,,,SOFT,1,False,7",
        ]);
        let (rounds, skipped) = settled_rounds(&t);
        assert_eq!(rounds.len(), 1);
        assert_eq!(rounds[0].2, 6);
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].field, "RoundNumber");
        assert_eq!(skipped[0].driver.as_deref(), Some("SAI"));
    }

    #[test]
    fn test_discover_seasons_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("quali_2024.csv"), HEADER).unwrap();
        std::fs::write(dir.path().join("quali_2023.csv"), HEADER).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();
        let found = discover_seasons(dir.path()).unwrap();
        let names: Vec<&str> = found.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["quali_2023.csv", "quali_2024.csv"]);
    }
}
