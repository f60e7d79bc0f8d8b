//! Race-scoped metrics: pole time, gap to pole and teammate deltas.
//!
//! Every metric needs the whole classification of a race, so this runs only
//! after the session has been fully reduced.

use std::collections::{BTreeMap, HashMap};

use model::*;
use serde::{Deserialize, Serialize};

/// How many races each pair of drivers was classified together for a team.
/// Used to pick the primary pairing when a team fields three or more drivers.
#[derive(Debug, Clone, Default)]
pub struct TeamOverlap {
    counts: HashMap<(String, String, String), u32>,
}

impl TeamOverlap {
    pub fn from_sessions<'a, I>(sessions: I) -> Self
    where
        I: IntoIterator<Item = &'a [QualifyingResult]>,
    {
        let mut overlap = Self::default();
        for results in sessions {
            for (team, drivers) in drivers_by_team(results) {
                for (i, a) in drivers.iter().enumerate() {
                    for b in &drivers[i + 1..] {
                        let key = pair_key(team, &results[*a].driver, &results[*b].driver);
                        *overlap.counts.entry(key).or_insert(0) += 1;
                    }
                }
            }
        }
        overlap
    }

    pub fn races_together(&self, team: &str, a: &str, b: &str) -> u32 {
        self.counts.get(&pair_key(team, a, b)).copied().unwrap_or(0)
    }
}

fn pair_key(team: &str, a: &str, b: &str) -> (String, String, String) {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    (team.to_string(), lo.to_string(), hi.to_string())
}

fn drivers_by_team(results: &[QualifyingResult]) -> BTreeMap<&str, Vec<usize>> {
    let mut teams: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (i, r) in results.iter().enumerate() {
        teams.entry(r.team.as_str()).or_default().push(i);
    }
    teams
}

/// A race where more than two classified drivers share a team.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewFlag {
    pub season: u16,
    pub race: String,
    pub team: String,
    pub drivers: Vec<String>,
    pub resolved_pairs: Vec<(String, String)>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RaceOutcome {
    /// In position order.
    pub entries: Vec<RaceEntry>,
    pub review_flags: Vec<ReviewFlag>,
}

pub fn pole_time(results: &[QualifyingResult]) -> Option<u64> {
    results.iter().map(|r| r.best_lap_ms).min()
}

pub fn gap_to_pole(best_lap_ms: u64, pole_ms: u64) -> u64 {
    best_lap_ms.saturating_sub(pole_ms)
}

pub fn teammate_delta(own_ms: u64, teammate_ms: u64) -> i64 {
    own_ms as i64 - teammate_ms as i64
}

/// Derives the metrics of one race from its complete classification.
pub fn compute_race_metrics(results: Vec<QualifyingResult>, overlap: &TeamOverlap) -> RaceOutcome {
    let Some(pole_ms) = pole_time(&results) else {
        return RaceOutcome::default();
    };

    let mut teammate: Vec<Option<usize>> = vec![None; results.len()];
    let mut review_flags = Vec::new();
    for (team, members) in drivers_by_team(&results) {
        match members.as_slice() {
            [_] => {}
            [a, b] => {
                teammate[*a] = Some(*b);
                teammate[*b] = Some(*a);
            }
            _ => {
                let pairs = primary_pairs(team, &members, &results, overlap);
                for &(a, b) in &pairs {
                    teammate[a] = Some(b);
                    teammate[b] = Some(a);
                }
                let flag = ReviewFlag {
                    season: results[members[0]].season,
                    race: results[members[0]].race.clone(),
                    team: team.to_string(),
                    drivers: members.iter().map(|&i| results[i].driver.clone()).collect(),
                    resolved_pairs: pairs
                        .iter()
                        .map(|&(a, b)| (results[a].driver.clone(), results[b].driver.clone()))
                        .collect(),
                };
                tracing::warn!(
                    season = flag.season,
                    race = %flag.race,
                    team = %flag.team,
                    drivers = ?flag.drivers,
                    resolved = ?flag.resolved_pairs,
                    "more than two drivers share a team, needs review"
                );
                review_flags.push(flag);
            }
        }
    }

    let mut entries: Vec<RaceEntry> = results
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let mate = teammate[i].map(|j| &results[j]);
            RaceEntry {
                result: r.clone(),
                metrics: RaceMetrics {
                    pole_ms,
                    gap_to_pole_ms: gap_to_pole(r.best_lap_ms, pole_ms),
                    teammate: mate.map(|m| m.driver.clone()),
                    teammate_delta_ms: mate.map(|m| teammate_delta(r.best_lap_ms, m.best_lap_ms)),
                },
            }
        })
        .collect();
    entries.sort_by_key(|e| e.result.position);
    RaceOutcome { entries, review_flags }
}

// Each driver's primary partner is the one they shared the most races with.
// A pair is kept only when the choice is mutual and unambiguous.
fn primary_pairs(
    team: &str,
    members: &[usize],
    results: &[QualifyingResult],
    overlap: &TeamOverlap,
) -> Vec<(usize, usize)> {
    let best_partner = |d: usize| -> Option<usize> {
        let mut best: Option<(u32, usize)> = None;
        let mut tied = false;
        for &o in members.iter().filter(|&&o| o != d) {
            let n = overlap.races_together(team, &results[d].driver, &results[o].driver);
            match best {
                Some((m, _)) if n < m => {}
                Some((m, _)) if n == m => tied = true,
                _ => {
                    best = Some((n, o));
                    tied = false;
                }
            }
        }
        match best {
            Some((n, o)) if n > 0 && !tied => Some(o),
            _ => None,
        }
    };

    let mut pairs = Vec::new();
    for &d in members {
        if let Some(o) = best_partner(d) {
            if d < o && best_partner(o) == Some(d) {
                pairs.push((d, o));
            }
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_result(driver: &str, team: &str, position: u32, best_lap_ms: u64) -> QualifyingResult {
        QualifyingResult {
            season: 2023,
            race: "Bahrain Grand Prix".to_string(),
            round: 1,
            driver: driver.to_string(),
            team: team.to_string(),
            position,
            best_lap_ms,
            lap_number: 1,
            completed_at_ms: None,
            sectors_ms: [None; 3],
            speeds: SpeedTraps::default(),
            compound: None,
            stint: None,
            personal_best: true,
            wet_session: false,
        }
    }

    fn metrics_of<'a>(outcome: &'a RaceOutcome, driver: &str) -> &'a RaceMetrics {
        &outcome.entries.iter().find(|e| e.result.driver == driver).unwrap().metrics
    }

    #[test]
    fn test_tied_pole_scenario() {
        let results = vec![
            create_test_result("B", "X", 1, 80_100),
            create_test_result("A", "Y", 2, 80_100),
            create_test_result("C", "Z", 3, 81_000),
        ];
        let out = compute_race_metrics(results, &TeamOverlap::default());
        assert_eq!(metrics_of(&out, "B").pole_ms, 80_100);
        assert_eq!(metrics_of(&out, "B").gap_to_pole_ms, 0);
        assert_eq!(metrics_of(&out, "A").gap_to_pole_ms, 0);
        assert_eq!(metrics_of(&out, "C").gap_to_pole_ms, 900);
        let order: Vec<&str> = out.entries.iter().map(|e| e.result.driver.as_str()).collect();
        assert_eq!(order, vec!["B", "A", "C"]);
    }

    #[test]
    fn test_teammate_delta_is_antisymmetric() {
        let results = vec![
            create_test_result("VER", "Red Bull", 1, 89_708),
            create_test_result("LEC", "Ferrari", 2, 89_900),
            create_test_result("PER", "Red Bull", 3, 90_000),
        ];
        let out = compute_race_metrics(results, &TeamOverlap::default());
        let ver = metrics_of(&out, "VER");
        let per = metrics_of(&out, "PER");
        assert_eq!(ver.teammate.as_deref(), Some("PER"));
        assert_eq!(ver.teammate_delta_ms, Some(-292));
        assert_eq!(per.teammate_delta_ms, Some(292));
    }

    #[test]
    fn test_lone_driver_has_no_delta() {
        let results = vec![
            create_test_result("VER", "Red Bull", 1, 89_708),
            create_test_result("LEC", "Ferrari", 2, 89_900),
        ];
        let out = compute_race_metrics(results, &TeamOverlap::default());
        let lec = metrics_of(&out, "LEC");
        assert_eq!(lec.teammate, None);
        assert_eq!(lec.teammate_delta_ms, None);
        assert!(out.review_flags.is_empty());
    }

    #[test]
    fn test_three_driver_team_pairs_by_overlap() {
        let regular = |race: &str| {
            let mut a = create_test_result("ALB", "Williams", 1, 90_000);
            let mut b = create_test_result("SAR", "Williams", 2, 90_500);
            a.race = race.to_string();
            b.race = race.to_string();
            vec![a, b]
        };
        let history = vec![regular("R1"), regular("R2")];
        let mut odd = regular("R3");
        let mut sub = create_test_result("COL", "Williams", 3, 91_000);
        sub.race = "R3".to_string();
        odd.push(sub);
        let overlap = TeamOverlap::from_sessions(
            history.iter().map(Vec::as_slice).chain(std::iter::once(odd.as_slice())),
        );
        assert_eq!(overlap.races_together("Williams", "SAR", "ALB"), 3);
        assert_eq!(overlap.races_together("Williams", "COL", "ALB"), 1);

        let out = compute_race_metrics(odd, &overlap);
        assert_eq!(metrics_of(&out, "ALB").teammate.as_deref(), Some("SAR"));
        assert_eq!(metrics_of(&out, "SAR").teammate_delta_ms, Some(500));
        assert_eq!(metrics_of(&out, "COL").teammate_delta_ms, None);
        assert_eq!(out.review_flags.len(), 1);
        assert_eq!(out.review_flags[0].resolved_pairs, vec![("ALB".to_string(), "SAR".to_string())]);
    }

    #[test]
    fn test_unresolved_three_driver_team_leaves_nulls() {
        let results = vec![
            create_test_result("A", "X", 1, 80_000),
            create_test_result("B", "X", 2, 80_100),
            create_test_result("C", "X", 3, 80_200),
        ];
        let out = compute_race_metrics(results, &TeamOverlap::default());
        assert!(out.entries.iter().all(|e| e.metrics.teammate_delta_ms.is_none()));
        assert!(out.review_flags[0].resolved_pairs.is_empty());
    }

    #[test]
    fn test_empty_race() {
        let out = compute_race_metrics(Vec::new(), &TeamOverlap::default());
        assert!(out.entries.is_empty());
    }
}
