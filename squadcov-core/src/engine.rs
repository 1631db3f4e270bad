//! Squad assignment and coverage aggregation.
//!
//! Squads are processed in declared order and each record is owned by at most
//! one squad: the first squad whose patterns match a record claims it, and
//! later squads only scan what is left.

use crate::domain::{
    AggregationResult, CoverageRecord, MatchMode, MissingPatterns, ProjectCoverage, SquadSpec,
    SquadSummary, coverage_ratio,
};

const DIVERGENCE_TOLERANCE: f64 = 1e-4;

impl MatchMode {
    /// Whether `pattern` selects the file at `path` under this mode.
    pub fn matches(self, path: &str, pattern: &str) -> bool {
        match self {
            MatchMode::Legacy => path.contains(pattern),
            MatchMode::Strict => {
                path == pattern
                    || path
                        .strip_suffix(pattern)
                        .is_some_and(|head| head.ends_with('/'))
            }
        }
    }

    fn stops_at_pattern_count(self) -> bool {
        matches!(self, MatchMode::Legacy)
    }
}

/// Assign records to squads with [`MatchMode::Legacy`] matching.
pub fn assign(coverage: ProjectCoverage, squads: &[SquadSpec]) -> AggregationResult {
    assign_with_mode(coverage, squads, MatchMode::Legacy)
}

/// Assign records to squads and aggregate coverage per squad.
///
/// The project coverage is carried over from the raw report; the recomputed
/// total over every record is kept alongside it for diagnostics.
pub fn assign_with_mode(
    coverage: ProjectCoverage,
    squads: &[SquadSpec],
    mode: MatchMode,
) -> AggregationResult {
    let ProjectCoverage {
        line_coverage,
        records,
    } = coverage;
    let recomputed_coverage = total_coverage(&records);
    if (recomputed_coverage - line_coverage).abs() > DIVERGENCE_TOLERANCE {
        log::debug!(
            "reported project coverage {line_coverage:.4} differs from recomputed {recomputed_coverage:.4}"
        );
    }

    let mut pool = records;
    let mut assigned = Vec::new();
    let mut missing_patterns = MissingPatterns::new();
    let mut summaries = Vec::with_capacity(squads.len());

    for squad in squads {
        if squad.patterns.is_empty() {
            log::warn!(
                "filenames for squad {} must be provided for coverage report",
                squad.name
            );
            summaries.push(SquadSummary {
                name: squad.name.clone(),
                claimed: 0,
                declared: 0,
                coverage: 0.0,
                missing_patterns: Vec::new(),
                skipped: true,
            });
            continue;
        }

        let (mut claimed, remaining) = claim(pool, squad, mode);
        pool = remaining;

        let missing: Vec<String> = squad
            .patterns
            .iter()
            .filter(|pattern| {
                !claimed
                    .iter()
                    .any(|record| mode.matches(&record.path, pattern))
            })
            .cloned()
            .collect();

        let squad_coverage = total_coverage(&claimed);
        for record in &mut claimed {
            record.squad = Some(squad.name.clone());
            record.squad_coverage = Some(squad_coverage);
        }

        let summary = SquadSummary {
            name: squad.name.clone(),
            claimed: claimed.len(),
            declared: squad.patterns.len(),
            coverage: squad_coverage,
            missing_patterns: missing.clone(),
            skipped: false,
        };
        log::info!("{summary}");

        if !missing.is_empty() {
            missing_patterns
                .entry(squad.name.clone())
                .or_default()
                .extend(missing);
        }
        summaries.push(summary);
        assigned.append(&mut claimed);
    }

    AggregationResult {
        assigned,
        unassigned: pool,
        project_coverage: line_coverage,
        recomputed_coverage,
        missing_patterns,
        summaries,
    }
}

/// Split `pool` into the records `squad` claims and the rest, keeping order.
fn claim(
    pool: Vec<CoverageRecord>,
    squad: &SquadSpec,
    mode: MatchMode,
) -> (Vec<CoverageRecord>, Vec<CoverageRecord>) {
    let limit = squad.patterns.len();
    let mut claimed = Vec::new();
    let mut remaining = Vec::with_capacity(pool.len());
    let mut scanning = true;

    for record in pool {
        if scanning
            && squad
                .patterns
                .iter()
                .any(|pattern| mode.matches(&record.path, pattern))
        {
            claimed.push(record);
            if mode.stops_at_pattern_count() && claimed.len() == limit {
                scanning = false;
            }
        } else {
            remaining.push(record);
        }
    }

    (claimed, remaining)
}

/// Covered / executable lines summed over `records`.
pub fn total_coverage(records: &[CoverageRecord]) -> f64 {
    let (covered, executable) = records.iter().fold((0u64, 0u64), |(c, e), record| {
        (c + record.covered_lines, e + record.executable_lines)
    });
    coverage_ratio(covered, executable)
}
