//! Domain entities for squadcov.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Squad name mapped to the patterns that matched none of its claimed files.
pub type MissingPatterns = BTreeMap<String, Vec<String>>;

/// Line coverage for a single compiled source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageRecord {
    /// Project-relative file path.
    pub path: String,
    /// Bare file name.
    pub name: String,
    /// Number of executable lines hit by tests.
    pub covered_lines: u64,
    /// Number of executable lines in the file.
    pub executable_lines: u64,
    /// Covered / executable lines, `0.0` for files without executable lines.
    pub line_coverage: f64,
    /// Squad that claimed this file, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub squad: Option<String>,
    /// Aggregate coverage of the claiming squad.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub squad_coverage: Option<f64>,
}

impl CoverageRecord {
    /// Create an unassigned record, deriving the line coverage from the counts.
    pub fn new(
        path: impl Into<String>,
        name: impl Into<String>,
        covered_lines: u64,
        executable_lines: u64,
    ) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            covered_lines,
            executable_lines,
            line_coverage: coverage_ratio(covered_lines, executable_lines),
            squad: None,
            squad_coverage: None,
        }
    }
}

/// An ownership group and the filename patterns it owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SquadSpec {
    /// Unique squad name.
    pub name: String,
    /// Filename patterns in registry order.
    pub patterns: Vec<String>,
}

impl SquadSpec {
    /// Create a squad from a name and its patterns.
    pub fn new<I, S>(name: impl Into<String>, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            patterns: patterns.into_iter().map(Into::into).collect(),
        }
    }
}

/// The normalized contents of a raw coverage report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectCoverage {
    /// Project line coverage as reported by the coverage tool.
    pub line_coverage: f64,
    /// All source files across targets, in report order.
    pub records: Vec<CoverageRecord>,
}

/// How squad patterns are matched against file paths.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Literal substring match; a squad stops claiming once it holds as many
    /// files as it declares patterns.
    #[default]
    Legacy,
    /// The pattern must equal the path or a trailing run of its segments, and
    /// every matching file is claimed.
    Strict,
}

/// Outcome of assigning files to one squad.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SquadSummary {
    /// Squad name.
    pub name: String,
    /// Number of files claimed.
    pub claimed: usize,
    /// Number of patterns declared.
    pub declared: usize,
    /// Aggregate line coverage of the claimed files.
    pub coverage: f64,
    /// Declared patterns that matched no claimed file.
    pub missing_patterns: Vec<String>,
    /// Set when the squad declared no patterns and was not processed.
    pub skipped: bool,
}

impl fmt::Display for SquadSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.skipped {
            return write!(
                f,
                "{}: no filenames provided, squad skipped",
                self.name
            );
        }
        write!(
            f,
            "{}: {} of {} files matched, coverage {}",
            self.name,
            self.claimed,
            self.declared,
            format_percent(self.coverage)
        )?;
        if !self.missing_patterns.is_empty() {
            write!(f, ", not found: {}", self.missing_patterns.join(", "))?;
        }
        Ok(())
    }
}

/// Squad assignment output for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationResult {
    /// Claimed files, grouped by squad in processing order.
    pub assigned: Vec<CoverageRecord>,
    /// Files no squad claimed.
    pub unassigned: Vec<CoverageRecord>,
    /// Project coverage taken from the raw report.
    pub project_coverage: f64,
    /// Coverage recomputed over every record; diagnostic only.
    pub recomputed_coverage: f64,
    /// Patterns that matched nothing, keyed by squad.
    pub missing_patterns: MissingPatterns,
    /// Per-squad outcomes in processing order.
    pub summaries: Vec<SquadSummary>,
}

impl AggregationResult {
    /// Whether no file was assigned to any squad.
    pub fn is_empty(&self) -> bool {
        self.assigned.is_empty()
    }
}

/// Ratio of covered to executable lines, `0.0` when nothing is executable.
pub fn coverage_ratio(covered: u64, executable: u64) -> f64 {
    if executable == 0 {
        0.0
    } else {
        covered as f64 / executable as f64
    }
}

/// Format a ratio as a percentage with two decimals.
pub fn format_percent(ratio: f64) -> String {
    format!("{:.2}%", ratio * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_derives_line_coverage() {
        let record = CoverageRecord::new("App/Login.swift", "Login.swift", 3, 4);
        assert_eq!(record.line_coverage, 0.75);
        assert!(record.squad.is_none());
    }

    #[test]
    fn zero_executable_lines_yield_zero_ratio() {
        assert_eq!(coverage_ratio(0, 0), 0.0);
        let record = CoverageRecord::new("Empty.swift", "Empty.swift", 0, 0);
        assert_eq!(record.line_coverage, 0.0);
    }

    #[test]
    fn formats_percentages_with_two_decimals() {
        assert_eq!(format_percent(0.5), "50.00%");
        assert_eq!(format_percent(0.12345), "12.35%");
        assert_eq!(format_percent(0.0), "0.00%");
    }

    #[test]
    fn summary_line_lists_missing_patterns() {
        let summary = SquadSummary {
            name: "Payments".to_string(),
            claimed: 1,
            declared: 3,
            coverage: 0.25,
            missing_patterns: vec!["Card.swift".to_string(), "Iban.swift".to_string()],
            skipped: false,
        };
        assert_eq!(
            summary.to_string(),
            "Payments: 1 of 3 files matched, coverage 25.00%, not found: Card.swift, Iban.swift"
        );
    }

    #[test]
    fn summary_line_for_skipped_squad() {
        let summary = SquadSummary {
            name: "Ghost".to_string(),
            claimed: 0,
            declared: 0,
            coverage: 0.0,
            missing_patterns: Vec::new(),
            skipped: true,
        };
        assert_eq!(summary.to_string(), "Ghost: no filenames provided, squad skipped");
    }

    #[test]
    fn record_serializes_camel_case_without_empty_squad() {
        let record = CoverageRecord::new("A.swift", "A.swift", 1, 2);
        let json = serde_json::to_value(&record).expect("json");
        assert_eq!(json["coveredLines"], 1);
        assert_eq!(json["executableLines"], 2);
        assert!(json.get("squad").is_none());
    }
}
