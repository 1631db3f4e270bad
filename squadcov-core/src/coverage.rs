//! Loading of raw `xccov` JSON coverage reports.

use std::path::Path;

use serde::Deserialize;

use crate::domain::{CoverageRecord, ProjectCoverage, coverage_ratio};
use crate::error::{Result, SquadCovError};
use crate::fs::FileSystem;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReport {
    line_coverage: f64,
    #[serde(default)]
    targets: Vec<RawTarget>,
}

#[derive(Debug, Deserialize)]
struct RawTarget {
    #[serde(default)]
    files: Vec<RawFile>,
}

// Per-function breakdowns are not deserialized.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFile {
    path: String,
    name: String,
    covered_lines: u64,
    executable_lines: u64,
    #[serde(default)]
    line_coverage: Option<f64>,
}

/// Read and normalize the raw coverage report at `path`.
///
/// File paths are made relative to `project_dir`. A missing report yields
/// [`SquadCovError::MissingInput`].
pub fn load_coverage<F: FileSystem + ?Sized>(
    fs: &F,
    path: &Path,
    project_dir: &Path,
) -> Result<ProjectCoverage> {
    if !fs.is_file(path) {
        return Err(SquadCovError::MissingInput(path.to_path_buf()));
    }
    let contents = fs.read_to_string(path)?;
    parse_coverage(&contents, project_dir)
}

/// Parse a raw coverage report and flatten its files across targets.
pub fn parse_coverage(contents: &str, project_dir: &Path) -> Result<ProjectCoverage> {
    let report: RawReport = serde_json::from_str(contents)?;
    if !(0.0..=1.0).contains(&report.line_coverage) {
        return Err(SquadCovError::InvalidReport(format!(
            "project line coverage {} is outside [0, 1]",
            report.line_coverage
        )));
    }

    let prefix = project_prefix(project_dir);
    let mut records = Vec::new();
    for file in report.targets.into_iter().flat_map(|target| target.files) {
        records.push(normalize_file(file, &prefix)?);
    }
    log::debug!("loaded {} coverage records", records.len());

    Ok(ProjectCoverage {
        line_coverage: report.line_coverage,
        records,
    })
}

fn normalize_file(file: RawFile, prefix: &str) -> Result<CoverageRecord> {
    if file.covered_lines > file.executable_lines {
        return Err(SquadCovError::InvalidReport(format!(
            "{} reports {} covered lines but only {} executable lines",
            file.path, file.covered_lines, file.executable_lines
        )));
    }
    let line_coverage = match file.line_coverage {
        Some(ratio) if file.executable_lines > 0 && ratio.is_finite() => ratio.clamp(0.0, 1.0),
        _ => coverage_ratio(file.covered_lines, file.executable_lines),
    };

    Ok(CoverageRecord {
        path: relative_path(&file.path, prefix).to_string(),
        name: file.name,
        covered_lines: file.covered_lines,
        executable_lines: file.executable_lines,
        line_coverage,
        squad: None,
        squad_coverage: None,
    })
}

fn project_prefix(project_dir: &Path) -> String {
    let root = project_dir.to_string_lossy();
    format!("{}/", root.trim_end_matches('/'))
}

fn relative_path<'a>(path: &'a str, prefix: &str) -> &'a str {
    path.strip_prefix(prefix).unwrap_or(path)
}
