//! Application data directories and report archiving.

use std::path::{Path, PathBuf};

use crate::domain::AggregationResult;
use crate::error::{Result, SquadCovError};
use crate::fs::FileSystem;
use crate::report::{render_csv, render_html, render_json};

/// File name of the raw coverage report inside the derived data directory.
pub const RAW_REPORT_FILE: &str = "raw_report.json";
/// File name of the CSV report.
pub const CSV_REPORT_FILE: &str = "report.csv";
/// File name of the HTML report.
pub const HTML_REPORT_FILE: &str = "report.html";
/// File name of the serialized aggregation result.
pub const JSON_REPORT_FILE: &str = "report.json";

/// Directory layout used for test logs, derived data and generated reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppDirs {
    root: PathBuf,
}

/// Paths of the files written for one report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenReport {
    /// CSV report path.
    pub csv: PathBuf,
    /// HTML report path.
    pub html: PathBuf,
    /// Serialized result path.
    pub json: PathBuf,
}

impl AppDirs {
    /// Use `root` as the application data directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The application data directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Test logs.
    pub fn logs(&self) -> PathBuf {
        self.root.join("Logs")
    }

    /// Build products and test result bundles.
    pub fn derived_data(&self) -> PathBuf {
        self.root.join("DerivedData")
    }

    /// Reports for the current run.
    pub fn coverage_report(&self) -> PathBuf {
        self.root.join("CoverageReport")
    }

    /// Copy of the most recent report.
    pub fn last_report(&self) -> PathBuf {
        self.root.join("LastReport")
    }

    /// Raw `xccov` report produced by a test run.
    pub fn raw_report(&self) -> PathBuf {
        self.derived_data().join(RAW_REPORT_FILE)
    }

    /// Create every directory of the layout.
    pub fn ensure<F: FileSystem + ?Sized>(&self, fs: &F) -> Result<()> {
        for dir in [
            self.logs(),
            self.derived_data(),
            self.coverage_report(),
            self.last_report(),
        ] {
            fs.create_dir_all(&dir)?;
        }
        Ok(())
    }

    /// Remove outputs of a previous test run, keeping logs and the last report.
    pub fn reset_run_outputs<F: FileSystem + ?Sized>(&self, fs: &F) -> Result<()> {
        for dir in [self.derived_data(), self.coverage_report()] {
            log::debug!("clearing {}", dir.display());
            fs.remove_dir_all(&dir)?;
            fs.create_dir_all(&dir)?;
        }
        Ok(())
    }

    /// Write CSV, HTML and JSON reports and copy them to the last report
    /// directory.
    pub fn write_report<F: FileSystem + ?Sized>(
        &self,
        fs: &F,
        result: &AggregationResult,
    ) -> Result<WrittenReport> {
        let report_dir = self.coverage_report();
        let last_dir = self.last_report();
        fs.create_dir_all(&report_dir)?;
        fs.create_dir_all(&last_dir)?;

        let written = WrittenReport {
            csv: report_dir.join(CSV_REPORT_FILE),
            html: report_dir.join(HTML_REPORT_FILE),
            json: report_dir.join(JSON_REPORT_FILE),
        };
        fs.write(&written.csv, &render_csv(result))?;
        fs.write(&written.html, &render_html(result))?;
        fs.write(&written.json, &render_json(result)?)?;

        for (path, name) in [
            (&written.csv, CSV_REPORT_FILE),
            (&written.html, HTML_REPORT_FILE),
            (&written.json, JSON_REPORT_FILE),
        ] {
            fs.copy(path, &last_dir.join(name))?;
        }
        log::info!("report written to {}", report_dir.display());

        Ok(written)
    }

    /// Load the result archived by the last successful report.
    pub fn load_last_report<F: FileSystem + ?Sized>(&self, fs: &F) -> Result<AggregationResult> {
        let path = self.last_report().join(JSON_REPORT_FILE);
        if !fs.is_file(&path) {
            return Err(SquadCovError::MissingInput(path));
        }
        let contents = fs.read_to_string(&path)?;
        Ok(serde_json::from_str(&contents)?)
    }
}
