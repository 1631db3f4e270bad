#![deny(missing_docs)]
//! squadcov core library.
//!
//! Loads raw coverage reports and squad registries, assigns covered files to
//! squads, and renders the resulting coverage reports.

pub mod coverage;
pub mod domain;
pub mod engine;
pub mod error;
pub mod fs;
pub mod registry;
pub mod report;
pub mod workspace;

pub use coverage::{load_coverage, parse_coverage};
pub use domain::{
    AggregationResult, CoverageRecord, MatchMode, MissingPatterns, ProjectCoverage, SquadSpec,
    SquadSummary, coverage_ratio, format_percent,
};
pub use engine::{assign, assign_with_mode, total_coverage};
pub use error::{Result, SquadCovError};
pub use fs::{FileSystem, StdFileSystem};
pub use registry::{DEFAULT_DELIMITER, load_registry, parse_registry};
pub use report::{render_csv, render_html, render_json, render_markdown, render_text};
pub use workspace::{AppDirs, WrittenReport};
