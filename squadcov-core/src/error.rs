//! Error types for squadcov core.

use std::path::PathBuf;
use std::{error::Error, fmt, io};

/// Error type for squadcov core operations.
#[derive(Debug)]
pub enum SquadCovError {
    /// An underlying I/O error.
    Io(io::Error),
    /// A JSON document could not be parsed or produced.
    Json(serde_json::Error),
    /// The squad registry is malformed (missing columns or empty cells).
    Configuration(String),
    /// A required input file does not exist.
    MissingInput(PathBuf),
    /// The raw coverage report has an unexpected shape or inconsistent values.
    InvalidReport(String),
    /// No coverage record could be assigned to any squad.
    EmptyResult,
}

impl fmt::Display for SquadCovError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "io error: {err}"),
            Self::Json(err) => write!(f, "json error: {err}"),
            Self::Configuration(message) => write!(f, "invalid squad registry: {message}"),
            Self::MissingInput(path) => write!(
                f,
                "report file is missing: {}. Please run the tests again.",
                path.display()
            ),
            Self::InvalidReport(message) => write!(f, "invalid coverage report: {message}"),
            Self::EmptyResult => write!(f, "could not generate report: no files matched any squad"),
        }
    }
}

impl Error for SquadCovError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for SquadCovError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for SquadCovError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

/// Convenience result type for squadcov core.
pub type Result<T> = std::result::Result<T, SquadCovError>;
