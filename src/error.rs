//! Error taxonomy for the dispatch engine and its exit-code mapping.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Malformed or inconsistent input series.
///
/// Carries the offending file and, when known, the 1-based data row.
#[derive(Debug, Clone, Error)]
#[error("input error: {}{}: {message}", .file.display(), row_suffix(.row))]
pub struct InputError {
    /// Path of the input file.
    pub file: PathBuf,
    /// Data row (1-based, header excluded) where the problem was found.
    pub row: Option<usize>,
    /// Human-readable description.
    pub message: String,
}

impl InputError {
    pub fn new(file: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            row: None,
            message: message.into(),
        }
    }

    pub fn at_row(file: impl Into<PathBuf>, row: usize, message: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            row: Some(row),
            message: message.into(),
        }
    }
}

fn row_suffix(row: &Option<usize>) -> String {
    row.map(|r| format!(" (row {r})")).unwrap_or_default()
}

/// Configuration error with field path and constraint description.
#[derive(Debug, Clone, Error)]
#[error("config error: {field}: {message}")]
pub struct ConfigError {
    /// Dotted field path (e.g., `"battery.dod"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

/// A battery operation would leave SoC outside its bounds after clipping.
#[derive(Debug, Clone, Error)]
#[error("battery invariant violated at soc={soc_kwh:.6} kWh: {message}")]
pub struct BatteryInvariantError {
    pub soc_kwh: f64,
    pub message: String,
}

/// An hourly invariant failed after a solver step or during validation.
#[derive(Debug, Clone, Error)]
#[error("invariant `{invariant}` violated at hour {hour}: {record}")]
pub struct SolverInvariantError {
    /// Index of the hour in the annual series.
    pub hour: usize,
    /// Short invariant name (e.g., `"pv_balance"`).
    pub invariant: &'static str,
    /// Debug dump of the offending record.
    pub record: String,
}

/// Top-level error returned by every fallible engine operation.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error("{}", join_config_errors(.0))]
    Config(Vec<ConfigError>),

    #[error(transparent)]
    Battery(#[from] BatteryInvariantError),

    #[error(transparent)]
    Solver(#[from] SolverInvariantError),

    #[error("i/o error on \"{}\": {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn join_config_errors(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(vec![err])
    }
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    /// Process exit code: 1 input/config, 2 invariant violation, 3 I/O.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Input(_) | Error::Config(_) => 1,
            Error::Battery(_) | Error::Solver(_) => 2,
            Error::Io { .. } => 3,
        }
    }
}
