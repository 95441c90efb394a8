use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the power comparison pipeline.
#[derive(Error, Debug)]
pub enum PowerError {
    /// A required input record set does not exist.
    #[error("Input file not found: {0}")]
    MissingInput(PathBuf),

    /// A file exists but could not be opened or read.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An output file could not be created or written.
    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A required column is absent from the header of an input file.
    #[error("Missing column '{column}' in {path}")]
    MissingColumn { path: PathBuf, column: String },

    /// A timestamp did not match `YYYYMMDDTHH:MM:SS`.
    #[error("Invalid timestamp format: {0}")]
    TimestampParse(String),

    /// A power value was not a finite decimal number.
    #[error("Invalid power value: {0}")]
    PowerParse(String),

    /// A secondary-source record carried no session label.
    #[error("Missing session label")]
    SessionMissing,

    /// No rows carry the idle session label, so no baseline can be computed.
    #[error("No readings found for baseline session '{session}'")]
    MissingBaseline { session: String },

    /// A stage had nothing left to work with.
    #[error("Empty result: {0}")]
    EmptyResult(String),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to serialize JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl PowerError {
    /// Record-level errors are recovered by skipping the offending record.
    pub fn is_record_level(&self) -> bool {
        matches!(
            self,
            PowerError::TimestampParse(_) | PowerError::PowerParse(_) | PowerError::SessionMissing
        )
    }
}

/// Convenience alias used throughout the power crates.
pub type Result<T> = std::result::Result<T, PowerError>;
