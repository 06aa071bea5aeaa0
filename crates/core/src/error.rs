//! Error types for FlowUQ

use thiserror::Error;

/// Main error type for FlowUQ operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("{axis}-coordinate {value} is out of bounds (must lie strictly within {min}..{max})")]
    OutOfBounds {
        axis: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Raster size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("Dimension mismatch for {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("Raster decode error: {0}")]
    Decode(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0} has not been trained")]
    NotTrained(&'static str),

    #[error("Algorithm error: {0}")]
    Algorithm(String),

    #[error("Data source error: {0}")]
    Source(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("{0}")]
    Other(String),
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Error::Config(e.to_string())
    }
}

impl Error {
    /// Shorthand for [`Error::InvalidParameter`].
    pub fn invalid(name: &'static str, value: impl ToString, reason: impl Into<String>) -> Self {
        Error::InvalidParameter {
            name,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for FlowUQ operations
pub type Result<T> = std::result::Result<T, Error>;
