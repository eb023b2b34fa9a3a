//! Error types for the seq_forecast crate

use polars::prelude::PolarsError;
use thiserror::Error;

/// Custom error types for the seq_forecast crate
#[derive(Debug, Error)]
pub enum ForecastError {
    /// Error related to data validation or processing
    #[error("Data error: {0}")]
    DataError(String),

    /// A configured column is absent from the table
    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    /// A split, batch or epoch produced no samples to average over
    #[error("Empty split: {0}")]
    EmptySplit(String),

    /// Fitted imputation state does not line up with the table being filled
    #[error(
        "Misaligned imputation source for column '{column}': fitted on {fitted} rows, got {got}"
    )]
    MisalignedImputation {
        column: String,
        fitted: usize,
        got: usize,
    },

    /// Estimator fitting or metric computation is numerically unusable
    #[error("Numerical instability: {0}")]
    NumericalInstability(String),

    /// No persisted model at the requested location
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// Persisted model or supplied data does not match the expected layout
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Error from invalid parameters
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// A fit-dependent operation was called before fitting
    #[error("Not fitted: {0}")]
    NotFitted(String),

    /// Error raised inside the training loop
    #[error("Training error: {0}")]
    TrainingError(String),

    /// Error from IO operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error from Polars operations
    #[error("Polars error: {0}")]
    PolarsError(String),

    /// Error from JSON (de)serialization
    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    /// Error from array shape operations
    #[error("Shape error: {0}")]
    ShapeError(#[from] ndarray::ShapeError),

    /// Error from date parsing
    #[error("Parse error: {0}")]
    ParseError(#[from] chrono::ParseError),

    /// Error from the numeric building blocks
    #[error("Math error: {0}")]
    MathError(#[from] forecast_math::MathError),
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;

impl From<PolarsError> for ForecastError {
    fn from(err: PolarsError) -> Self {
        match err {
            PolarsError::ColumnNotFound(name) => ForecastError::ColumnNotFound(name.to_string()),
            other => ForecastError::PolarsError(other.to_string()),
        }
    }
}
