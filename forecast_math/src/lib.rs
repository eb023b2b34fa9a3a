//! # Forecast Math
//!
//! Numeric building blocks shared by the forecasting crates.
//! Nothing in here knows about tables or models; every function works on
//! plain slices so it can be reused by imputers, datasets and estimators.

use thiserror::Error;

pub mod differencing;
pub mod optimization;
pub mod rolling;
pub mod stats;

/// Errors that can occur in numeric calculations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    #[error("Insufficient data for calculation: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),
}

/// Result type for numeric operations
pub type Result<T> = std::result::Result<T, MathError>;
