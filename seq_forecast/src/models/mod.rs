//! Classical forecasting models for univariate series

use crate::error::{ForecastError, Result};
use crate::metrics;
use std::fmt::Debug;

pub mod arima;

pub use arima::{ArimaModel, TrainedArimaModel};

/// Point forecasts for consecutive future periods
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastResult {
    values: Vec<f64>,
    horizons: usize,
}

impl ForecastResult {
    /// Create a new forecast result
    pub fn new(values: Vec<f64>, horizons: usize) -> Result<Self> {
        if values.len() != horizons {
            return Err(ForecastError::InvalidParameter(format!(
                "Values length ({}) doesn't match horizons ({})",
                values.len(),
                horizons
            )));
        }

        Ok(Self { values, horizons })
    }

    /// Get the forecasted values
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Get the number of periods forecasted
    pub fn horizons(&self) -> usize {
        self.horizons
    }

    /// Consume the result, keeping the values
    pub fn into_values(self) -> Vec<f64> {
        self.values
    }

    /// Mean absolute error against `actual`
    pub fn mean_absolute_error(&self, actual: &[f64]) -> Result<f64> {
        metrics::mae(actual, &self.values)
    }

    /// Mean squared error against `actual`
    pub fn mean_squared_error(&self, actual: &[f64]) -> Result<f64> {
        metrics::mse(actual, &self.values)
    }

    /// Mean absolute percentage error against `actual`
    pub fn mean_absolute_percentage_error(&self, actual: &[f64]) -> Result<f64> {
        metrics::mape(actual, &self.values)
    }
}

/// Trained forecast model
pub trait TrainedForecastModel: Debug {
    /// Generate forecast for future periods
    fn forecast(&self, horizons: usize) -> Result<ForecastResult>;

    /// Name of the model
    fn name(&self) -> &str;
}

/// Forecast model that can be trained on a univariate series
pub trait ForecastModel: Debug + Clone {
    /// The type of trained model produced
    type Trained: TrainedForecastModel;

    /// Train the model on `series`, oldest value first
    fn train(&self, series: &[f64]) -> Result<Self::Trained>;

    /// Get the name of the model
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_forecast_result_length_check() {
        assert!(ForecastResult::new(vec![1.0, 2.0], 3).is_err());
        let result = ForecastResult::new(vec![1.0, 2.0], 2).unwrap();
        assert_eq!(result.horizons(), 2);
    }

    #[test]
    fn test_forecast_result_errors() {
        let result = ForecastResult::new(vec![2.0, 4.0], 2).unwrap();
        let actual = [1.0, 5.0];
        assert_relative_eq!(result.mean_absolute_error(&actual).unwrap(), 1.0);
        assert_relative_eq!(result.mean_squared_error(&actual).unwrap(), 1.0);
        assert_relative_eq!(
            result.mean_absolute_percentage_error(&actual).unwrap(),
            (1.0 + 0.2) / 2.0
        );
    }
}
