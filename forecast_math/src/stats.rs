//! Summary statistics used for z-score scaling

use crate::{MathError, Result};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Location and scale of one column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeanStd {
    /// Arithmetic mean
    pub mean: f64,
    /// Population standard deviation
    pub std: f64,
}

impl MeanStd {
    /// Compute mean and population standard deviation of `values`.
    ///
    /// A constant column has a standard deviation of zero; it is reported
    /// as 1.0 so scaling leaves the centred values at zero instead of
    /// dividing by zero.
    pub fn from_values(values: &[f64]) -> Result<Self> {
        if values.is_empty() {
            return Err(MathError::InsufficientData(
                "Cannot compute statistics of an empty series".to_string(),
            ));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(MathError::InvalidInput(
                "Series contains non-finite values".to_string(),
            ));
        }

        let mean = values.mean();
        let std = values.population_std_dev();
        let std = if std > f64::EPSILON { std } else { 1.0 };

        Ok(Self { mean, std })
    }

    /// Scale a raw value to z-score units
    pub fn normalize(&self, value: f64) -> f64 {
        (value - self.mean) / self.std
    }

    /// Map a z-score back to raw units
    pub fn denormalize(&self, value: f64) -> f64 {
        value * self.std + self.mean
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mean_std() {
        let stats = MeanStd::from_values(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert_relative_eq!(stats.mean, 5.0);
        assert_relative_eq!(stats.std, 2.0);
    }

    #[test]
    fn test_round_trip() {
        let stats = MeanStd::from_values(&[10.0, 20.0, 30.0]).unwrap();
        for v in [10.0, 17.5, 30.0] {
            assert_relative_eq!(stats.denormalize(stats.normalize(v)), v, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_constant_column() {
        let stats = MeanStd::from_values(&[3.0, 3.0, 3.0]).unwrap();
        assert_eq!(stats.std, 1.0);
        assert_eq!(stats.normalize(3.0), 0.0);
    }

    #[test]
    fn test_empty_series() {
        assert!(MeanStd::from_values(&[]).is_err());
        assert!(MeanStd::from_values(&[1.0, f64::NAN]).is_err());
    }
}
