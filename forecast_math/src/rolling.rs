//! Trailing rolling-window statistics over series with gaps
//!
//! Missing observations are represented as `None`. A window produces a value
//! once it holds at least `min_periods` observed values, otherwise `None`.

use crate::{MathError, Result};
use std::collections::VecDeque;

/// Trailing rolling mean that tolerates missing observations
#[derive(Debug, Clone)]
pub struct RollingMean {
    window: usize,
    min_periods: usize,
    values: VecDeque<Option<f64>>,
    sum: f64,
    observed: usize,
}

impl RollingMean {
    /// Create a new rolling mean over `window` rows requiring `min_periods`
    /// observed values before producing output
    pub fn new(window: usize, min_periods: usize) -> Result<Self> {
        if window == 0 {
            return Err(MathError::InvalidInput(
                "Window must be greater than zero".to_string(),
            ));
        }
        if min_periods == 0 || min_periods > window {
            return Err(MathError::InvalidInput(format!(
                "min_periods must be in 1..={}, got {}",
                window, min_periods
            )));
        }

        Ok(Self {
            window,
            min_periods,
            values: VecDeque::with_capacity(window),
            sum: 0.0,
            observed: 0,
        })
    }

    /// Push the next row and return the mean of the trailing window
    pub fn update(&mut self, value: Option<f64>) -> Option<f64> {
        self.values.push_back(value);
        if let Some(v) = value {
            self.sum += v;
            self.observed += 1;
        }

        if self.values.len() > self.window {
            if let Some(Some(old)) = self.values.pop_front() {
                self.sum -= old;
                self.observed -= 1;
            }
        }

        self.value()
    }

    /// Current window mean, if enough values have been observed
    pub fn value(&self) -> Option<f64> {
        if self.observed >= self.min_periods {
            Some(self.sum / self.observed as f64)
        } else {
            None
        }
    }

    /// Get the window size
    pub fn window(&self) -> usize {
        self.window
    }

    /// Reset, clearing all values
    pub fn reset(&mut self) {
        self.values.clear();
        self.sum = 0.0;
        self.observed = 0;
    }
}

/// Trailing rolling mean of a whole series.
///
/// Output has the same length as `values`; position `i` averages the
/// observed values in rows `i + 1 - window ..= i`.
pub fn rolling_mean(
    values: &[Option<f64>],
    window: usize,
    min_periods: usize,
) -> Result<Vec<Option<f64>>> {
    let mut roll = RollingMean::new(window, min_periods)?;
    Ok(values.iter().map(|v| roll.update(*v)).collect())
}
