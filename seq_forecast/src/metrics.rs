//! Forecast error metrics and the training report schema
//!
//! Epoch figures are sample-weighted: every batch contributes its mean
//! metric times its number of windows, and the epoch value is the weighted
//! sum divided by the total window count.

use crate::error::{ForecastError, Result};
use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

/// Mean squared error between `actual` and `predicted`
pub fn mse(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    mean_of(actual, predicted, |a, p| (p - a).powi(2))
}

/// Mean absolute error between `actual` and `predicted`
pub fn mae(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    mean_of(actual, predicted, |a, p| (p - a).abs())
}

/// Mean absolute percentage error, as a fraction.
///
/// Each term is `|p - a| / max(|a|, f64::EPSILON)`, so a zero actual yields a
/// very large but finite term.
pub fn mape(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    mean_of(actual, predicted, |a, p| (p - a).abs() / a.abs().max(f64::EPSILON))
}

fn mean_of<F>(actual: &[f64], predicted: &[f64], term: F) -> Result<f64>
where
    F: Fn(f64, f64) -> f64,
{
    if actual.len() != predicted.len() {
        return Err(ForecastError::SchemaMismatch(format!(
            "{} actual values but {} predictions",
            actual.len(),
            predicted.len()
        )));
    }
    if actual.is_empty() {
        return Err(ForecastError::EmptySplit(
            "no values to compare".to_string(),
        ));
    }

    let sum: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| term(*a, *p))
        .sum();
    Ok(sum / actual.len() as f64)
}

/// Per-batch MAE and MAPE over every element of a `batch x n_out` block
pub fn batch_errors(
    pred: ArrayView2<'_, f64>,
    target: ArrayView2<'_, f64>,
) -> Result<(f64, f64)> {
    if pred.shape() != target.shape() {
        return Err(ForecastError::SchemaMismatch(format!(
            "prediction shape {:?} does not match target shape {:?}",
            pred.shape(),
            target.shape()
        )));
    }
    let pred: Vec<f64> = pred.iter().copied().collect();
    let target: Vec<f64> = target.iter().copied().collect();
    Ok((mae(&target, &pred)?, mape(&target, &pred)?))
}

/// Sample-weighted accumulator for one epoch
#[derive(Debug, Clone, Default)]
pub struct EpochMetrics {
    loss: f64,
    mae: f64,
    mape: f64,
    samples: usize,
}

/// Averages produced by [`EpochMetrics::finalize`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochSummary {
    pub loss: f64,
    pub mae: f64,
    pub mape: f64,
    pub samples: usize,
}

impl EpochMetrics {
    /// Start an empty epoch
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one batch of `batch_size` windows with its mean metrics
    pub fn record(&mut self, batch_size: usize, loss: f64, mae: f64, mape: f64) {
        let weight = batch_size as f64;
        self.loss += loss * weight;
        self.mae += mae * weight;
        self.mape += mape * weight;
        self.samples += batch_size;
    }

    /// Add one batch whose loss is the only figure of interest
    pub fn record_loss(&mut self, batch_size: usize, loss: f64) {
        self.loss += loss * batch_size as f64;
        self.samples += batch_size;
    }

    /// Windows seen so far
    pub fn samples(&self) -> usize {
        self.samples
    }

    /// Divide the weighted sums by the sample count
    pub fn finalize(&self) -> Result<EpochSummary> {
        if self.samples == 0 {
            return Err(ForecastError::EmptySplit(
                "epoch produced no samples; check the date range, n_in, n_out and drop_last"
                    .to_string(),
            ));
        }

        let n = self.samples as f64;
        Ok(EpochSummary {
            loss: self.loss / n,
            mae: self.mae / n,
            mape: self.mape / n,
            samples: self.samples,
        })
    }
}

/// Final validation metrics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidResult {
    pub valid_loss: f64,
    pub valid_mae: f64,
    pub valid_mape: f64,
}

/// Per-epoch loss history; empty for non-iterative models
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainProcess {
    #[serde(default)]
    pub train_loss: Vec<f64>,
    #[serde(default)]
    pub valid_loss: Vec<f64>,
}

impl TrainProcess {
    /// Whether no epochs were recorded
    pub fn is_empty(&self) -> bool {
        self.train_loss.is_empty() && self.valid_loss.is_empty()
    }
}

/// Report shared by every model family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainResult {
    /// Model name
    pub model: String,
    pub valid_result: ValidResult,
    #[serde(default)]
    pub train_process: TrainProcess,
}

impl TrainResult {
    /// Pretty JSON rendering of the report
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
