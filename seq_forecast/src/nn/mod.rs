//! Trainable sequence regressors
//!
//! The trainer only sees the [`SequenceModel`] and [`Optimizer`]
//! capabilities; any architecture that maps `batch x n_in x features`
//! to `batch x output_size` and can take an optimisation step fits.
//! Networks are burn modules on the ndarray backend, trained through
//! burn's autodiff decorator.

use crate::error::{ForecastError, Result};
use burn::backend::{Autodiff, NdArray};
use ndarray::{Array2, ArrayView2, ArrayView3};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod lstm;
pub mod optim;

pub use lstm::{LstmModel, LstmNet, LstmNetConfig};
pub use optim::{AdamW, Optimizer};

/// Backend used for inference
pub type CpuBackend = NdArray<f32>;

/// Backend used for training
pub type TrainBackend = Autodiff<CpuBackend>;

/// Whether stochastic layers are active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Dropout active
    Train,
    /// Deterministic inference
    #[default]
    Eval,
}

/// Architecture bundle used to build and to validate a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelParams {
    /// Features per time step
    pub input_size: usize,
    /// Hidden state width per layer
    pub hidden_size: usize,
    /// Stacked recurrent layers
    pub num_layers: usize,
    /// Values predicted per window
    pub output_size: usize,
}

impl ModelParams {
    /// Fail on zero-sized dimensions
    pub fn validate(&self) -> Result<()> {
        if self.input_size == 0
            || self.hidden_size == 0
            || self.num_layers == 0
            || self.output_size == 0
        {
            return Err(ForecastError::InvalidParameter(format!(
                "model dimensions must be positive: {:?}",
                self
            )));
        }
        Ok(())
    }
}

/// Tag identifying a persisted model family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    /// Stacked LSTM with a linear head
    Lstm,
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelKind::Lstm => write!(f, "lstm"),
        }
    }
}

impl FromStr for ModelKind {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "lstm" => Ok(ModelKind::Lstm),
            other => Err(ForecastError::InvalidParameter(format!(
                "unknown model kind '{}'",
                other
            ))),
        }
    }
}

/// Outcome of one optimisation step
#[derive(Debug, Clone)]
pub struct StepOutput {
    /// Mean squared error of the batch before the update
    pub loss: f64,
    /// `batch x output_size` predictions the loss was computed on
    pub predictions: Array2<f64>,
}

/// A differentiable map from input windows to forecasts
pub trait SequenceModel {
    /// Parameter container the optimiser updates
    type Net;

    /// Architecture of the model
    fn params(&self) -> &ModelParams;

    /// Map `batch x n_in x input_size` to `batch x output_size` without
    /// touching the parameters
    fn forward(&mut self, inputs: ArrayView3<'_, f64>) -> Result<Array2<f64>>;

    /// Forward `inputs`, backpropagate the mean squared error against
    /// `targets` and let `optimizer` apply one update
    fn step(
        &mut self,
        inputs: ArrayView3<'_, f64>,
        targets: ArrayView2<'_, f64>,
        optimizer: &mut dyn Optimizer<Self::Net>,
    ) -> Result<StepOutput>;

    /// Switch between training and inference behaviour
    fn set_mode(&mut self, mode: Mode);

    /// Current mode
    fn mode(&self) -> Mode;

    /// Shorthand for `set_mode(Mode::Train)`
    fn train_mode(&mut self) {
        self.set_mode(Mode::Train);
    }

    /// Shorthand for `set_mode(Mode::Eval)`
    fn eval_mode(&mut self) {
        self.set_mode(Mode::Eval);
    }
}

/// Mean squared error over every element
pub fn mse_loss(pred: ArrayView2<'_, f64>, target: ArrayView2<'_, f64>) -> Result<f64> {
    if pred.shape() != target.shape() {
        return Err(ForecastError::SchemaMismatch(format!(
            "prediction shape {:?} does not match target shape {:?}",
            pred.shape(),
            target.shape()
        )));
    }
    if pred.is_empty() {
        return Err(ForecastError::EmptySplit(
            "cannot compute a loss over an empty batch".to_string(),
        ));
    }

    let diff = &pred - &target;
    Ok(diff.mapv(|d| d * d).sum() / pred.len() as f64)
}
