//! Classical baseline reported in the same schema as the trainer

use crate::data::Table;
use crate::error::{ForecastError, Result};
use crate::metrics::{self, TrainProcess, TrainResult, ValidResult};
use crate::models::{ArimaModel, ForecastModel, TrainedArimaModel, TrainedForecastModel};

/// Name reported in [`TrainResult::model`]
pub const BASELINE_NAME: &str = "arima";

#[derive(Debug, Clone)]
struct FittedBaseline {
    trained: TrainedArimaModel,
    labels: Vec<f64>,
}

/// ARIMA fitted on all but the last `n_out` rows of the target column,
/// evaluated on those held-out rows
#[derive(Debug, Clone)]
pub struct BaselineModel {
    model: ArimaModel,
    n_out: usize,
    target_column: Option<String>,
    fitted: Option<FittedBaseline>,
}

impl BaselineModel {
    /// ARIMA(2,1,1) holding out the last `n_out` rows
    pub fn arima(n_out: usize) -> Self {
        Self::new(ArimaModel::default(), n_out)
    }

    /// Wrap any ARIMA order
    pub fn new(model: ArimaModel, n_out: usize) -> Self {
        Self {
            model,
            n_out,
            target_column: None,
            fitted: None,
        }
    }

    /// Forecast a specific column instead of the last numeric one
    pub fn with_target(mut self, target_column: Option<String>) -> Self {
        self.target_column = target_column;
        self
    }

    /// Held-out horizon
    pub fn n_out(&self) -> usize {
        self.n_out
    }

    /// Held-out label values, once fitted
    pub fn labels(&self) -> Option<&[f64]> {
        self.fitted.as_ref().map(|f| f.labels.as_slice())
    }

    /// Split `table` chronologically and fit on the leading rows
    pub fn fit(&mut self, table: &Table) -> Result<()> {
        if self.n_out == 0 {
            return Err(ForecastError::InvalidParameter(
                "n_out must be positive".to_string(),
            ));
        }

        let target = match &self.target_column {
            Some(name) => name.clone(),
            None => table
                .feature_columns()
                .last()
                .cloned()
                .ok_or_else(|| {
                    ForecastError::DataError("Table has no feature columns".to_string())
                })?,
        };
        let series = table.complete_values(&target)?;
        if series.len() <= self.n_out {
            return Err(ForecastError::EmptySplit(format!(
                "{} rows leave nothing to fit after holding out {}",
                series.len(),
                self.n_out
            )));
        }

        let (fit_set, labels) = series.split_at(series.len() - self.n_out);
        let trained = self.model.train(fit_set)?;
        tracing::info!(
            model = self.model.name(),
            target = %target,
            fit_rows = fit_set.len(),
            held_out = labels.len(),
            "fitted baseline"
        );

        self.fitted = Some(FittedBaseline {
            trained,
            labels: labels.to_vec(),
        });
        Ok(())
    }

    /// `steps` point forecasts continuing the fit set
    pub fn predict(&self, steps: usize) -> Result<Vec<f64>> {
        let fitted = self.fitted.as_ref().ok_or_else(|| {
            ForecastError::NotFitted("baseline must be fitted before predicting".to_string())
        })?;
        Ok(fitted.trained.forecast(steps)?.into_values())
    }

    /// Held-out metrics with an empty training history
    pub fn get_metrics(&self) -> Result<TrainResult> {
        let predictions = self.predict(self.n_out)?;
        let labels = self.labels().unwrap_or_default();

        let valid_result = ValidResult {
            valid_loss: metrics::mse(labels, &predictions)?,
            valid_mae: metrics::mae(labels, &predictions)?,
            valid_mape: metrics::mape(labels, &predictions)?,
        };
        tracing::info!(
            valid_loss = valid_result.valid_loss,
            valid_mae = valid_result.valid_mae,
            "baseline evaluated"
        );

        Ok(TrainResult {
            model: BASELINE_NAME.to_string(),
            valid_result,
            train_process: TrainProcess::default(),
        })
    }
}
