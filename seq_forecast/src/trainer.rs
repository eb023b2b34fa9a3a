//! Epoch-based training and evaluation
//!
//! One run goes `Init -> (TrainEpoch -> EvalEpoch) x num_epochs -> Finalize`.
//! Per-epoch losses are recorded in the normalised units the model trains
//! in; the final validation metrics are reported in raw target units so
//! they can be compared with the baseline.

use crate::config::{ConfigUpdate, TrainConfig};
use crate::data::Table;
use crate::error::{ForecastError, Result};
use crate::impute::{DropIncomplete, ImputePipeline, Imputer, RollingMeanFill};
use crate::metrics::{self, EpochMetrics, EpochSummary, TrainProcess, TrainResult, ValidResult};
use crate::nn::{
    mse_loss, AdamW, LstmModel, LstmNet, ModelKind, ModelParams, Optimizer, SequenceModel,
    TrainBackend,
};
use crate::registry;
use crate::trained::{PredictionInput, TrainedModel};
use crate::window::{Normalization, WindowLoader, WindowedDataset};
use forecast_math::stats::MeanStd;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::Path;

/// One optimisation pass over `loader`; only the loss is accumulated
pub fn train_epoch<M, O>(
    model: &mut M,
    optimizer: &mut O,
    loader: &WindowLoader<'_>,
) -> Result<EpochSummary>
where
    M: SequenceModel + ?Sized,
    O: Optimizer<M::Net>,
{
    model.train_mode();
    let mut epoch = EpochMetrics::new();

    for batch in loader.iter() {
        let batch = batch?;
        let step = model.step(batch.inputs.view(), batch.targets.view(), optimizer)?;
        epoch.record_loss(batch.len(), step.loss);
    }

    epoch.finalize()
}

/// One inference pass over `loader` without parameter updates
pub fn eval_epoch<M>(model: &mut M, loader: &WindowLoader<'_>) -> Result<EpochSummary>
where
    M: SequenceModel + ?Sized,
{
    model.eval_mode();
    let mut epoch = EpochMetrics::new();

    for batch in loader.iter() {
        let batch = batch?;
        let output = model.forward(batch.inputs.view())?;
        let loss = mse_loss(output.view(), batch.targets.view())?;
        let (mae, mape) = metrics::batch_errors(output.view(), batch.targets.view())?;
        epoch.record(batch.len(), loss, mae, mape);
    }

    epoch.finalize()
}

/// Final validation pass.
///
/// With `target_stats` set, predictions and targets are mapped back to raw
/// units before the metrics are computed.
pub fn evaluate<M>(
    model: &mut M,
    loader: &WindowLoader<'_>,
    target_stats: Option<MeanStd>,
) -> Result<ValidResult>
where
    M: SequenceModel + ?Sized,
{
    model.eval_mode();
    let mut epoch = EpochMetrics::new();
    let raw = |mut values: Array2<f64>| {
        if let Some(stats) = target_stats {
            values.mapv_inplace(|v| stats.denormalize(v));
        }
        values
    };

    for batch in loader.iter() {
        let batch = batch?;
        let output = raw(model.forward(batch.inputs.view())?);
        let targets = raw(batch.targets);
        let loss = mse_loss(output.view(), targets.view())?;
        let (mae, mape) = metrics::batch_errors(output.view(), targets.view())?;
        epoch.record(output.nrows(), loss, mae, mape);
    }

    let summary = epoch.finalize()?;
    Ok(ValidResult {
        valid_loss: summary.loss,
        valid_mae: summary.mae,
        valid_mape: summary.mape,
    })
}

/// Drives a full training run from a [`TrainConfig`]
#[derive(Debug, Default)]
pub struct Trainer {
    config: TrainConfig,
    model: Option<TrainedModel>,
    result: Option<TrainResult>,
}

impl Trainer {
    /// Create a trainer with the given configuration
    pub fn new(config: TrainConfig) -> Self {
        Self {
            config,
            model: None,
            result: None,
        }
    }

    /// Current configuration
    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    /// Merge a partial configuration into the current one
    pub fn update_params(&mut self, update: ConfigUpdate) {
        self.config.merge(update);
    }

    /// Architecture the configuration describes for `input_size` features
    pub fn model_params(&self, input_size: usize) -> ModelParams {
        ModelParams {
            input_size,
            hidden_size: self.config.hidden_size,
            num_layers: self.config.num_layers,
            output_size: self.config.n_out,
        }
    }

    /// Load the configured `data_path` and train on it
    pub fn fit(&mut self) -> Result<TrainResult> {
        let path = self.config.data_path.clone().ok_or_else(|| {
            ForecastError::InvalidParameter("data_path is not set".to_string())
        })?;
        let table = Table::from_csv(&path)?;
        self.fit_table(&table)
    }

    /// Clean `table`, build both splits and run every epoch
    pub fn fit_table(&mut self, table: &Table) -> Result<TrainResult> {
        let config = &self.config;
        config.validate()?;

        let mut pipeline = ImputePipeline::new();
        if !config.fill_columns.is_empty() {
            pipeline = pipeline.with_step(RollingMeanFill::new(config.fill_columns.clone()));
        }
        if config.drop_incomplete {
            pipeline = pipeline.with_step(DropIncomplete::new());
        }
        let cleaned = pipeline.fit_transform(table.clone())?;

        let train_set = WindowedDataset::new(&cleaned, &config.train_spec(), Normalization::Fit)?;
        let stats = train_set.mean_std().cloned().ok_or_else(|| {
            ForecastError::TrainingError("training split has no normalization stats".to_string())
        })?;
        let valid_set = WindowedDataset::new(
            &cleaned,
            &config.valid_spec(),
            Normalization::Apply(stats.clone()),
        )?;
        for (name, split) in [("training", &train_set), ("validation", &valid_set)] {
            if split.is_empty() {
                return Err(ForecastError::EmptySplit(format!(
                    "{} split has {} rows, fewer than n_in + n_out = {}",
                    name,
                    split.num_rows(),
                    config.n_in + config.n_out
                )));
            }
        }

        let params = self.model_params(train_set.num_features());
        let mut model = LstmModel::new(params, config.dropout, config.seed)?;
        let mut optimizer =
            AdamW::new::<LstmNet<TrainBackend>>(config.learning_rate, config.weight_decay);
        let mut rng = StdRng::seed_from_u64(config.seed);

        tracing::info!(
            train_windows = train_set.len(),
            valid_windows = valid_set.len(),
            features = params.input_size,
            epochs = config.num_epochs,
            "starting training"
        );

        let valid_loader = valid_set.sequential(config.batch_size)?;
        let mut process = TrainProcess::default();
        for epoch in 1..=config.num_epochs {
            let train_loader = train_set
                .shuffled(config.batch_size, &mut rng)?
                .drop_last(config.drop_last);
            let train = train_epoch(&mut model, &mut optimizer, &train_loader)?;
            let valid = eval_epoch(&mut model, &valid_loader)?;

            tracing::info!(
                epoch,
                train_loss = train.loss,
                valid_loss = valid.loss,
                "epoch {}/{} complete",
                epoch,
                config.num_epochs
            );
            process.train_loss.push(train.loss);
            process.valid_loss.push(valid.loss);
        }

        let valid_result = evaluate(&mut model, &valid_loader, train_set.target_stats())?;
        tracing::info!(
            valid_loss = valid_result.valid_loss,
            valid_mae = valid_result.valid_mae,
            valid_mape = valid_result.valid_mape,
            "training complete"
        );

        let result = TrainResult {
            model: ModelKind::Lstm.to_string(),
            valid_result,
            train_process: process,
        };
        self.model = Some(TrainedModel::new(
            model,
            config.n_in,
            train_set.feature_columns().to_vec(),
            train_set.target_column().to_string(),
            Some(stats),
        )?);
        self.result = Some(result.clone());
        Ok(result)
    }

    /// The model of the last successful fit or load
    pub fn model(&self) -> Option<&TrainedModel> {
        self.model.as_ref()
    }

    /// Hand the trained model over to the caller
    pub fn into_model(self) -> Option<TrainedModel> {
        self.model
    }

    /// Report of the last successful fit
    pub fn result(&self) -> Option<&TrainResult> {
        self.result.as_ref()
    }

    /// Persist the trained model to `path`
    pub fn save_model<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let model = self.model.as_ref().ok_or_else(not_fitted)?;
        registry::save_model(path, model)
    }

    /// Load a model persisted for this configuration with `input_size` features
    pub fn load_model<P: AsRef<Path>>(
        &mut self,
        path: P,
        input_size: usize,
    ) -> Result<&TrainedModel> {
        let params = self.model_params(input_size);
        let model = registry::load_model(path, ModelKind::Lstm, &params)?;
        Ok(self.model.insert(model))
    }

    /// Forecast raw target values with the current model
    pub fn predict(&mut self, input: PredictionInput) -> Result<Array2<f64>> {
        self.model.as_mut().ok_or_else(not_fitted)?.predict(input)
    }
}

fn not_fitted() -> ForecastError {
    ForecastError::NotFitted("no trained model; call fit or load_model first".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::{Mode, StepOutput};
    use crate::window::WindowSpec;
    use approx::assert_relative_eq;
    use burn::optim::GradientsParams;
    use ndarray::{Array2, ArrayView2, ArrayView3, Axis};
    use polars::prelude::*;

    /// Predicts a fixed value
    struct ConstantModel {
        params: ModelParams,
        value: f64,
        mode: Mode,
    }

    impl ConstantModel {
        fn new(value: f64, n_out: usize) -> Self {
            Self {
                params: ModelParams {
                    input_size: 1,
                    hidden_size: 1,
                    num_layers: 1,
                    output_size: n_out,
                },
                value,
                mode: Mode::Eval,
            }
        }
    }

    impl SequenceModel for ConstantModel {
        type Net = ();

        fn params(&self) -> &ModelParams {
            &self.params
        }

        fn forward(&mut self, inputs: ArrayView3<'_, f64>) -> Result<Array2<f64>> {
            Ok(Array2::from_elem(
                (inputs.len_of(Axis(0)), self.params.output_size),
                self.value,
            ))
        }

        fn step(
            &mut self,
            inputs: ArrayView3<'_, f64>,
            targets: ArrayView2<'_, f64>,
            optimizer: &mut dyn Optimizer<()>,
        ) -> Result<StepOutput> {
            let predictions = self.forward(inputs)?;
            let loss = mse_loss(predictions.view(), targets)?;
            optimizer.step((), GradientsParams::new());
            Ok(StepOutput { loss, predictions })
        }

        fn set_mode(&mut self, mode: Mode) {
            self.mode = mode;
        }

        fn mode(&self) -> Mode {
            self.mode
        }
    }

    #[derive(Default)]
    struct CountingOptimizer {
        steps: usize,
    }

    impl Optimizer<()> for CountingOptimizer {
        fn step(&mut self, _net: (), _grads: GradientsParams) {
            self.steps += 1;
        }
    }

    /// Single feature column `x` whose value at row i is i
    fn ramp(rows: usize) -> WindowedDataset {
        let df = DataFrame::new(vec![Series::new(
            "x",
            (0..rows).map(|i| i as f64).collect::<Vec<_>>(),
        )])
        .unwrap();
        let table = Table::from_dataframe(df).unwrap();
        WindowedDataset::new(&table, &WindowSpec::new(1, 1), Normalization::None).unwrap()
    }

    #[test]
    fn test_eval_epoch_weights_by_batch_size() {
        // 5 windows with targets 1..=5, batches of 3 and 2
        let dataset = ramp(6);
        let loader = dataset.sequential(3).unwrap();
        let mut model = ConstantModel::new(0.0, 1);

        let summary = eval_epoch(&mut model, &loader).unwrap();
        let first = (1.0 + 4.0 + 9.0) / 3.0;
        let second = (16.0 + 25.0) / 2.0;
        assert_relative_eq!(summary.loss, (3.0 * first + 2.0 * second) / 5.0);
        assert_eq!(summary.samples, 5);
        assert_eq!(model.mode(), Mode::Eval);
    }

    #[test]
    fn test_train_epoch_steps_optimizer_per_batch() {
        // 5 windows in batches of 2, 2 and 1
        let dataset = ramp(6);
        let loader = dataset.sequential(2).unwrap();
        let mut model = ConstantModel::new(0.0, 1);
        let mut optimizer = CountingOptimizer::default();

        let summary = train_epoch(&mut model, &mut optimizer, &loader).unwrap();
        assert_eq!(optimizer.steps, 3);
        assert_eq!(model.mode(), Mode::Train);

        let weighted = 2.0 * (1.0 + 4.0) / 2.0 + 2.0 * (9.0 + 16.0) / 2.0 + 25.0;
        assert_relative_eq!(summary.loss, weighted / 5.0);
        assert_eq!(summary.mape, 0.0);
    }

    #[test]
    fn test_lstm_trains_through_epoch_helpers() {
        let dataset = ramp(12);
        let loader = dataset.sequential(4).unwrap();
        let params = ModelParams {
            input_size: 1,
            hidden_size: 3,
            num_layers: 1,
            output_size: 1,
        };
        let mut model = LstmModel::new(params, 0.0, 2).unwrap();
        let mut optimizer = AdamW::new::<LstmNet<TrainBackend>>(1e-2, 0.0);

        let summary = train_epoch(&mut model, &mut optimizer, &loader).unwrap();
        assert_eq!(optimizer.steps(), 3);
        assert_eq!(summary.samples, 11);
        assert!(eval_epoch(&mut model, &loader).unwrap().loss.is_finite());
    }

    #[test]
    fn test_drop_last_can_empty_an_epoch() {
        let dataset = ramp(3);
        let loader = dataset.sequential(4).unwrap().drop_last(true);
        let mut model = ConstantModel::new(0.0, 1);
        assert!(matches!(
            eval_epoch(&mut model, &loader),
            Err(ForecastError::EmptySplit(_))
        ));
    }

    #[test]
    fn test_evaluate_reports_raw_units() {
        let dataset = ramp(4);
        let loader = dataset.sequential(8).unwrap();
        let mut model = ConstantModel::new(0.0, 1);
        let stats = MeanStd { mean: 10.0, std: 2.0 };

        // raw predictions are 10, raw targets are 12, 14, 16
        let result = evaluate(&mut model, &loader, Some(stats)).unwrap();
        assert_relative_eq!(result.valid_mae, 4.0);
        assert_relative_eq!(result.valid_loss, (4.0 + 16.0 + 36.0) / 3.0);
        assert_relative_eq!(
            result.valid_mape,
            (2.0 / 12.0 + 4.0 / 14.0 + 6.0 / 16.0) / 3.0
        );
    }

    #[test]
    fn test_predict_before_fit() {
        let mut trainer = Trainer::default();
        let window = Array2::zeros((3, 1));
        assert!(matches!(
            trainer.predict(window.into()),
            Err(ForecastError::NotFitted(_))
        ));
        assert!(trainer.save_model("unused.json").is_err());
    }

    #[test]
    fn test_fit_without_data_path() {
        let mut trainer = Trainer::default();
        assert!(matches!(
            trainer.fit(),
            Err(ForecastError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_update_params_merges() {
        let mut trainer = Trainer::default();
        trainer.update_params(ConfigUpdate {
            hidden_size: Some(8),
            ..Default::default()
        });
        assert_eq!(trainer.config().hidden_size, 8);
        assert_eq!(trainer.model_params(4).output_size, 3);
    }
}
