//! Trained sequence model bundled with everything inference needs

use crate::data::Table;
use crate::error::{ForecastError, Result};
use crate::nn::{LstmModel, SequenceModel};
use crate::window::NormalizationStats;
use ndarray::{Array2, Array3, Axis};

/// Raw rows to forecast from
#[derive(Debug, Clone)]
pub enum PredictionInput {
    /// `batch x n_in x features` block of raw values
    Block(Array3<f64>),
    /// One `rows x features` window; the freshest `n_in` rows are used
    Window(Array2<f64>),
    /// A table holding the feature columns; the freshest `n_in` rows are used
    Table(Table),
}

impl From<Array3<f64>> for PredictionInput {
    fn from(block: Array3<f64>) -> Self {
        PredictionInput::Block(block)
    }
}

impl From<Array2<f64>> for PredictionInput {
    fn from(window: Array2<f64>) -> Self {
        PredictionInput::Window(window)
    }
}

impl From<Table> for PredictionInput {
    fn from(table: Table) -> Self {
        PredictionInput::Table(table)
    }
}

/// A fitted sequence model and the data layout it was fitted on
#[derive(Debug, Clone)]
pub struct TrainedModel {
    pub(crate) model: LstmModel,
    pub(crate) n_in: usize,
    pub(crate) feature_columns: Vec<String>,
    pub(crate) target_column: String,
    pub(crate) stats: Option<NormalizationStats>,
}

impl TrainedModel {
    /// Bundle a model with its input layout
    pub fn new(
        model: LstmModel,
        n_in: usize,
        feature_columns: Vec<String>,
        target_column: String,
        stats: Option<NormalizationStats>,
    ) -> Result<Self> {
        if feature_columns.len() != model.params().input_size {
            return Err(ForecastError::SchemaMismatch(format!(
                "model expects {} features, {} columns given",
                model.params().input_size,
                feature_columns.len()
            )));
        }
        if !feature_columns.contains(&target_column) {
            return Err(ForecastError::ColumnNotFound(target_column));
        }
        if let Some(stats) = &stats {
            stats.ensure_columns(&feature_columns)?;
        }

        Ok(Self {
            model,
            n_in,
            feature_columns,
            target_column,
            stats,
        })
    }

    /// The underlying network
    pub fn model(&self) -> &LstmModel {
        &self.model
    }

    /// Input rows per window
    pub fn n_in(&self) -> usize {
        self.n_in
    }

    /// Forecast horizon
    pub fn n_out(&self) -> usize {
        self.model.params().output_size
    }

    /// Feature columns in input order
    pub fn feature_columns(&self) -> &[String] {
        &self.feature_columns
    }

    /// Forecast column
    pub fn target_column(&self) -> &str {
        &self.target_column
    }

    /// Training-split normalisation stats, if the model was fitted on scaled data
    pub fn stats(&self) -> Option<&NormalizationStats> {
        self.stats.as_ref()
    }

    /// Forecast `batch x n_out` raw target values from raw inputs
    pub fn predict(&mut self, input: PredictionInput) -> Result<Array2<f64>> {
        let mut block = match input {
            PredictionInput::Block(block) => block,
            PredictionInput::Window(window) => self.freshest(window)?.insert_axis(Axis(0)),
            PredictionInput::Table(table) => {
                let rows = table.tail(self.n_in).to_matrix(&self.feature_columns)?;
                self.freshest(rows)?.insert_axis(Axis(0))
            }
        };

        let (batch, steps, features) = block.dim();
        if steps != self.n_in || features != self.feature_columns.len() {
            return Err(ForecastError::SchemaMismatch(format!(
                "expected windows of {} x {}, got {} x {}",
                self.n_in,
                self.feature_columns.len(),
                steps,
                features
            )));
        }

        if let Some(stats) = &self.stats {
            let mut rows = block
                .as_standard_layout()
                .into_owned()
                .into_shape((batch * steps, features))?;
            stats.normalize(&mut rows)?;
            block = rows.into_shape((batch, steps, features))?;
        }

        self.model.eval_mode();
        let mut forecast = self.model.forward(block.view())?;

        if let Some(stats) = &self.stats {
            let target = stats.column(&self.target_column)?;
            forecast.mapv_inplace(|v| target.denormalize(v));
        }
        Ok(forecast)
    }

    /// Last `n_in` rows of a raw window
    fn freshest(&self, rows: Array2<f64>) -> Result<Array2<f64>> {
        if rows.nrows() < self.n_in {
            return Err(ForecastError::EmptySplit(format!(
                "need {} rows to build a window, got {}",
                self.n_in,
                rows.nrows()
            )));
        }
        let start = rows.nrows() - self.n_in;
        Ok(rows.slice_move(ndarray::s![start.., ..]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::ModelParams;
    use approx::assert_relative_eq;
    use forecast_math::stats::MeanStd;
    use ndarray::array;

    fn columns() -> Vec<String> {
        vec!["a".to_string(), "b".to_string()]
    }

    fn trained(stats: Option<NormalizationStats>) -> TrainedModel {
        let params = ModelParams {
            input_size: 2,
            hidden_size: 4,
            num_layers: 1,
            output_size: 2,
        };
        let model = LstmModel::new(params, 0.0, 9).unwrap();
        TrainedModel::new(model, 3, columns(), "b".to_string(), stats).unwrap()
    }

    fn stats() -> NormalizationStats {
        let raw = array![[1.0, 10.0], [2.0, 20.0], [3.0, 30.0], [4.0, 40.0]];
        NormalizationStats::fit(&columns(), raw.view()).unwrap()
    }

    #[test]
    fn test_window_promoted_to_batch_of_one() {
        let mut model = trained(None);
        let window = array![[0.0, 1.0], [0.5, 1.5], [1.0, 2.0]];
        let forecast = model.predict(window.into()).unwrap();
        assert_eq!(forecast.dim(), (1, 2));
    }

    #[test]
    fn test_longer_window_uses_freshest_rows() {
        let mut model = trained(None);
        let long = array![[9.0, 9.0], [0.0, 1.0], [0.5, 1.5], [1.0, 2.0]];
        let short = array![[0.0, 1.0], [0.5, 1.5], [1.0, 2.0]];
        assert_eq!(
            model.predict(long.into()).unwrap(),
            model.predict(short.into()).unwrap()
        );
    }

    #[test]
    fn test_too_few_rows() {
        let mut model = trained(None);
        let window = array![[0.0, 1.0]];
        assert!(matches!(
            model.predict(window.into()),
            Err(ForecastError::EmptySplit(_))
        ));
    }

    #[test]
    fn test_block_shape_checked() {
        let mut model = trained(None);
        let block = Array3::zeros((2, 3, 5));
        assert!(matches!(
            model.predict(block.into()),
            Err(ForecastError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_output_is_denormalized_with_target_stats() {
        let stats = stats();
        let target: MeanStd = stats.column("b").unwrap();
        let raw = array![[1.0, 10.0], [2.0, 20.0], [3.0, 30.0]];

        let mut scaled_model = trained(Some(stats.clone()));
        let forecast = scaled_model.predict(raw.clone().into()).unwrap();

        let mut plain = trained(None);
        let mut normalized = raw.clone();
        stats.normalize(&mut normalized).unwrap();
        let expected = plain.predict(normalized.into()).unwrap();

        for (got, want) in forecast.iter().zip(expected.iter()) {
            assert_relative_eq!(*got, target.denormalize(*want), epsilon = 1e-12);
        }
    }
}
