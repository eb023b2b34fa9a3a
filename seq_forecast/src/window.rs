//! Sliding-window datasets for sequence-to-sequence training
//!
//! A window pairs `n_in` consecutive rows of every feature column with the
//! `n_out` target values that immediately follow them. When normalisation is
//! enabled both the feature block and the target block are expressed in
//! z-score units of the stats in use; the target uses its own column's
//! stats, so a forecast is mapped back with [`NormalizationStats::denormalize`].

use crate::data::Table;
use crate::error::{ForecastError, Result};
use chrono::NaiveDate;
use forecast_math::stats::MeanStd;
use ndarray::{s, Array1, Array2, Array3, ArrayView2, Axis};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Per-column z-score parameters computed from a reference (training) split
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationStats {
    columns: Vec<String>,
    stats: Vec<MeanStd>,
}

impl NormalizationStats {
    /// Compute stats for each column of `matrix` (rows x columns)
    pub fn fit(columns: &[String], matrix: ArrayView2<'_, f64>) -> Result<Self> {
        if columns.len() != matrix.ncols() {
            return Err(ForecastError::SchemaMismatch(format!(
                "{} column names for a matrix with {} columns",
                columns.len(),
                matrix.ncols()
            )));
        }

        let stats = matrix
            .axis_iter(Axis(1))
            .map(|col| MeanStd::from_values(&col.to_vec()))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Self {
            columns: columns.to_vec(),
            stats,
        })
    }

    /// Columns the stats were computed for, in order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Per-column means
    pub fn mean(&self) -> Vec<f64> {
        self.stats.iter().map(|s| s.mean).collect()
    }

    /// Per-column standard deviations
    pub fn std(&self) -> Vec<f64> {
        self.stats.iter().map(|s| s.std).collect()
    }

    /// Stats of one column
    pub fn column(&self, name: &str) -> Result<MeanStd> {
        self.columns
            .iter()
            .position(|c| c == name)
            .map(|i| self.stats[i])
            .ok_or_else(|| ForecastError::ColumnNotFound(name.to_string()))
    }

    /// Scale a `rows x columns` matrix in place
    pub fn normalize(&self, matrix: &mut Array2<f64>) -> Result<()> {
        self.check_width(matrix.ncols())?;
        for (mut col, stats) in matrix.axis_iter_mut(Axis(1)).zip(&self.stats) {
            col.mapv_inplace(|v| stats.normalize(v));
        }
        Ok(())
    }

    /// Undo [`Self::normalize`] in place
    pub fn denormalize(&self, matrix: &mut Array2<f64>) -> Result<()> {
        self.check_width(matrix.ncols())?;
        for (mut col, stats) in matrix.axis_iter_mut(Axis(1)).zip(&self.stats) {
            col.mapv_inplace(|v| stats.denormalize(v));
        }
        Ok(())
    }

    /// Fail unless the stats were computed for exactly `columns`
    pub fn ensure_columns(&self, columns: &[String]) -> Result<()> {
        if self.columns != columns {
            return Err(ForecastError::SchemaMismatch(format!(
                "normalization stats cover {:?}, data has {:?}",
                self.columns, columns
            )));
        }
        Ok(())
    }

    fn check_width(&self, width: usize) -> Result<()> {
        if width != self.stats.len() {
            return Err(ForecastError::SchemaMismatch(format!(
                "normalization stats cover {} columns, matrix has {}",
                self.stats.len(),
                width
            )));
        }
        Ok(())
    }
}

/// How a dataset scales its values
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Normalization {
    /// Keep raw values
    #[default]
    None,
    /// Compute stats from this dataset's own rows
    Fit,
    /// Reuse stats computed elsewhere, unchanged
    Apply(NormalizationStats),
}

/// Shape and row range of a windowed dataset
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSpec {
    /// Input rows per window
    pub n_in: usize,
    /// Target rows per window
    pub n_out: usize,
    /// First date to include (inclusive)
    pub start_date: Option<NaiveDate>,
    /// Last date to include (inclusive)
    pub end_date: Option<NaiveDate>,
    /// Target column; defaults to the last feature column
    pub target_column: Option<String>,
}

impl WindowSpec {
    /// Window layout over the whole table
    pub fn new(n_in: usize, n_out: usize) -> Self {
        Self {
            n_in,
            n_out,
            start_date: None,
            end_date: None,
            target_column: None,
        }
    }

    /// Restrict to an inclusive date range
    pub fn with_date_range(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.start_date = start;
        self.end_date = end;
        self
    }

    /// Forecast a specific column
    pub fn with_target(mut self, target: Option<String>) -> Self {
        self.target_column = target;
        self
    }
}

/// One input/output pair
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    /// `n_in x features` block
    pub input: Array2<f64>,
    /// The `n_out` target values following the input block
    pub output: Array1<f64>,
}

/// A group of windows stacked along a leading batch axis
#[derive(Debug, Clone)]
pub struct Batch {
    /// `batch x n_in x features`
    pub inputs: Array3<f64>,
    /// `batch x n_out`
    pub targets: Array2<f64>,
}

impl Batch {
    /// Number of windows in the batch
    pub fn len(&self) -> usize {
        self.inputs.len_of(Axis(0))
    }

    /// Whether the batch holds no windows
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Indexed collection of windows cut from a date-filtered table
#[derive(Debug, Clone)]
pub struct WindowedDataset {
    n_in: usize,
    n_out: usize,
    feature_columns: Vec<String>,
    target_column: String,
    target_index: usize,
    /// Feature rows, already scaled when normalisation is enabled
    features: Array2<f64>,
    stats: Option<NormalizationStats>,
}

impl WindowedDataset {
    /// Build a dataset from a cleaned table
    pub fn new(table: &Table, spec: &WindowSpec, normalization: Normalization) -> Result<Self> {
        if spec.n_in == 0 || spec.n_out == 0 {
            return Err(ForecastError::InvalidParameter(format!(
                "n_in and n_out must be positive, got {} and {}",
                spec.n_in, spec.n_out
            )));
        }

        let table = table.filter_dates(spec.start_date, spec.end_date)?;
        let feature_columns = table.feature_columns().to_vec();
        let target_column = match &spec.target_column {
            Some(name) => name.clone(),
            None => feature_columns
                .last()
                .cloned()
                .ok_or_else(|| {
                    ForecastError::DataError("Table has no feature columns".to_string())
                })?,
        };
        let target_index = feature_columns
            .iter()
            .position(|c| *c == target_column)
            .ok_or_else(|| ForecastError::ColumnNotFound(target_column.clone()))?;

        let mut features = table.to_matrix(&feature_columns)?;
        let stats = match normalization {
            Normalization::None => None,
            Normalization::Fit => {
                if features.nrows() == 0 {
                    return Err(ForecastError::EmptySplit(
                        "cannot compute normalization stats of an empty date range".to_string(),
                    ));
                }
                Some(NormalizationStats::fit(&feature_columns, features.view())?)
            }
            Normalization::Apply(stats) => {
                stats.ensure_columns(&feature_columns)?;
                Some(stats)
            }
        };
        if let Some(stats) = &stats {
            stats.normalize(&mut features)?;
        }

        let dataset = Self {
            n_in: spec.n_in,
            n_out: spec.n_out,
            feature_columns,
            target_column,
            target_index,
            features,
            stats,
        };

        tracing::debug!(
            rows = dataset.num_rows(),
            windows = dataset.len(),
            normalized = dataset.stats.is_some(),
            "built windowed dataset"
        );
        Ok(dataset)
    }

    /// Load a CSV and build a dataset from it
    pub fn from_csv<P: AsRef<Path>>(
        path: P,
        spec: &WindowSpec,
        normalization: Normalization,
    ) -> Result<Self> {
        Self::new(&Table::from_csv(path)?, spec, normalization)
    }

    /// Number of windows: `max(0, rows - n_in - n_out + 1)`
    pub fn len(&self) -> usize {
        (self.num_rows() + 1).saturating_sub(self.n_in + self.n_out)
    }

    /// Whether no complete window fits in the rows
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rows left after date filtering
    pub fn num_rows(&self) -> usize {
        self.features.nrows()
    }

    /// Width of the input feature space
    pub fn num_features(&self) -> usize {
        self.features.ncols()
    }

    /// Input rows per window
    pub fn n_in(&self) -> usize {
        self.n_in
    }

    /// Target rows per window
    pub fn n_out(&self) -> usize {
        self.n_out
    }

    /// Feature column names in input order
    pub fn feature_columns(&self) -> &[String] {
        &self.feature_columns
    }

    /// Name of the forecast column
    pub fn target_column(&self) -> &str {
        &self.target_column
    }

    /// The stats actually applied, if any.
    ///
    /// Pass these to a validation dataset through [`Normalization::Apply`]
    /// so both splits share the training split's units.
    pub fn mean_std(&self) -> Option<&NormalizationStats> {
        self.stats.as_ref()
    }

    /// Stats of the target column, if normalisation is enabled
    pub fn target_stats(&self) -> Option<MeanStd> {
        self.stats
            .as_ref()
            .and_then(|s| s.column(&self.target_column).ok())
    }

    /// Window `index`
    pub fn get(&self, index: usize) -> Option<Window> {
        if index >= self.len() {
            return None;
        }

        let split = index + self.n_in;
        Some(Window {
            input: self.features.slice(s![index..split, ..]).to_owned(),
            output: self
                .features
                .slice(s![split..split + self.n_out, self.target_index])
                .to_owned(),
        })
    }

    /// Stack the windows at `indices` into one batch
    pub fn batch(&self, indices: &[usize]) -> Result<Batch> {
        let mut inputs = Array3::zeros((indices.len(), self.n_in, self.num_features()));
        let mut targets = Array2::zeros((indices.len(), self.n_out));

        for (row, &index) in indices.iter().enumerate() {
            let window = self.get(index).ok_or_else(|| {
                ForecastError::InvalidParameter(format!(
                    "window index {} out of range for {} windows",
                    index,
                    self.len()
                ))
            })?;
            inputs.index_axis_mut(Axis(0), row).assign(&window.input);
            targets.row_mut(row).assign(&window.output);
        }

        Ok(Batch { inputs, targets })
    }

    /// Batches in window order
    pub fn sequential(&self, batch_size: usize) -> Result<WindowLoader<'_>> {
        WindowLoader::new(self, batch_size, (0..self.len()).collect())
    }

    /// Batches in a random order drawn from `rng`
    pub fn shuffled<R: Rng + ?Sized>(
        &self,
        batch_size: usize,
        rng: &mut R,
    ) -> Result<WindowLoader<'_>> {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.shuffle(rng);
        WindowLoader::new(self, batch_size, order)
    }
}

/// Groups a dataset's windows into fixed-size batches
#[derive(Debug, Clone)]
pub struct WindowLoader<'a> {
    dataset: &'a WindowedDataset,
    batch_size: usize,
    order: Vec<usize>,
    drop_last: bool,
}

impl<'a> WindowLoader<'a> {
    fn new(dataset: &'a WindowedDataset, batch_size: usize, order: Vec<usize>) -> Result<Self> {
        if batch_size == 0 {
            return Err(ForecastError::InvalidParameter(
                "batch_size must be positive".to_string(),
            ));
        }

        Ok(Self {
            dataset,
            batch_size,
            order,
            drop_last: false,
        })
    }

    /// Skip a final batch shorter than `batch_size`
    pub fn drop_last(mut self, drop_last: bool) -> Self {
        self.drop_last = drop_last;
        self
    }

    /// Number of batches the loader yields
    pub fn num_batches(&self) -> usize {
        if self.drop_last {
            self.order.len() / self.batch_size
        } else {
            (self.order.len() + self.batch_size - 1) / self.batch_size
        }
    }

    /// Iterate over the batches
    pub fn iter(&self) -> impl Iterator<Item = Result<Batch>> + '_ {
        self.order
            .chunks(self.batch_size)
            .filter(move |chunk| !self.drop_last || chunk.len() == self.batch_size)
            .map(move |chunk| self.dataset.batch(chunk))
    }
}
