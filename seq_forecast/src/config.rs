//! Training configuration
//!
//! [`TrainConfig`] carries every option with its default. Partial changes
//! arrive as a [`ConfigUpdate`] and are merged field by field; an unset field
//! never overwrites the current value. Optional options take a nested
//! `Option`, so an explicit JSON `null` clears them.

use crate::error::{ForecastError, Result};
use crate::window::WindowSpec;
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Full set of training options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    /// Source table location
    pub data_path: Option<PathBuf>,
    /// Input rows per window
    pub n_in: usize,
    /// Forecast horizon
    pub n_out: usize,
    pub num_epochs: usize,
    pub hidden_size: usize,
    pub num_layers: usize,
    pub batch_size: usize,
    pub train_start_date: Option<NaiveDate>,
    pub train_end_date: Option<NaiveDate>,
    pub valid_start_date: Option<NaiveDate>,
    pub valid_end_date: Option<NaiveDate>,
    /// Column to forecast; the last numeric column when unset
    pub target_column: Option<String>,
    pub learning_rate: f64,
    pub weight_decay: f64,
    /// Dropout on the read-out input during training
    pub dropout: f64,
    /// Seeds weight initialisation, shuffling and dropout
    pub seed: u64,
    /// Skip a short final training batch
    pub drop_last: bool,
    /// Columns gap-filled with a rolling mean before windowing
    pub fill_columns: Vec<String>,
    /// Drop rows still incomplete after filling
    pub drop_incomplete: bool,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            data_path: None,
            n_in: 3,
            n_out: 3,
            num_epochs: 10,
            hidden_size: 32,
            num_layers: 3,
            batch_size: 32,
            train_start_date: None,
            train_end_date: None,
            valid_start_date: None,
            valid_end_date: None,
            target_column: None,
            learning_rate: 1e-3,
            weight_decay: 1e-2,
            dropout: 0.0,
            seed: 42,
            drop_last: false,
            fill_columns: Vec::new(),
            drop_incomplete: true,
        }
    }
}

/// Partial configuration; `None` means "keep the current value".
///
/// For the optional options `Some(None)` clears the current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigUpdate {
    #[serde(deserialize_with = "clearable", skip_serializing_if = "Option::is_none")]
    pub data_path: Option<Option<PathBuf>>,
    pub n_in: Option<usize>,
    pub n_out: Option<usize>,
    pub num_epochs: Option<usize>,
    pub hidden_size: Option<usize>,
    pub num_layers: Option<usize>,
    pub batch_size: Option<usize>,
    #[serde(deserialize_with = "clearable", skip_serializing_if = "Option::is_none")]
    pub train_start_date: Option<Option<NaiveDate>>,
    #[serde(deserialize_with = "clearable", skip_serializing_if = "Option::is_none")]
    pub train_end_date: Option<Option<NaiveDate>>,
    #[serde(deserialize_with = "clearable", skip_serializing_if = "Option::is_none")]
    pub valid_start_date: Option<Option<NaiveDate>>,
    #[serde(deserialize_with = "clearable", skip_serializing_if = "Option::is_none")]
    pub valid_end_date: Option<Option<NaiveDate>>,
    #[serde(deserialize_with = "clearable", skip_serializing_if = "Option::is_none")]
    pub target_column: Option<Option<String>>,
    pub learning_rate: Option<f64>,
    pub weight_decay: Option<f64>,
    pub dropout: Option<f64>,
    pub seed: Option<u64>,
    pub drop_last: Option<bool>,
    pub fill_columns: Option<Vec<String>>,
    pub drop_incomplete: Option<bool>,
}

/// A present key, `null` included, becomes `Some`; an absent key stays `None`
/// through `#[serde(default)]`
fn clearable<'de, T, D>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl ConfigUpdate {
    /// Read an update document from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

macro_rules! merge_fields {
    ($config:expr, $update:expr, [$($field:ident),*]) => {
        $(if let Some(value) = $update.$field { $config.$field = value; })*
    };
}

impl TrainConfig {
    /// Apply the set fields of `update`
    pub fn merge(&mut self, update: ConfigUpdate) {
        merge_fields!(
            self,
            update,
            [
                data_path, n_in, n_out, num_epochs, hidden_size, num_layers, batch_size,
                train_start_date, train_end_date, valid_start_date, valid_end_date,
                target_column, learning_rate, weight_decay, dropout, seed, drop_last,
                fill_columns, drop_incomplete
            ]
        );
    }

    /// Builder form of [`Self::merge`]
    pub fn merged(mut self, update: ConfigUpdate) -> Self {
        self.merge(update);
        self
    }

    /// Defaults with a JSON update document applied on top
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Self::default().merged(ConfigUpdate::from_json_file(path)?);
        config.validate()?;
        Ok(config)
    }

    /// Reject settings no training run can use
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("n_in", self.n_in),
            ("n_out", self.n_out),
            ("batch_size", self.batch_size),
            ("hidden_size", self.hidden_size),
            ("num_layers", self.num_layers),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, value)| *value == 0) {
            return Err(ForecastError::InvalidParameter(format!(
                "{} must be positive",
                name
            )));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(ForecastError::InvalidParameter(format!(
                "dropout must be in [0, 1), got {}",
                self.dropout
            )));
        }
        if !(self.learning_rate > 0.0) || !self.learning_rate.is_finite() {
            return Err(ForecastError::InvalidParameter(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        check_range("train", self.train_start_date, self.train_end_date)?;
        check_range("valid", self.valid_start_date, self.valid_end_date)?;
        Ok(())
    }

    /// Window layout of the training split
    pub fn train_spec(&self) -> WindowSpec {
        WindowSpec::new(self.n_in, self.n_out)
            .with_date_range(self.train_start_date, self.train_end_date)
            .with_target(self.target_column.clone())
    }

    /// Window layout of the validation split
    pub fn valid_spec(&self) -> WindowSpec {
        WindowSpec::new(self.n_in, self.n_out)
            .with_date_range(self.valid_start_date, self.valid_end_date)
            .with_target(self.target_column.clone())
    }
}

fn check_range(split: &str, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<()> {
    match (start, end) {
        (Some(start), Some(end)) if start > end => Err(ForecastError::InvalidParameter(format!(
            "{} date range is inverted: {} > {}",
            split, start, end
        ))),
        _ => Ok(()),
    }
}
