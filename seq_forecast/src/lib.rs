//! # Seq Forecast
//!
//! Short-horizon forecasting of tabular time series.
//!
//! ## Features
//!
//! - Table loading from CSV with time-column detection and date-range filtering
//! - Missing-value imputers (rolling-mean fill, incomplete-row drop) chained in a pipeline
//! - Sliding-window datasets with z-score normalisation shared between splits
//! - A stacked LSTM regressor built on burn, trained with AdamW in an epoch loop
//! - An ARIMA baseline reported in the same result schema
//! - A model registry (JSON metadata plus burn weight records) with architecture checks on load
//!
//! ## Quick Start
//!
//! ```no_run
//! use seq_forecast::{ConfigUpdate, PredictionInput, Table, TrainConfig, Trainer};
//!
//! # fn main() -> seq_forecast::Result<()> {
//! let mut trainer = Trainer::new(TrainConfig::default());
//! trainer.update_params(ConfigUpdate {
//!     data_path: Some(Some("prices.csv".into())),
//!     n_in: Some(5),
//!     ..Default::default()
//! });
//!
//! let result = trainer.fit()?;
//! println!("{}", result.to_json()?);
//!
//! let recent = Table::from_csv("recent.csv")?;
//! let forecast = trainer.predict(PredictionInput::Table(recent))?;
//! println!("{:?}", forecast);
//! # Ok(())
//! # }
//! ```

pub mod baseline;
pub mod config;
pub mod data;
pub mod error;
pub mod impute;
pub mod metrics;
pub mod models;
pub mod nn;
pub mod registry;
pub mod trained;
pub mod trainer;
pub mod window;

// Re-export commonly used types
pub use crate::baseline::BaselineModel;
pub use crate::config::{ConfigUpdate, TrainConfig};
pub use crate::data::Table;
pub use crate::error::{ForecastError, Result};
pub use crate::impute::{DropIncomplete, ImputePipeline, Imputer, RollingMeanFill};
pub use crate::metrics::{TrainProcess, TrainResult, ValidResult};
pub use crate::models::{ArimaModel, ForecastModel, ForecastResult, TrainedForecastModel};
pub use crate::nn::{AdamW, LstmModel, ModelKind, ModelParams, Optimizer, SequenceModel};
pub use crate::registry::{load_model, ModelRegistry};
pub use crate::trained::{PredictionInput, TrainedModel};
pub use crate::trainer::Trainer;
pub use crate::window::{Normalization, NormalizationStats, WindowSpec, WindowedDataset};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
