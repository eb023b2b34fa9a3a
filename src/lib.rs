//! # Seq Forecast Workspace
//!
//! Umbrella crate for the forecasting workspace.
//!
//! - [`forecast_math`]: rolling statistics, differencing and simplex optimisation
//! - [`seq_forecast`]: datasets, imputers, the LSTM trainer, the ARIMA baseline
//!   and the model registry
//!
//! ## Example
//!
//! ```
//! use seq_forecast_workspace::forecast_math::rolling::rolling_mean;
//!
//! let filled = rolling_mean(&[Some(1.0), None, Some(3.0)], 5, 1).unwrap();
//! assert_eq!(filled, vec![Some(1.0), Some(1.0), Some(2.0)]);
//! ```

pub use forecast_math;
pub use seq_forecast;
