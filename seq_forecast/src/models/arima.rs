//! ARIMA models for time series forecasting
//!
//! Parameters are estimated on the differenced series by minimising the
//! conditional sum of squares (CSS) with a bounded Nelder-Mead search.
//! AR and MA coefficients are kept inside (-0.99, 0.99). Only an
//! undifferenced model (`d == 0`) estimates a constant, so a differenced
//! model never adds drift.

use crate::error::{ForecastError, Result};
use crate::models::{ForecastModel, ForecastResult, TrainedForecastModel};
use forecast_math::differencing::{difference, integrate};
use forecast_math::optimization::{nelder_mead, SimplexConfig};

const COEFFICIENT_BOUND: f64 = 0.99;

/// ARIMA model (AutoRegressive Integrated Moving Average)
#[derive(Debug, Clone)]
pub struct ArimaModel {
    /// Name of the model
    name: String,
    /// AR order (p)
    p: usize,
    /// Differencing order (d)
    d: usize,
    /// MA order (q)
    q: usize,
    simplex: SimplexConfig,
}

/// Trained ARIMA model
#[derive(Debug, Clone)]
pub struct TrainedArimaModel {
    name: String,
    p: usize,
    d: usize,
    q: usize,
    intercept: f64,
    ar_coefficients: Vec<f64>,
    ma_coefficients: Vec<f64>,
    /// Training series on the original scale
    historical_data: Vec<f64>,
    /// Training series after differencing
    differenced: Vec<f64>,
    /// In-sample one-step residuals on the differenced scale
    residuals: Vec<f64>,
    css: f64,
}

impl ArimaModel {
    /// Create a new ARIMA model
    pub fn new(p: usize, d: usize, q: usize) -> Self {
        Self {
            name: format!("ARIMA({},{},{})", p, d, q),
            p,
            d,
            q,
            simplex: SimplexConfig::default(),
        }
    }

    /// Override the optimiser settings
    pub fn with_simplex(mut self, simplex: SimplexConfig) -> Self {
        self.simplex = simplex;
        self
    }

    /// `(p, d, q)`
    pub fn order(&self) -> (usize, usize, usize) {
        (self.p, self.d, self.q)
    }

    /// Observations needed to fit this order
    pub fn min_observations(&self) -> usize {
        self.d + self.p.max(self.q) + 2
    }

    /// Whether the model carries a constant. A differenced model has none.
    pub fn has_intercept(&self) -> bool {
        self.d == 0
    }

    fn estimate(&self, diff_series: &[f64]) -> Result<(f64, Vec<f64>, Vec<f64>)> {
        let (p, q) = (self.p, self.q);
        let mean = if self.has_intercept() {
            diff_series.iter().sum::<f64>() / diff_series.len() as f64
        } else {
            0.0
        };
        if p == 0 && q == 0 {
            return Ok((mean, Vec::new(), Vec::new()));
        }

        let offset = usize::from(self.has_intercept());
        let mut initial = Vec::with_capacity(offset + p + q);
        let mut bounds = Vec::with_capacity(offset + p + q);
        if self.has_intercept() {
            initial.push(mean);
            bounds.push((f64::NEG_INFINITY, f64::INFINITY));
        }
        initial.extend((0..p).map(|i| 0.1 / (i + 1) as f64));
        initial.extend((0..q).map(|i| 0.1 / (i + 1) as f64));
        bounds.extend(std::iter::repeat((-COEFFICIENT_BOUND, COEFFICIENT_BOUND)).take(p + q));

        let intercept_of = |params: &[f64]| if offset == 1 { params[0] } else { 0.0 };
        let result = nelder_mead(
            |params| {
                let (ar, ma) = params[offset..].split_at(p);
                conditional_sum_of_squares(diff_series, intercept_of(params), ar, ma).0
            },
            &initial,
            Some(&bounds),
            &self.simplex,
        )?;

        if !result.value.is_finite() || result.point.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::NumericalInstability(format!(
                "{} estimation diverged",
                self.name
            )));
        }
        if !result.converged {
            tracing::debug!(
                model = %self.name,
                iterations = result.iterations,
                "simplex search stopped before converging"
            );
        }

        let (ar, ma) = result.point[offset..].split_at(p);
        Ok((intercept_of(&result.point), ar.to_vec(), ma.to_vec()))
    }
}

impl Default for ArimaModel {
    /// ARIMA(2,1,1)
    fn default() -> Self {
        Self::new(2, 1, 1)
    }
}

impl ForecastModel for ArimaModel {
    type Trained = TrainedArimaModel;

    fn train(&self, series: &[f64]) -> Result<TrainedArimaModel> {
        let needed = self.min_observations();
        if series.len() < needed {
            return Err(ForecastError::NumericalInstability(format!(
                "Insufficient data for {}. Need at least {} observations, got {}",
                self.name,
                needed,
                series.len()
            )));
        }
        if series.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::DataError(
                "Series contains non-finite values".to_string(),
            ));
        }

        let differenced = difference(series, self.d);
        let (intercept, ar_coefficients, ma_coefficients) = self.estimate(&differenced)?;
        let (css, residuals) =
            conditional_sum_of_squares(&differenced, intercept, &ar_coefficients, &ma_coefficients);
        if !css.is_finite() {
            return Err(ForecastError::NumericalInstability(format!(
                "{} residuals are not finite",
                self.name
            )));
        }

        Ok(TrainedArimaModel {
            name: self.name.clone(),
            p: self.p,
            d: self.d,
            q: self.q,
            intercept,
            ar_coefficients,
            ma_coefficients,
            historical_data: series.to_vec(),
            differenced,
            residuals,
            css,
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl TrainedArimaModel {
    /// `(p, d, q)`
    pub fn order(&self) -> (usize, usize, usize) {
        (self.p, self.d, self.q)
    }

    /// Constant of the ARMA part, zero when `d > 0`
    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    /// Fitted AR coefficients
    pub fn ar_coefficients(&self) -> &[f64] {
        &self.ar_coefficients
    }

    /// Fitted MA coefficients
    pub fn ma_coefficients(&self) -> &[f64] {
        &self.ma_coefficients
    }

    /// In-sample residuals on the differenced scale
    pub fn residuals(&self) -> &[f64] {
        &self.residuals
    }

    /// Conditional sum of squares at the fitted parameters
    pub fn css(&self) -> f64 {
        self.css
    }
}

impl TrainedForecastModel for TrainedArimaModel {
    fn forecast(&self, horizon: usize) -> Result<ForecastResult> {
        if self.historical_data.is_empty() {
            return Err(ForecastError::NotFitted(
                "Model has not been fitted to data".to_string(),
            ));
        }

        let mut extended = self.differenced.clone();
        let mut residuals = self.residuals.clone();
        for _ in 0..horizon {
            let t = extended.len();
            let mut pred = self.intercept;
            for (i, ar) in self.ar_coefficients.iter().enumerate().filter(|(i, _)| t > *i) {
                pred += ar * (extended[t - 1 - i] - self.intercept);
            }
            for (i, ma) in self.ma_coefficients.iter().enumerate().filter(|(i, _)| t > *i) {
                pred += ma * residuals[t - 1 - i];
            }
            extended.push(pred);
            // future shocks have zero expectation
            residuals.push(0.0);
        }

        let forecast_diff = &extended[self.differenced.len()..];
        let values = integrate(forecast_diff, &self.historical_data, self.d);
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::NumericalInstability(format!(
                "{} forecast is not finite",
                self.name
            )));
        }

        ForecastResult::new(values, horizon)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// CSS of an ARMA process on `series` and its one-step residuals
fn conditional_sum_of_squares(
    series: &[f64],
    intercept: f64,
    ar: &[f64],
    ma: &[f64],
) -> (f64, Vec<f64>) {
    let n = series.len();
    let start = ar.len().max(ma.len());
    let mut residuals = vec![0.0; n];
    if n <= start {
        return (f64::MAX, residuals);
    }

    let mut css = 0.0;
    for t in start..n {
        let mut pred = intercept;
        for (i, coef) in ar.iter().enumerate() {
            pred += coef * (series[t - 1 - i] - intercept);
        }
        for (i, coef) in ma.iter().enumerate() {
            pred += coef * residuals[t - 1 - i];
        }
        let error = series[t] - pred;
        residuals[t] = error;
        css += error * error;
    }

    (css, residuals)
}
