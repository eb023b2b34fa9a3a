//! Missing-value imputers
//!
//! Imputers follow a two-phase protocol: `fit` captures whatever state the
//! imputer needs from a reference table, `transform` applies it. Stateless
//! imputers simply ignore `fit`.

use crate::data::Table;
use crate::error::{ForecastError, Result};
use forecast_math::rolling::rolling_mean;
use std::collections::HashMap;

/// Trailing window used by [`RollingMeanFill`]
pub const ROLLING_WINDOW: usize = 5;
/// Observed values a rolling window needs before it yields a fill value
pub const ROLLING_MIN_PERIODS: usize = 1;

/// Common interface for missing-value imputers
pub trait Imputer: std::fmt::Debug {
    /// Learn imputation state from `table`
    fn fit(&mut self, table: &Table) -> Result<()>;

    /// Fill or drop missing values in `table`
    fn transform(&self, table: Table) -> Result<Table>;

    /// Fit on `table`, then transform it
    fn fit_transform(&mut self, table: Table) -> Result<Table> {
        self.fit(&table)?;
        self.transform(table)
    }
}

/// Fills gaps with a trailing rolling mean captured at fit time.
///
/// `fit` stores, per configured column, the rolling mean (window 5, at least
/// one observed value) of the fit table. `transform` fills a missing cell at
/// row `i` with the stored value at row `i`; it does not recompute anything
/// from the transform input.
///
/// Precondition: the transform table must have the same rows in the same
/// order as the fit table. Differing lengths are rejected with
/// [`ForecastError::MisalignedImputation`]; a reordered table of equal
/// length cannot be detected and would be filled with values from other
/// rows.
#[derive(Debug, Clone, Default)]
pub struct RollingMeanFill {
    columns: Vec<String>,
    roll_mean: HashMap<String, Vec<Option<f64>>>,
}

impl RollingMeanFill {
    /// Create a filler for the given columns
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            roll_mean: HashMap::new(),
        }
    }

    /// Configured columns
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Rolling-mean series stored for `column` by the last `fit`
    pub fn fitted(&self, column: &str) -> Option<&[Option<f64>]> {
        self.roll_mean.get(column).map(Vec::as_slice)
    }
}

impl Imputer for RollingMeanFill {
    fn fit(&mut self, table: &Table) -> Result<()> {
        let mut roll_mean = HashMap::with_capacity(self.columns.len());
        for column in &self.columns {
            let values = table.column_values(column)?;
            let roll = rolling_mean(&values, ROLLING_WINDOW, ROLLING_MIN_PERIODS)?;
            roll_mean.insert(column.clone(), roll);
        }

        tracing::debug!(columns = ?self.columns, rows = table.len(), "fitted rolling-mean fill");
        self.roll_mean = roll_mean;
        Ok(())
    }

    fn transform(&self, mut table: Table) -> Result<Table> {
        for column in &self.columns {
            let roll = self.roll_mean.get(column).ok_or_else(|| {
                ForecastError::NotFitted(format!("rolling-mean fill for column '{}'", column))
            })?;

            let values = table.column_values(column)?;
            if values.len() != roll.len() {
                return Err(ForecastError::MisalignedImputation {
                    column: column.clone(),
                    fitted: roll.len(),
                    got: values.len(),
                });
            }

            let missing = values.iter().filter(|v| v.is_none()).count();
            let filled: Vec<Option<f64>> = values
                .into_iter()
                .zip(roll)
                .map(|(v, r)| v.or(*r))
                .collect();
            table.set_column(column, filled)?;

            tracing::debug!(column = %column, missing, "filled gaps with rolling mean");
        }

        Ok(table)
    }
}

/// Drops every row that contains a missing value
#[derive(Debug, Clone, Copy, Default)]
pub struct DropIncomplete;

impl DropIncomplete {
    /// Create a new row dropper
    pub fn new() -> Self {
        Self
    }
}

impl Imputer for DropIncomplete {
    fn fit(&mut self, _table: &Table) -> Result<()> {
        Ok(())
    }

    fn transform(&self, table: Table) -> Result<Table> {
        let complete = table.complete_rows()?;
        let dropped = complete.iter().filter(|keep| !**keep).count();
        if dropped == 0 {
            return Ok(table);
        }

        tracing::debug!(dropped, rows = table.len(), "dropping incomplete rows");
        table.filter_rows(&complete)
    }
}

/// Ordered chain of imputers applied one after another
#[derive(Debug, Default)]
pub struct ImputePipeline {
    steps: Vec<Box<dyn Imputer>>,
}

impl ImputePipeline {
    /// Create an empty pipeline
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step
    pub fn with_step<I: Imputer + 'static>(mut self, step: I) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    /// Number of steps
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the pipeline has no steps
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl Imputer for ImputePipeline {
    /// Fits each step on the output of the previous steps
    fn fit(&mut self, table: &Table) -> Result<()> {
        let mut current = table.clone();
        for step in &mut self.steps {
            current = step.fit_transform(current)?;
        }
        Ok(())
    }

    fn transform(&self, table: Table) -> Result<Table> {
        self.steps
            .iter()
            .try_fold(table, |current, step| step.transform(current))
    }

    fn fit_transform(&mut self, table: Table) -> Result<Table> {
        self.steps
            .iter_mut()
            .try_fold(table, |current, step| step.fit_transform(current))
    }
}
