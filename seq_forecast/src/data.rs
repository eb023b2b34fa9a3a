//! Tabular time series data handling

use crate::error::{ForecastError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use ndarray::Array2;
use polars::prelude::*;
use std::fs::File;
use std::path::Path;

/// Time-ordered table of numeric columns.
///
/// Row order is the time order. The optional time column is only used for
/// date-range filtering; every other numeric column is a feature.
#[derive(Debug, Clone)]
pub struct Table {
    /// Data frame containing the rows
    df: DataFrame,
    /// Name of the time column, if one was detected
    time_column: Option<String>,
    /// Numeric feature columns in file order
    feature_columns: Vec<String>,
}

impl Table {
    /// Load a table from a CSV file with a header row
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let df = CsvReader::new(file)
            .infer_schema(None)
            .has_header(true)
            .finish()?;

        tracing::debug!(path = %path.display(), rows = df.height(), "loaded table");
        Self::from_dataframe(df)
    }

    /// Create a table from an existing DataFrame, detecting the time column
    pub fn from_dataframe(df: DataFrame) -> Result<Self> {
        let time_column = detect_time_column(&df);
        Self::with_time_column(df, time_column)
    }

    /// Create a table with an explicit (or no) time column
    pub fn with_time_column(df: DataFrame, time_column: Option<String>) -> Result<Self> {
        if let Some(name) = &time_column {
            df.column(name)?;
        }

        let feature_columns: Vec<String> = df
            .get_columns()
            .iter()
            .filter(|s| Some(s.name()) != time_column.as_deref())
            .filter(|s| is_numeric(s.dtype()))
            .map(|s| s.name().to_string())
            .collect();

        if feature_columns.is_empty() {
            return Err(ForecastError::DataError(
                "No numeric columns found in data".to_string(),
            ));
        }

        Ok(Self {
            df,
            time_column,
            feature_columns,
        })
    }

    /// Get the DataFrame
    pub fn dataframe(&self) -> &DataFrame {
        &self.df
    }

    /// Get the time column name
    pub fn time_column(&self) -> Option<&str> {
        self.time_column.as_deref()
    }

    /// Get the numeric feature column names
    pub fn feature_columns(&self) -> &[String] {
        &self.feature_columns
    }

    /// Check if the table is empty
    pub fn is_empty(&self) -> bool {
        self.df.height() == 0
    }

    /// Get the number of rows
    pub fn len(&self) -> usize {
        self.df.height()
    }

    /// Values of a numeric column; null and NaN cells are `None`
    pub fn column_values(&self, name: &str) -> Result<Vec<Option<f64>>> {
        let col = self.df.column(name)?;
        if !is_numeric(col.dtype()) {
            return Err(ForecastError::DataError(format!(
                "Column '{}' cannot be converted to f64",
                name
            )));
        }

        let col = col.cast(&DataType::Float64)?;
        Ok(col
            .f64()?
            .into_iter()
            .map(|v| v.filter(|x| !x.is_nan()))
            .collect())
    }

    /// Values of a numeric column that must not contain gaps
    pub fn complete_values(&self, name: &str) -> Result<Vec<f64>> {
        self.column_values(name)?
            .into_iter()
            .enumerate()
            .map(|(row, v)| {
                v.ok_or_else(|| {
                    ForecastError::DataError(format!(
                        "Column '{}' has a missing value at row {}; impute before use",
                        name, row
                    ))
                })
            })
            .collect()
    }

    /// Replace (or add) a numeric column
    pub fn set_column(&mut self, name: &str, values: Vec<Option<f64>>) -> Result<()> {
        if values.len() != self.df.height() {
            return Err(ForecastError::DataError(format!(
                "Column '{}' has {} values, table has {} rows",
                name,
                values.len(),
                self.df.height()
            )));
        }

        self.df.with_column(Series::new(name, values))?;
        if !self.feature_columns.iter().any(|c| c == name) {
            self.feature_columns.push(name.to_string());
        }
        Ok(())
    }

    /// Per-row flag: `true` when no cell in the row is missing
    pub fn complete_rows(&self) -> Result<Vec<bool>> {
        let mut complete = vec![true; self.df.height()];

        for series in self.df.get_columns() {
            if is_numeric(series.dtype()) {
                for (flag, v) in complete.iter_mut().zip(self.column_values(series.name())?) {
                    *flag &= v.is_some();
                }
            } else {
                let present = series.is_not_null();
                for (flag, p) in complete.iter_mut().zip(present.into_iter()) {
                    *flag &= p.unwrap_or(false);
                }
            }
        }

        Ok(complete)
    }

    /// Keep the rows whose mask entry is `true`
    pub fn filter_rows(&self, mask: &[bool]) -> Result<Self> {
        if mask.len() != self.df.height() {
            return Err(ForecastError::DataError(format!(
                "Row mask has {} entries, table has {} rows",
                mask.len(),
                self.df.height()
            )));
        }

        let mask = Series::new("mask", mask);
        Ok(Self {
            df: self.df.filter(mask.bool()?)?,
            time_column: self.time_column.clone(),
            feature_columns: self.feature_columns.clone(),
        })
    }

    /// Rows `start..end` (end defaults to the last row)
    pub fn slice(&self, start: usize, end: Option<usize>) -> Self {
        let end = end.unwrap_or(self.df.height()).min(self.df.height());
        let start = start.min(end);

        Self {
            df: self.df.slice(start as i64, end - start),
            time_column: self.time_column.clone(),
            feature_columns: self.feature_columns.clone(),
        }
    }

    /// The most recent `n` rows
    pub fn tail(&self, n: usize) -> Self {
        let start = self.df.height().saturating_sub(n);
        self.slice(start, None)
    }

    /// Parsed dates of the time column, `None` when the table has none
    pub fn dates(&self) -> Result<Option<Vec<NaiveDate>>> {
        let Some(name) = self.time_column.as_deref() else {
            return Ok(None);
        };
        let col = self.df.column(name)?;

        let parsed: Vec<Option<NaiveDate>> = match col.dtype() {
            DataType::Utf8 => col
                .utf8()?
                .into_iter()
                .map(|v| v.map(parse_date).transpose())
                .collect::<Result<_>>()?,
            DataType::Date => col
                .date()?
                .into_iter()
                .map(|v| v.and_then(days_to_date))
                .collect(),
            DataType::Datetime(unit, _) => {
                let per_milli = match unit {
                    TimeUnit::Nanoseconds => 1_000_000,
                    TimeUnit::Microseconds => 1_000,
                    TimeUnit::Milliseconds => 1,
                };
                col.datetime()?
                    .into_iter()
                    .map(|v| v.and_then(|ts| millis_to_date(ts / per_milli)))
                    .collect()
            }
            DataType::Int64 => col
                .i64()?
                .into_iter()
                .map(|v| v.and_then(millis_to_date))
                .collect(),
            other => {
                return Err(ForecastError::DataError(format!(
                    "Time column '{}' has unsupported type {}",
                    name, other
                )))
            }
        };

        parsed
            .into_iter()
            .enumerate()
            .map(|(row, d)| {
                d.ok_or_else(|| {
                    ForecastError::DataError(format!(
                        "Time column '{}' has a missing or invalid date at row {}",
                        name, row
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }

    /// Keep rows whose date lies in `[start, end]`; unset bounds are open
    pub fn filter_dates(&self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<Self> {
        if start.is_none() && end.is_none() {
            return Ok(self.clone());
        }

        let dates = self.dates()?.ok_or_else(|| {
            ForecastError::DataError(
                "Date range requested but the table has no time column".to_string(),
            )
        })?;

        let mask: Vec<bool> = dates
            .iter()
            .map(|d| start.map_or(true, |s| *d >= s) && end.map_or(true, |e| *d <= e))
            .collect();

        self.filter_rows(&mask)
    }

    /// Dense `rows x columns` matrix of the named columns; gaps are errors
    pub fn to_matrix(&self, columns: &[String]) -> Result<Array2<f64>> {
        let rows = self.df.height();
        let mut matrix = Array2::zeros((rows, columns.len()));

        for (j, name) in columns.iter().enumerate() {
            let values = self.complete_values(name)?;
            for (i, v) in values.into_iter().enumerate() {
                matrix[[i, j]] = v;
            }
        }

        Ok(matrix)
    }
}

/// Name tokens that mark a time column
const TIME_TOKENS: [&str; 4] = ["date", "time", "timestamp", "datetime"];

/// Detect the time column in a DataFrame.
///
/// A name match needs a whole token (`date`, `trade_date`, `Timestamp`) on a
/// column that can hold dates: temporal, text or integer epoch values.
/// Otherwise the first temporal column is used.
fn detect_time_column(df: &DataFrame) -> Option<String> {
    let named = df.get_columns().iter().find(|s| {
        let lower = s.name().to_lowercase();
        let token_match = lower
            .split(|c: char| !c.is_ascii_alphanumeric())
            .any(|token| TIME_TOKENS.contains(&token));
        token_match && can_hold_dates(s.dtype())
    });

    named
        .or_else(|| df.get_columns().iter().find(|s| s.dtype().is_temporal()))
        .map(|s| s.name().to_string())
}

fn can_hold_dates(dtype: &DataType) -> bool {
    dtype.is_temporal() || matches!(dtype, DataType::Utf8 | DataType::Int64)
}

fn is_numeric(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Float64
            | DataType::Float32
            | DataType::Int64
            | DataType::Int32
            | DataType::Int16
            | DataType::Int8
            | DataType::UInt64
            | DataType::UInt32
            | DataType::UInt16
            | DataType::UInt8
    )
}

/// Parse a date from the textual formats found in exported tables
pub fn parse_date(text: &str) -> Result<NaiveDate> {
    let text = text.trim();
    for format in ["%Y-%m-%d", "%Y/%m/%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return Ok(date);
        }
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S") {
        return Ok(dt.date());
    }
    Ok(DateTime::parse_from_rfc3339(text)?.date_naive())
}

fn days_to_date(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(1970, 1, 1)?.checked_add_signed(chrono::Duration::days(days as i64))
}

fn millis_to_date(millis: i64) -> Option<NaiveDate> {
    DateTime::<chrono::Utc>::from_timestamp_millis(millis).map(|dt| dt.date_naive())
}
