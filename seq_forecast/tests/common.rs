// Shared fixtures; not every test file uses every helper
#![allow(dead_code)]

use chrono::{Duration, NaiveDate};
use std::io::Write;
use tempfile::NamedTempFile;

pub fn day(offset: usize) -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 1, 1).unwrap() + Duration::days(offset as i64)
}

/// CSV with `date`, `volume` and `close` columns; `close` follows a wave on a trend
pub fn write_daily_csv(rows: usize) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "date,volume,close").unwrap();
    for i in 0..rows {
        let close = 100.0 + 0.5 * i as f64 + 3.0 * (i as f64 * 0.4).sin();
        let volume = 1000.0 + 10.0 * ((i * 7) % 11) as f64;
        writeln!(file, "{},{:.1},{:.4}", day(i).format("%Y-%m-%d"), volume, close).unwrap();
    }
    file.flush().unwrap();
    file
}

/// Single-column CSV whose value at row i is i
pub fn write_ramp_csv(rows: usize) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "date,value").unwrap();
    for i in 0..rows {
        writeln!(file, "{},{}", day(i).format("%Y-%m-%d"), i as f64).unwrap();
    }
    file.flush().unwrap();
    file
}
