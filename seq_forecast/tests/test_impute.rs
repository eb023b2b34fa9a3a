use polars::prelude::*;
use pretty_assertions::assert_eq;
use seq_forecast::{DropIncomplete, ForecastError, ImputePipeline, Imputer, RollingMeanFill, Table};

fn complete_table() -> Table {
    let df = DataFrame::new(vec![
        Series::new("date", &["2023-01-01", "2023-01-02", "2023-01-03"]),
        Series::new("a", &[1.0, 2.0, 3.0]),
        Series::new("b", &[4.0, 5.0, 6.0]),
    ])
    .unwrap();
    Table::from_dataframe(df).unwrap()
}

fn gappy_table() -> Table {
    let df = DataFrame::new(vec![Series::new(
        "price",
        &[
            Some(1.0),
            None,
            Some(3.0),
            None,
            None,
            Some(6.0),
            None,
            Some(8.0),
        ],
    )])
    .unwrap();
    Table::from_dataframe(df).unwrap()
}

#[test]
fn test_drop_incomplete_is_noop_on_complete_table() {
    let table = complete_table();
    let cleaned = DropIncomplete::new().fit_transform(table.clone()).unwrap();

    assert_eq!(cleaned.len(), table.len());
    assert!(cleaned.dataframe().frame_equal(table.dataframe()));
}

#[test]
fn test_rolling_fill_leaves_no_gaps() {
    let mut fill = RollingMeanFill::new(["price"]);
    let filled = fill.fit_transform(gappy_table()).unwrap();

    let values = filled.column_values("price").unwrap();
    assert!(values.iter().all(Option::is_some));
    // row 4: trailing five rows hold 1.0 and 3.0
    assert_eq!(values[4], Some(2.0));
    // observed values are never touched
    assert_eq!(values[5], Some(6.0));
}

#[test]
fn test_rolling_fill_uses_stored_series_not_transform_input() {
    let mut fill = RollingMeanFill::new(["price"]);
    fill.fit(&gappy_table()).unwrap();

    // same length, different observed values: fills still come from the fit table
    let df = DataFrame::new(vec![Series::new(
        "price",
        &[
            Some(100.0),
            None,
            Some(100.0),
            Some(100.0),
            Some(100.0),
            Some(100.0),
            Some(100.0),
            Some(100.0),
        ],
    )])
    .unwrap();
    let other = Table::from_dataframe(df).unwrap();
    let filled = fill.transform(other).unwrap();
    assert_eq!(filled.column_values("price").unwrap()[1], Some(1.0));
}

#[test]
fn test_missing_configured_column() {
    let mut fill = RollingMeanFill::new(["volume"]);
    assert!(matches!(
        fill.fit(&complete_table()),
        Err(ForecastError::ColumnNotFound(_))
    ));
}

#[test]
fn test_pipeline_order_matters() {
    // dropping first leaves nothing for the filler to fill
    let mut drop_then_fill = ImputePipeline::new()
        .with_step(DropIncomplete::new())
        .with_step(RollingMeanFill::new(["price"]));
    assert_eq!(drop_then_fill.fit_transform(gappy_table()).unwrap().len(), 4);

    let mut fill_then_drop = ImputePipeline::new()
        .with_step(RollingMeanFill::new(["price"]))
        .with_step(DropIncomplete::new());
    assert_eq!(fill_then_drop.fit_transform(gappy_table()).unwrap().len(), 8);
}
