mod common;

use approx::assert_relative_eq;
use common::{day, write_daily_csv, write_ramp_csv};
use rstest::rstest;
use seq_forecast::{Normalization, Table, WindowSpec, WindowedDataset};

#[rstest]
#[case(20, 3, 2, 16)]
#[case(20, 1, 1, 19)]
#[case(5, 3, 2, 1)]
#[case(4, 3, 2, 0)]
#[case(0, 3, 2, 0)]
fn test_dataset_length(
    #[case] rows: usize,
    #[case] n_in: usize,
    #[case] n_out: usize,
    #[case] expected: usize,
) {
    let file = write_ramp_csv(rows.max(1));
    let table = Table::from_csv(file.path()).unwrap().slice(0, Some(rows));
    let dataset =
        WindowedDataset::new(&table, &WindowSpec::new(n_in, n_out), Normalization::None).unwrap();
    assert_eq!(dataset.len(), expected);
}

#[test]
fn test_first_window_of_daily_rows() {
    let file = write_ramp_csv(20);
    let dataset =
        WindowedDataset::from_csv(file.path(), &WindowSpec::new(3, 2), Normalization::None)
            .unwrap();

    assert_eq!(dataset.len(), 16);
    assert_eq!(dataset.num_features(), 1);

    let first = dataset.get(0).unwrap();
    assert_eq!(first.input.column(0).to_vec(), vec![0.0, 1.0, 2.0]);
    assert_eq!(first.output.to_vec(), vec![3.0, 4.0]);

    let last = dataset.get(15).unwrap();
    assert_eq!(last.output.to_vec(), vec![18.0, 19.0]);
}

#[test]
fn test_date_range_is_inclusive() {
    let file = write_ramp_csv(20);
    let spec = WindowSpec::new(2, 1).with_date_range(Some(day(5)), Some(day(9)));
    let dataset = WindowedDataset::from_csv(file.path(), &spec, Normalization::None).unwrap();

    assert_eq!(dataset.num_rows(), 5);
    assert_eq!(dataset.len(), 3);
    assert_eq!(dataset.get(0).unwrap().input[[0, 0]], 5.0);
}

#[test]
fn test_normalization_round_trip() {
    let file = write_daily_csv(30);
    let table = Table::from_csv(file.path()).unwrap();
    let dataset = WindowedDataset::new(&table, &WindowSpec::new(4, 2), Normalization::Fit).unwrap();
    let stats = dataset.mean_std().unwrap();

    let raw = table.to_matrix(table.feature_columns()).unwrap();
    let mut scaled = raw.clone();
    stats.normalize(&mut scaled).unwrap();

    let window = dataset.get(3).unwrap();
    for (got, want) in window.input.iter().zip(scaled.slice(ndarray::s![3..7, ..]).iter()) {
        assert_relative_eq!(*got, *want, epsilon = 1e-12);
    }

    stats.denormalize(&mut scaled).unwrap();
    for (back, original) in scaled.iter().zip(raw.iter()) {
        assert_relative_eq!(*back, *original, epsilon = 1e-9);
    }
}

#[test]
fn test_target_block_shares_feature_units() {
    let file = write_daily_csv(30);
    let table = Table::from_csv(file.path()).unwrap();
    let dataset = WindowedDataset::new(&table, &WindowSpec::new(4, 2), Normalization::Fit).unwrap();
    let target = dataset.target_stats().unwrap();

    let raw_close = table.complete_values("close").unwrap();
    let window = dataset.get(0).unwrap();
    assert_relative_eq!(target.denormalize(window.output[0]), raw_close[4], epsilon = 1e-9);
    assert_relative_eq!(target.denormalize(window.output[1]), raw_close[5], epsilon = 1e-9);
}

#[test]
fn test_reused_stats_match_training_scaling() {
    let file = write_daily_csv(40);
    let table = Table::from_csv(file.path()).unwrap();

    let train_spec = WindowSpec::new(3, 2).with_date_range(None, Some(day(24)));
    let train = WindowedDataset::new(&table, &train_spec, Normalization::Fit).unwrap();
    let stats = train.mean_std().unwrap().clone();

    // the same rows, scaled with the training stats instead of their own
    let reused =
        WindowedDataset::new(&table, &train_spec, Normalization::Apply(stats.clone())).unwrap();
    for i in 0..train.len() {
        assert_eq!(train.get(i), reused.get(i));
    }

    // validation rows are scaled with the training stats, never their own
    let valid_spec = WindowSpec::new(3, 2).with_date_range(Some(day(25)), None);
    let valid =
        WindowedDataset::new(&table, &valid_spec, Normalization::Apply(stats.clone())).unwrap();
    assert_eq!(valid.mean_std(), Some(&stats));

    let own = WindowedDataset::new(&table, &valid_spec, Normalization::Fit).unwrap();
    assert_ne!(own.mean_std(), Some(&stats));
}

#[test]
fn test_date_range_without_time_column() {
    use polars::prelude::*;

    let df = DataFrame::new(vec![Series::new("x", &[1.0, 2.0, 3.0])]).unwrap();
    let table = Table::from_dataframe(df).unwrap();
    let spec = WindowSpec::new(1, 1).with_date_range(Some(day(0)), None);
    assert!(WindowedDataset::new(&table, &spec, Normalization::None).is_err());
}
