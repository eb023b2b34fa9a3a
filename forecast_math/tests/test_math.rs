use approx::assert_relative_eq;
use forecast_math::differencing::{difference, integrate};
use forecast_math::optimization::{nelder_mead, SimplexConfig};
use forecast_math::rolling::rolling_mean;
use forecast_math::stats::MeanStd;
use forecast_math::MathError;
use rstest::rstest;

#[rstest]
#[case(2, 1, vec![Some(1.0), Some(3.0), Some(5.0)], vec![Some(1.0), Some(2.0), Some(4.0)])]
#[case(
    3,
    2,
    vec![Some(1.0), None, Some(3.0), Some(5.0)],
    vec![None, None, Some(2.0), Some(4.0)]
)]
#[case(5, 1, vec![None, None], vec![None, None])]
#[case(5, 1, vec![None, Some(4.0), None], vec![None, Some(4.0), Some(4.0)])]
fn test_rolling_mean_cases(
    #[case] window: usize,
    #[case] min_periods: usize,
    #[case] values: Vec<Option<f64>>,
    #[case] expected: Vec<Option<f64>>,
) {
    assert_eq!(rolling_mean(&values, window, min_periods).unwrap(), expected);
}

#[rstest]
#[case(0, 1)]
#[case(3, 0)]
#[case(3, 4)]
fn test_rolling_mean_rejects_bad_windows(#[case] window: usize, #[case] min_periods: usize) {
    assert!(matches!(
        rolling_mean(&[Some(1.0)], window, min_periods),
        Err(MathError::InvalidInput(_))
    ));
}

#[rstest]
#[case(0, vec![1.0, 4.0, 9.0, 16.0])]
#[case(1, vec![3.0, 5.0, 7.0])]
#[case(2, vec![2.0, 2.0])]
#[case(4, vec![])]
fn test_difference_orders(#[case] d: usize, #[case] expected: Vec<f64>) {
    assert_eq!(difference(&[1.0, 4.0, 9.0, 16.0], d), expected);
}

#[rstest]
#[case(1)]
#[case(2)]
fn test_integrate_continues_the_series(#[case] d: usize) {
    // squares: the next two are 25 and 36
    let history = [1.0, 4.0, 9.0, 16.0];
    let full = [1.0, 4.0, 9.0, 16.0, 25.0, 36.0];
    let diffs = difference(&full, d);
    let future = &diffs[diffs.len() - 2..];

    let restored = integrate(future, &history, d);
    assert_relative_eq!(restored[0], 25.0, epsilon = 1e-12);
    assert_relative_eq!(restored[1], 36.0, epsilon = 1e-12);
}

#[rstest]
#[case(&[1.0, 2.0, 3.0, 4.0], 2.5, 1.118_033_988_749_895)]
#[case(&[-2.0, 2.0], 0.0, 2.0)]
#[case(&[7.0], 7.0, 1.0)]
fn test_mean_std_cases(#[case] values: &[f64], #[case] mean: f64, #[case] std: f64) {
    let stats = MeanStd::from_values(values).unwrap();
    assert_relative_eq!(stats.mean, mean, epsilon = 1e-12);
    assert_relative_eq!(stats.std, std, epsilon = 1e-12);
}

#[test]
fn test_nelder_mead_respects_bounds() {
    // unconstrained minimum at (2, -3); x is capped at 1
    let objective = |p: &[f64]| (p[0] - 2.0).powi(2) + (p[1] + 3.0).powi(2);
    let bounds = [(-1.0, 1.0), (-5.0, 5.0)];
    let result = nelder_mead(objective, &[0.0, 0.0], Some(&bounds), &SimplexConfig::default())
        .unwrap();

    assert_relative_eq!(result.point[0], 1.0, epsilon = 1e-2);
    assert_relative_eq!(result.point[1], -3.0, epsilon = 1e-2);
    assert!(result.value >= 1.0 - 1e-6);
}
