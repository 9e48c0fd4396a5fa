//! Integration test: estimators, split and factory

use ndarray::{Array1, Array2};
use polars::prelude::*;
use tripfare::error::PipelineError;
use tripfare::preprocessing::build_features;
use tripfare::training::{
    make_model, rmse, train_test_split, Estimator, ModelKind, TrainParams,
};

fn linear_df(n: usize) -> DataFrame {
    let feature: Vec<f64> = (0..n).map(|i| i as f64 * 0.75).collect();
    let target: Vec<f64> = feature.iter().map(|x| 2.0 * x + 1.0).collect();
    df!(
        "feature" => &feature,
        "target" => &target
    )
    .unwrap()
}

fn noisy_arrays(n: usize) -> (Array2<f64>, Array1<f64>) {
    let x = Array2::from_shape_fn((n, 3), |(r, c)| ((r * (c + 3)) % 17) as f64 + c as f64 * 0.5);
    let y = Array1::from_shape_fn(n, |r| {
        x[[r, 0]] * 1.5 - x[[r, 1]] * 0.25 + x[[r, 2]] + ((r * 7) % 5) as f64 * 0.1
    });
    (x, y)
}

fn fit_and_score(model_type: &str, x: &Array2<f64>, y: &Array1<f64>, seed: u64) -> f64 {
    let split = train_test_split(x, y, 0.2, seed).unwrap();
    let mut model = make_model(model_type, seed).unwrap();
    model.fit(&split.x_train, &split.y_train).unwrap();
    let preds = model.predict(&split.x_test).unwrap();
    rmse(&split.y_test, &preds).unwrap()
}

#[test]
fn test_linear_regression_recovers_exact_relation() {
    let df = linear_df(50);
    let params = TrainParams::default()
        .with_target("target")
        .with_features(["feature"]);
    let matrix = build_features(&df, &params).unwrap();

    let score = fit_and_score("linear_regression", &matrix.x().unwrap(), &matrix.y().unwrap(), 42);
    assert!(score < 1e-6, "RMSE should be ~0, got {}", score);
}

#[test]
fn test_factory_returns_distinct_kinds() {
    let linear = make_model("linear_regression", 42).unwrap();
    let forest = make_model("random_forest", 42).unwrap();

    assert!(matches!(linear, Estimator::LinearRegression(_)));
    assert!(matches!(forest, Estimator::RandomForest(_)));
    assert_ne!(linear.kind(), forest.kind());
}

#[test]
fn test_factory_rejects_bogus() {
    let err = make_model("bogus", 42).unwrap_err();
    assert!(matches!(err, PipelineError::UnsupportedModelError(ref v) if v == "bogus"));
    assert!(err.to_string().contains("bogus"));
    assert!("bogus".parse::<ModelKind>().is_err());
}

#[test]
fn test_same_seed_same_rmse() {
    let (x, y) = noisy_arrays(60);
    for model_type in ["linear_regression", "random_forest"] {
        let first = fit_and_score(model_type, &x, &y, 42);
        let second = fit_and_score(model_type, &x, &y, 42);
        assert_eq!(first, second, "{} should be deterministic", model_type);
        assert!(first.is_finite() && first >= 0.0);
    }
}

#[test]
fn test_forest_beats_mean_baseline() {
    let (x, y) = noisy_arrays(80);
    let split = train_test_split(&x, &y, 0.25, 7).unwrap();

    let mut forest = make_model("random_forest", 7).unwrap();
    forest.fit(&split.x_train, &split.y_train).unwrap();
    let forest_rmse = rmse(&split.y_test, &forest.predict(&split.x_test).unwrap()).unwrap();

    let mean = split.y_train.mean().unwrap();
    let baseline = Array1::from_elem(split.n_test(), mean);
    let baseline_rmse = rmse(&split.y_test, &baseline).unwrap();

    assert!(
        forest_rmse < baseline_rmse,
        "forest {} vs baseline {}",
        forest_rmse,
        baseline_rmse
    );
}

#[test]
fn test_split_sizes_default_fraction() {
    let (x, y) = noisy_arrays(100);
    let split = train_test_split(&x, &y, 0.2, 42).unwrap();
    assert_eq!(split.n_train(), 80);
    assert_eq!(split.n_test(), 20);
}
