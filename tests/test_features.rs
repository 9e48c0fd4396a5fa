//! Integration test: feature/target selection

use polars::prelude::*;
use tripfare::error::PipelineError;
use tripfare::preprocessing::{
    build_features, choose_target, heuristic_columns, ColumnSelection, FeatureBuilder,
};
use tripfare::training::TrainParams;

fn trip_df() -> DataFrame {
    df!(
        "vendor_id" => &[Some(1i64), Some(2), Some(2), Some(1), None, Some(1)],
        "passenger_count" => &[Some(1.0), Some(2.0), None, Some(1.0), Some(3.0), Some(1.0)],
        "trip_distance" => &[1.1, 2.4, 0.9, 5.0, 3.3, 0.2],
        "store_and_fwd_flag" => &["N", "N", "Y", "N", "N", "N"],
        "fare_amount" => &[Some(6.5), Some(10.0), Some(5.0), None, Some(14.5), Some(3.0)]
    )
    .unwrap()
}

fn default_params() -> TrainParams {
    TrainParams::default()
}

#[test]
fn test_output_is_aligned_and_ordered() {
    let matrix = build_features(&trip_df(), &default_params()).unwrap();

    assert!(matrix.n_rows() > 0);
    assert_eq!(matrix.features.height(), matrix.target.len());
    let names: Vec<String> = matrix
        .features
        .get_column_names()
        .into_iter()
        .map(|s| s.to_string())
        .collect();
    assert_eq!(names, vec!["vendor_id", "passenger_count", "trip_distance"]);

    // rows 2 (null passengers), 3 (null fare) and 4 (null vendor) are dropped
    assert_eq!(matrix.n_rows(), 3);
    assert_eq!(matrix.y().unwrap().to_vec(), vec![6.5, 10.0, 3.0]);
    let x = matrix.x().unwrap();
    assert_eq!(x.column(2).to_vec(), vec![1.1, 2.4, 0.2]);
}

#[test]
fn test_missing_columns_enumerated() {
    let params = default_params()
        .with_target("total_amount")
        .with_features(["vendor_id", "pickup_zone", "trip_distance"]);

    match build_features(&trip_df(), &params).unwrap_err() {
        PipelineError::MissingColumns { missing } => {
            assert_eq!(missing, vec!["total_amount", "pickup_zone"]);
        }
        other => panic!("expected missing columns, got {other}"),
    }
}

#[test]
fn test_column_lookup_is_case_sensitive() {
    let params = default_params().with_features(["Vendor_ID"]);
    let err = build_features(&trip_df(), &params).unwrap_err();
    assert!(err.is_schema_error());
    assert!(err.to_string().contains("Vendor_ID"));
}

#[test]
fn test_all_targets_missing_is_empty_result() {
    let df = df!(
        "trip_distance" => &[1.0, 2.0],
        "fare_amount" => &[None::<f64>, None]
    )
    .unwrap();
    let params = default_params().with_features(["trip_distance"]);

    let err = build_features(&df, &params).unwrap_err();
    assert!(matches!(err, PipelineError::EmptyResultError(_)));
}

#[test]
fn test_text_feature_is_schema_error() {
    let params = default_params().with_features(["store_and_fwd_flag"]);
    let err = build_features(&trip_df(), &params).unwrap_err();
    assert!(matches!(err, PipelineError::SchemaError(ref m) if m.contains("store_and_fwd_flag")));
}

#[test]
fn test_target_preference_order() {
    let df = df!("a" => &[1.0], "y" => &[2.0], "label" => &[3.0]).unwrap();
    assert_eq!(choose_target(&df).unwrap(), "label");

    let df = df!("fare_amount" => &[1.0], "target" => &[2.0]).unwrap();
    assert_eq!(choose_target(&df).unwrap(), "fare_amount");

    let df = df!("a" => &[1.0], "b" => &[2.0], "c" => &[3.0]).unwrap();
    assert_eq!(choose_target(&df).unwrap(), "c");
}

#[test]
fn test_heuristic_mode_uses_every_other_column() {
    let df = df!(
        "tip" => &[1.0, 2.0, 3.0],
        "fare_amount" => &[10.0, 20.0, 30.0],
        "distance" => &[Some(1.0), None, Some(3.0)]
    )
    .unwrap();

    let (target, features) = heuristic_columns(&df).unwrap();
    assert_eq!(target, "fare_amount");
    assert_eq!(features, vec!["tip", "distance"]);

    // explicit params are ignored in heuristic mode
    let params = default_params().with_target("nope").with_features(["nope"]);
    let matrix = FeatureBuilder::new(ColumnSelection::Heuristic)
        .build(&df, &params)
        .unwrap();
    assert_eq!(matrix.target_column, "fare_amount");
    assert_eq!(matrix.feature_columns, vec!["tip", "distance"]);
    assert_eq!(matrix.n_rows(), 2);
}

#[test]
fn test_single_column_cannot_choose_target() {
    let df = df!("fare_amount" => &[1.0, 2.0]).unwrap();
    let err = FeatureBuilder::new(ColumnSelection::Heuristic)
        .build(&df, &default_params())
        .unwrap_err();
    assert!(matches!(err, PipelineError::SchemaError(_)));
}
