//! Feature and target selection
//!
//! Turns a raw [`DataFrame`] into a [`FeatureMatrix`]: the requested columns
//! are checked for existence and type, incomplete rows are dropped, and an
//! empty result is rejected.

use crate::error::{PipelineError, Result};
use crate::training::TrainParams;
use ndarray::{Array1, Array2};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Target names tried in order when no target is declared
pub const PREFERRED_TARGETS: [&str; 4] = ["fare_amount", "target", "label", "y"];

/// How target and feature columns are chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnSelection {
    /// Use `target_column` and `feature_columns` from the parameters
    #[default]
    Explicit,
    /// Pick the target with [`choose_target`], every other column is a feature
    Heuristic,
}

/// Cleaned model inputs and target, row-aligned
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    /// Feature columns only, in the requested order
    pub features: DataFrame,
    /// Target values for the same rows
    pub target: Column,
    /// Resolved target column name
    pub target_column: String,
    /// Resolved feature column names, in order
    pub feature_columns: Vec<String>,
}

impl FeatureMatrix {
    /// Number of surviving rows
    pub fn n_rows(&self) -> usize {
        self.features.height()
    }

    /// Features as a row-major `f64` matrix
    pub fn x(&self) -> Result<Array2<f64>> {
        columns_to_array2(&self.features, &self.feature_columns)
    }

    /// Target as an `f64` vector
    pub fn y(&self) -> Result<Array1<f64>> {
        column_to_array1(&self.target)
    }
}

/// Builds a [`FeatureMatrix`] in one of the [`ColumnSelection`] modes
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureBuilder {
    selection: ColumnSelection,
}

impl FeatureBuilder {
    pub fn new(selection: ColumnSelection) -> Self {
        Self { selection }
    }

    pub fn selection(&self) -> ColumnSelection {
        self.selection
    }

    /// Work out which columns play target and features.
    pub fn resolve_columns(
        &self,
        df: &DataFrame,
        params: &TrainParams,
    ) -> Result<(String, Vec<String>)> {
        match self.selection {
            ColumnSelection::Explicit => Ok((
                params.target_column.clone(),
                params.feature_columns.clone(),
            )),
            ColumnSelection::Heuristic => heuristic_columns(df),
        }
    }

    /// Select, validate and clean.
    pub fn build(&self, df: &DataFrame, params: &TrainParams) -> Result<FeatureMatrix> {
        let (target, features) = self.resolve_columns(df, params)?;
        debug!(
            mode = ?self.selection,
            target = %target,
            features = ?features,
            "Resolved columns"
        );
        select_and_clean(df, &target, &features)
    }
}

/// Build features from explicitly configured columns.
pub fn build_features(df: &DataFrame, params: &TrainParams) -> Result<FeatureMatrix> {
    FeatureBuilder::new(ColumnSelection::Explicit).build(df, params)
}

/// Pick a target column for a table with no declared schema.
///
/// The first of [`PREFERRED_TARGETS`] present wins; otherwise the last column.
pub fn choose_target(df: &DataFrame) -> Result<String> {
    let columns = column_names(df);
    if columns.len() < 2 {
        return Err(PipelineError::SchemaError(format!(
            "need at least two columns to choose a target and features, got {}",
            columns.len()
        )));
    }

    if let Some(preferred) = PREFERRED_TARGETS
        .iter()
        .find(|candidate| columns.iter().any(|c| c == *candidate))
    {
        return Ok(preferred.to_string());
    }

    columns
        .last()
        .cloned()
        .ok_or_else(|| PipelineError::SchemaError("dataset has no columns".to_string()))
}

/// Chosen target plus every other column, in dataset order.
pub fn heuristic_columns(df: &DataFrame) -> Result<(String, Vec<String>)> {
    let target = choose_target(df)?;
    let features: Vec<String> = column_names(df)
        .into_iter()
        .filter(|c| *c != target)
        .collect();

    if features.is_empty() {
        return Err(PipelineError::SchemaError(format!(
            "no feature columns left after excluding target {:?}",
            target
        )));
    }

    Ok((target, features))
}

fn select_and_clean(df: &DataFrame, target: &str, features: &[String]) -> Result<FeatureMatrix> {
    let present = column_names(df);

    let mut missing: Vec<String> = Vec::new();
    for name in std::iter::once(target).chain(features.iter().map(String::as_str)) {
        if !present.iter().any(|c| c == name) && !missing.iter().any(|m| m == name) {
            missing.push(name.to_string());
        }
    }
    if !missing.is_empty() {
        return Err(PipelineError::MissingColumns { missing });
    }

    for name in features.iter().map(String::as_str).chain(std::iter::once(target)) {
        let column = df.column(name)?;
        let dtype = column.dtype();
        if !is_model_input_dtype(dtype) && !is_all_null(column) {
            return Err(PipelineError::SchemaError(format!(
                "column {:?} has non-numeric type {}",
                name, dtype
            )));
        }
    }

    let selection: Vec<&str> = features
        .iter()
        .map(String::as_str)
        .chain(std::iter::once(target))
        .collect();
    let data = df.select(selection)?;
    let n_input = data.height();

    // Target first, then features. Both filters always run; the net row set
    // does not depend on the order.
    let target_mask = present_mask(data.column(target)?)?;
    let data = data.filter(&mask_to_chunked(&target_mask))?;
    let after_target = data.height();

    let feature_mask = features
        .iter()
        .map(|name| present_mask(data.column(name)?))
        .try_fold(vec![true; after_target], |acc, mask| {
            mask.map(|m| acc.iter().zip(m).map(|(a, b)| *a && b).collect::<Vec<bool>>())
        })?;
    let data = data.filter(&mask_to_chunked(&feature_mask))?;
    let n_output = data.height();

    info!(
        rows_in = n_input,
        dropped_missing_target = n_input - after_target,
        dropped_missing_features = after_target - n_output,
        rows_out = n_output,
        "Cleaned feature rows"
    );

    if n_output == 0 {
        return Err(PipelineError::EmptyResultError(format!(
            "no rows remain after dropping missing values for features {:?} / target {:?} ({} input rows)",
            features, target, n_input
        )));
    }

    let target_column = data.column(target)?.clone();
    let feature_frame = data.select(features.iter().map(String::as_str))?;

    Ok(FeatureMatrix {
        features: feature_frame,
        target: target_column,
        target_column: target.to_string(),
        feature_columns: features.to_vec(),
    })
}

/// Column names in dataset order
pub(crate) fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .into_iter()
        .map(|name| name.to_string())
        .collect()
}

/// Integer and floating point types
pub(crate) fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

fn is_model_input_dtype(dtype: &DataType) -> bool {
    is_numeric_dtype(dtype) || matches!(dtype, DataType::Boolean)
}

/// A column without a single value has no usable type: CSV inference reads
/// it as text and frame builders give it the `Null` dtype. Such columns are
/// left to the missing-value drop.
pub(crate) fn is_all_null(column: &Column) -> bool {
    matches!(column.dtype(), DataType::Null) || column.null_count() == column.len()
}

/// `true` where a value is present. NaN counts as missing in float columns.
pub(crate) fn present_mask(column: &Column) -> Result<Vec<bool>> {
    if column.dtype().is_float() {
        let values = column.cast(&DataType::Float64)?;
        Ok(values
            .f64()?
            .into_iter()
            .map(|v| v.is_some_and(|x| !x.is_nan()))
            .collect())
    } else {
        Ok(column
            .is_not_null()
            .into_iter()
            .map(|v| v.unwrap_or(false))
            .collect())
    }
}

pub(crate) fn mask_to_chunked(mask: &[bool]) -> BooleanChunked {
    BooleanChunked::from_slice(PlSmallStr::from_static("keep"), mask)
}

/// Extract named columns into a row-major `Array2<f64>`.
pub(crate) fn columns_to_array2(df: &DataFrame, col_names: &[String]) -> Result<Array2<f64>> {
    let n_rows = df.height();
    let n_cols = col_names.len();

    let col_data: Vec<Array1<f64>> = col_names
        .iter()
        .map(|name| column_to_array1(df.column(name)?))
        .collect::<Result<Vec<_>>>()?;

    Ok(Array2::from_shape_fn((n_rows, n_cols), |(r, c)| col_data[c][r]))
}

pub(crate) fn column_to_array1(column: &Column) -> Result<Array1<f64>> {
    let as_f64 = column.cast(&DataType::Float64)?;
    as_f64
        .f64()?
        .into_iter()
        .enumerate()
        .map(|(row, v)| {
            v.ok_or_else(|| {
                PipelineError::DataError(format!(
                    "column {:?} has a missing value at row {}",
                    column.name().as_str(),
                    row
                ))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(target: &str, features: &[&str]) -> TrainParams {
        TrainParams::default()
            .with_target(target)
            .with_features(features.iter().copied())
    }

    fn trips() -> DataFrame {
        df!(
            "vendor_id" => &[Some(1i64), Some(2), None, Some(1), Some(2)],
            "trip_distance" => &[Some(1.2), Some(f64::NAN), Some(3.1), Some(0.4), Some(2.2)],
            "fare_amount" => &[Some(7.5), Some(12.0), Some(14.0), None, Some(11.0)]
        )
        .unwrap()
    }

    #[test]
    fn test_drops_missing_target_and_features() {
        let df = trips();
        let matrix = build_features(&df, &params("fare_amount", &["vendor_id", "trip_distance"])).unwrap();

        // row 1 has NaN distance, row 2 null vendor, row 3 null fare
        assert_eq!(matrix.n_rows(), 2);
        assert_eq!(matrix.target.len(), 2);
        assert_eq!(matrix.y().unwrap().to_vec(), vec![7.5, 11.0]);

        let x = matrix.x().unwrap();
        assert_eq!(x.shape(), &[2, 2]);
        assert_eq!(x[[1, 0]], 2.0);
        assert_eq!(x[[1, 1]], 2.2);
    }

    #[test]
    fn test_feature_order_follows_params() {
        let df = trips();
        let matrix = build_features(&df, &params("fare_amount", &["trip_distance", "vendor_id"])).unwrap();
        assert_eq!(column_names(&matrix.features), vec!["trip_distance", "vendor_id"]);
    }

    #[test]
    fn test_missing_columns_listed() {
        let df = trips();
        let err = build_features(&df, &params("total", &["vendor_id", "Trip_Distance"])).unwrap_err();
        match err {
            PipelineError::MissingColumns { missing } => {
                assert_eq!(missing, vec!["total", "Trip_Distance"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_text_feature_rejected() {
        let df = df!(
            "flag" => &["N", "Y"],
            "fare_amount" => &[1.0, 2.0]
        )
        .unwrap();
        let err = build_features(&df, &params("fare_amount", &["flag"])).unwrap_err();
        assert!(matches!(err, PipelineError::SchemaError(_)));
        assert!(err.to_string().contains("flag"));
    }

    #[test]
    fn test_all_null_target_is_empty_result() {
        let mut df = df!("trip_distance" => &[1.0, 2.0, 3.0]).unwrap();
        df.with_column(Column::full_null("fare_amount".into(), 3, &DataType::Null))
            .unwrap();
        let err = build_features(&df, &params("fare_amount", &["trip_distance"])).unwrap_err();
        assert!(matches!(err, PipelineError::EmptyResultError(_)), "{err}");

        let df = df!(
            "trip_distance" => &[1.0, 2.0],
            "fare_amount" => &[None::<&str>, None]
        )
        .unwrap();
        let err = build_features(&df, &params("fare_amount", &["trip_distance"])).unwrap_err();
        assert!(matches!(err, PipelineError::EmptyResultError(_)), "{err}");
    }

    #[test]
    fn test_choose_target_preference() {
        let df = df!("a" => &[1.0], "label" => &[2.0], "target" => &[3.0]).unwrap();
        assert_eq!(choose_target(&df).unwrap(), "target");

        let df = df!("a" => &[1.0], "b" => &[2.0]).unwrap();
        assert_eq!(choose_target(&df).unwrap(), "b");
    }

    #[test]
    fn test_choose_target_needs_two_columns() {
        let df = df!("fare_amount" => &[1.0]).unwrap();
        assert!(matches!(choose_target(&df), Err(PipelineError::SchemaError(_))));
    }
}
