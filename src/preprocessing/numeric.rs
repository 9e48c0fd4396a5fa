//! Numeric feature extraction job
//!
//! Standalone preprocessing step: keep the numeric columns of a raw table,
//! drop incomplete rows and write the result.

use super::features::{
    column_names, is_all_null, is_numeric_dtype, mask_to_chunked, present_mask,
};
use crate::error::{PipelineError, Result};
use crate::utils::{DataLoader, DataSaver};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// What the extraction job kept
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractSummary {
    pub output_path: PathBuf,
    pub columns: Vec<String>,
    pub dropped_columns: Vec<String>,
    pub rows_in: usize,
    pub rows_out: usize,
}

/// Keep numeric columns and complete rows.
///
/// A column with no values at all counts as numeric, so it empties the
/// result instead of being dropped as text.
pub fn numeric_features(df: &DataFrame) -> Result<DataFrame> {
    let numeric: Vec<String> = df
        .get_columns()
        .iter()
        .filter(|c| is_numeric_dtype(c.dtype()) || is_all_null(c))
        .map(|c| c.name().to_string())
        .collect();

    if numeric.is_empty() {
        return Err(PipelineError::EmptyResultError(format!(
            "no numeric columns among {:?}",
            column_names(df)
        )));
    }

    let data = df.select(numeric.iter().map(String::as_str))?;
    let mut keep = vec![true; data.height()];
    for column in data.get_columns() {
        for (k, present) in keep.iter_mut().zip(present_mask(column)?) {
            *k = *k && present;
        }
    }
    let data = data.filter(&mask_to_chunked(&keep))?;

    if data.height() == 0 {
        return Err(PipelineError::EmptyResultError(format!(
            "no rows remain after dropping missing values in numeric columns {:?}",
            numeric
        )));
    }

    Ok(data)
}

/// Read `input_path`, extract numeric features and write them to `output_path`.
pub fn extract(input_path: impl AsRef<Path>, output_path: impl AsRef<Path>) -> Result<ExtractSummary> {
    let input_path = input_path.as_ref();
    let output_path = output_path.as_ref();

    let df = DataLoader::new().load_auto(input_path)?;
    let rows_in = df.height();
    info!(path = %input_path.display(), rows = rows_in, cols = df.width(), "Loaded raw dataset");

    let mut features = numeric_features(&df)?;
    let columns = column_names(&features);
    let dropped_columns: Vec<String> = column_names(&df)
        .into_iter()
        .filter(|c| !columns.contains(c))
        .collect();

    DataSaver::save_auto(&mut features, output_path)?;
    info!(
        path = %output_path.display(),
        rows = features.height(),
        kept = ?columns,
        dropped = ?dropped_columns,
        "Wrote numeric features"
    );

    Ok(ExtractSummary {
        output_path: output_path.to_path_buf(),
        columns,
        dropped_columns,
        rows_in,
        rows_out: features.height(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_numeric_and_complete_rows() {
        let df = df!(
            "a" => &[1i64, 2, 3],
            "b" => &["x", "y", "z"],
            "c" => &[Some(0.5), None, Some(1.5)]
        )
        .unwrap();

        let out = numeric_features(&df).unwrap();
        assert_eq!(column_names(&out), vec!["a", "c"]);
        assert_eq!(out.height(), 2);
        let a: Vec<Option<i64>> = out.column("a").unwrap().i64().unwrap().into_iter().collect();
        assert_eq!(a, vec![Some(1), Some(3)]);
    }

    #[test]
    fn test_no_numeric_columns() {
        let df = df!("b" => &["x", "y"]).unwrap();
        assert!(matches!(
            numeric_features(&df),
            Err(PipelineError::EmptyResultError(_))
        ));
    }

    #[test]
    fn test_all_null_column_empties_result() {
        let mut df = df!("a" => &[1i64, 2, 3], "b" => &["x", "y", "z"]).unwrap();
        df.with_column(Column::full_null("c".into(), 3, &DataType::Null))
            .unwrap();

        let err = numeric_features(&df).unwrap_err();
        assert!(matches!(err, PipelineError::EmptyResultError(_)));
    }

    #[test]
    fn test_all_rows_incomplete() {
        let df = df!(
            "a" => &[Some(1.0), None],
            "c" => &[None, Some(2.0)]
        )
        .unwrap();
        let err = numeric_features(&df).unwrap_err();
        assert!(matches!(err, PipelineError::EmptyResultError(_)));
    }
}
