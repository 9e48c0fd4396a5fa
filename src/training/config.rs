//! Training configuration
//!
//! Parameters come from the `train` section of a YAML file and are overlaid
//! key by key onto built-in defaults. A missing file means "all defaults".

use crate::error::{PipelineError, Result};
use crate::preprocessing::ColumnSelection;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Default parameter file name, resolved relative to the working directory
pub const DEFAULT_PARAMS_PATH: &str = "params.yaml";
/// Default input dataset
pub const DEFAULT_DATA_PATH: &str = "data/green_tripdata_2025-01.parquet";
/// Default model artifact
pub const DEFAULT_MODEL_PATH: &str = "models/model.json";
/// Default metrics document
pub const DEFAULT_METRICS_PATH: &str = "metrics.json";

/// Resolved training parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainParams {
    /// Column the model predicts
    pub target_column: String,
    /// Model inputs, in order
    pub feature_columns: Vec<String>,
    /// Fraction of rows held out for evaluation, in (0, 1)
    pub test_size: f64,
    /// Seed for the split and for the forest
    pub random_state: u64,
    /// `linear_regression` or `random_forest`
    pub model_type: String,
}

impl Default for TrainParams {
    fn default() -> Self {
        Self {
            target_column: "fare_amount".to_string(),
            feature_columns: vec![
                "vendor_id".to_string(),
                "passenger_count".to_string(),
                "trip_distance".to_string(),
            ],
            test_size: 0.2,
            random_state: 42,
            model_type: "linear_regression".to_string(),
        }
    }
}

/// Per-key overrides as they appear in the file
#[derive(Debug, Default, Deserialize)]
struct TrainOverrides {
    target_column: Option<String>,
    feature_columns: Option<Vec<String>>,
    test_size: Option<f64>,
    random_state: Option<u64>,
    model_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ParamsFile {
    #[serde(default)]
    train: Option<TrainOverrides>,
}

impl TrainParams {
    /// Builder method to set the target column
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target_column = target.into();
        self
    }

    /// Builder method to set the feature columns
    pub fn with_features<I, S>(mut self, features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.feature_columns = features.into_iter().map(Into::into).collect();
        self
    }

    /// Builder method to set the model type
    pub fn with_model(mut self, model_type: impl Into<String>) -> Self {
        self.model_type = model_type.into();
        self
    }

    /// Builder method to set the held-out fraction
    pub fn with_test_size(mut self, test_size: f64) -> Self {
        self.test_size = test_size;
        self
    }

    /// Builder method to set the random state
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    fn overlay(mut self, overrides: TrainOverrides) -> Self {
        if let Some(target) = overrides.target_column {
            self.target_column = target;
        }
        if let Some(features) = overrides.feature_columns {
            self.feature_columns = features;
        }
        if let Some(test_size) = overrides.test_size {
            self.test_size = test_size;
        }
        if let Some(seed) = overrides.random_state {
            self.random_state = seed;
        }
        if let Some(model_type) = overrides.model_type {
            self.model_type = model_type;
        }
        self
    }

    /// Check the merged parameters.
    ///
    /// The model type is only checked for blankness here; the factory owns
    /// the list of supported estimators.
    pub fn validate(&self) -> Result<()> {
        self.validate_for(ColumnSelection::Explicit)
    }

    /// Check the parameters a run in `selection` mode actually reads.
    ///
    /// Heuristic selection ignores `target_column` and `feature_columns`, so
    /// only the split and model settings are checked there.
    pub fn validate_for(&self, selection: ColumnSelection) -> Result<()> {
        if selection == ColumnSelection::Explicit {
            self.validate_columns()?;
        }
        if self.model_type.trim().is_empty() {
            return Err(PipelineError::ConfigError(
                "train.model_type must not be empty".to_string(),
            ));
        }
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(PipelineError::ConfigError(format!(
                "train.test_size must be strictly between 0 and 1, got {}",
                self.test_size
            )));
        }
        Ok(())
    }

    fn validate_columns(&self) -> Result<()> {
        if self.feature_columns.is_empty() {
            return Err(PipelineError::ConfigError(
                "train.feature_columns must contain at least one column".to_string(),
            ));
        }
        if let Some(pos) = self.feature_columns.iter().position(|c| c.trim().is_empty()) {
            return Err(PipelineError::ConfigError(format!(
                "train.feature_columns[{}] is blank",
                pos
            )));
        }
        if self.target_column.trim().is_empty() {
            return Err(PipelineError::ConfigError(
                "train.target_column must not be empty".to_string(),
            ));
        }
        for (pos, name) in self.feature_columns.iter().enumerate() {
            if self.feature_columns[..pos].contains(name) {
                return Err(PipelineError::ConfigError(format!(
                    "train.feature_columns lists {:?} more than once",
                    name
                )));
            }
        }
        if self.feature_columns.contains(&self.target_column) {
            return Err(PipelineError::ConfigError(format!(
                "train.target_column {:?} is also listed as a feature",
                self.target_column
            )));
        }
        Ok(())
    }
}

/// Load training parameters from a YAML file, falling back to defaults.
pub fn load_params(path: impl AsRef<Path>) -> Result<TrainParams> {
    load_params_for(path, ColumnSelection::Explicit)
}

/// Like [`load_params`], validating only what a `selection` run reads.
pub fn load_params_for(
    path: impl AsRef<Path>,
    selection: ColumnSelection,
) -> Result<TrainParams> {
    let path = path.as_ref();

    if !path.exists() {
        info!(path = %path.display(), "Parameter file not found, using defaults");
        let params = TrainParams::default();
        params.validate_for(selection)?;
        return Ok(params);
    }

    let contents = std::fs::read_to_string(path).map_err(|e| {
        PipelineError::ConfigError(format!("failed to read {}: {}", path.display(), e))
    })?;

    let overrides = if contents.trim().is_empty() {
        None
    } else {
        let file: Option<ParamsFile> = serde_yaml::from_str(&contents).map_err(|e| {
            PipelineError::ConfigError(format!("failed to parse {}: {}", path.display(), e))
        })?;
        file.and_then(|f| f.train)
    };

    let params = match overrides {
        Some(overrides) => TrainParams::default().overlay(overrides),
        None => TrainParams::default(),
    };
    params.validate_for(selection)?;

    debug!(?params, "Loaded training parameters");
    Ok(params)
}

/// Locations and modes for one pipeline run.
///
/// Built once at process start and handed to the trainer.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub params_path: PathBuf,
    pub data_path: PathBuf,
    pub model_path: PathBuf,
    pub metrics_path: PathBuf,
    pub selection: ColumnSelection,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            params_path: PathBuf::from(DEFAULT_PARAMS_PATH),
            data_path: PathBuf::from(DEFAULT_DATA_PATH),
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            metrics_path: PathBuf::from(DEFAULT_METRICS_PATH),
            selection: ColumnSelection::Explicit,
        }
    }
}

impl PipelineConfig {
    /// Builder method to set the parameter file
    pub fn with_params_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.params_path = path.into();
        self
    }

    /// Builder method to set the input dataset
    pub fn with_data_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_path = path.into();
        self
    }

    /// Builder method to set the model artifact location
    pub fn with_model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.model_path = path.into();
        self
    }

    /// Builder method to set the metrics document location
    pub fn with_metrics_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.metrics_path = path.into();
        self
    }

    /// Builder method to set the column selection mode
    pub fn with_selection(mut self, selection: ColumnSelection) -> Self {
        self.selection = selection;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_params(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".yaml")
            .tempfile()
            .unwrap();
        write!(file, "{}", contents).unwrap();
        file
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let params = load_params(dir.path().join("params.yaml")).unwrap();
        assert_eq!(params, TrainParams::default());
        assert_eq!(params.test_size, 0.2);
        assert_eq!(params.random_state, 42);
        assert_eq!(params.target_column, "fare_amount");
        assert_eq!(
            params.feature_columns,
            vec!["vendor_id", "passenger_count", "trip_distance"]
        );
        assert_eq!(params.model_type, "linear_regression");
    }

    #[test]
    fn test_file_values_win_per_key() {
        let file = write_params(
            "train:\n  model_type: random_forest\n  test_size: 0.3\n",
        );
        let params = load_params(file.path()).unwrap();
        assert_eq!(params.model_type, "random_forest");
        assert_eq!(params.test_size, 0.3);
        // untouched keys keep defaults
        assert_eq!(params.random_state, 42);
        assert_eq!(params.target_column, "fare_amount");
    }

    #[test]
    fn test_other_sections_ignored() {
        let file = write_params(
            "features:\n  output: data/features.parquet\ntrain:\n  random_state: 7\n  extra: 1\n",
        );
        let params = load_params(file.path()).unwrap();
        assert_eq!(params.random_state, 7);
    }

    #[test]
    fn test_empty_file_and_empty_section() {
        let empty = write_params("");
        assert_eq!(load_params(empty.path()).unwrap(), TrainParams::default());

        let bare = write_params("train:\n");
        assert_eq!(load_params(bare.path()).unwrap(), TrainParams::default());
    }

    #[test]
    fn test_empty_feature_columns_rejected() {
        let file = write_params("train:\n  feature_columns: []\n");
        let err = load_params(file.path()).unwrap_err();
        assert!(matches!(err, PipelineError::ConfigError(_)));
        assert!(err.to_string().contains("feature_columns"));
    }

    #[test]
    fn test_out_of_range_test_size_rejected() {
        let file = write_params("train:\n  test_size: 1.5\n");
        let err = load_params(file.path()).unwrap_err();
        assert!(matches!(err, PipelineError::ConfigError(_)));
    }

    #[test]
    fn test_duplicate_and_target_features_rejected() {
        let dup = TrainParams::default().with_features(["trip_distance", "trip_distance"]);
        assert!(matches!(dup.validate(), Err(PipelineError::ConfigError(_))));

        let overlap = TrainParams::default().with_features(["fare_amount", "trip_distance"]);
        let err = overlap.validate().unwrap_err();
        assert!(err.to_string().contains("fare_amount"));
    }

    #[test]
    fn test_heuristic_mode_skips_column_checks() {
        let file = write_params(
            "train:\n  target_column: trip_distance\n  feature_columns: []\n",
        );
        assert!(matches!(
            load_params(file.path()),
            Err(PipelineError::ConfigError(_))
        ));

        let params = load_params_for(file.path(), ColumnSelection::Heuristic).unwrap();
        assert!(params.feature_columns.is_empty());

        // split settings are still checked
        let file = write_params("train:\n  feature_columns: []\n  test_size: 0.0\n");
        assert!(matches!(
            load_params_for(file.path(), ColumnSelection::Heuristic),
            Err(PipelineError::ConfigError(_))
        ));
    }

    #[test]
    fn test_malformed_yaml_is_config_error() {
        let file = write_params("train: [unclosed\n");
        let err = load_params(file.path()).unwrap_err();
        assert!(matches!(err, PipelineError::ConfigError(_)));
    }

    #[test]
    fn test_builder_pattern() {
        let params = TrainParams::default()
            .with_target("tip_amount")
            .with_features(["trip_distance"])
            .with_model("random_forest")
            .with_random_state(7);
        assert_eq!(params.target_column, "tip_amount");
        assert_eq!(params.feature_columns, vec!["trip_distance"]);
        assert_eq!(params.model_type, "random_forest");
        assert_eq!(params.random_state, 7);
    }
}
