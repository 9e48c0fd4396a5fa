//! Model factory, fitted-model artifact and metrics

use super::linear_models::LinearRegression;
use super::random_forest::RandomForest;
use crate::error::{PipelineError, Result};
use crate::preprocessing::features::{column_names, columns_to_array2};
use crate::utils::write_atomic;
use ndarray::{Array1, Array2};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Trees in the forest regressor
pub const FOREST_N_ESTIMATORS: usize = 100;

/// Common interface of the regressors
pub trait Model {
    /// Fit the model to training data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Make predictions
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;
}

impl Model for LinearRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        LinearRegression::fit(self, x, y).map(|_| ())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        LinearRegression::predict(self, x)
    }
}

impl Model for RandomForest {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        RandomForest::fit(self, x, y).map(|_| ())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        RandomForest::predict(self, x)
    }
}

/// Supported model identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    LinearRegression,
    RandomForest,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::LinearRegression => "linear_regression",
            ModelKind::RandomForest => "random_forest",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = PipelineError;

    /// Exact, case-sensitive match.
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "linear_regression" => Ok(ModelKind::LinearRegression),
            "random_forest" => Ok(ModelKind::RandomForest),
            other => Err(PipelineError::UnsupportedModelError(other.to_string())),
        }
    }
}

/// An unfitted or fitted regressor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Estimator {
    LinearRegression(LinearRegression),
    RandomForest(RandomForest),
}

impl Estimator {
    pub fn kind(&self) -> ModelKind {
        match self {
            Estimator::LinearRegression(_) => ModelKind::LinearRegression,
            Estimator::RandomForest(_) => ModelKind::RandomForest,
        }
    }

    fn as_model(&self) -> &dyn Model {
        match self {
            Estimator::LinearRegression(m) => m,
            Estimator::RandomForest(m) => m,
        }
    }

    fn as_model_mut(&mut self) -> &mut dyn Model {
        match self {
            Estimator::LinearRegression(m) => m,
            Estimator::RandomForest(m) => m,
        }
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.as_model_mut().fit(x, y)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.as_model().predict(x)
    }
}

/// Build an unfitted estimator for `model_type`.
///
/// The forest is seeded with `random_state`; linear regression ignores it.
pub fn make_model(model_type: &str, random_state: u64) -> Result<Estimator> {
    let estimator = match model_type.parse::<ModelKind>()? {
        ModelKind::LinearRegression => Estimator::LinearRegression(LinearRegression::new()),
        ModelKind::RandomForest => Estimator::RandomForest(
            RandomForest::new_regressor(FOREST_N_ESTIMATORS).with_random_state(random_state),
        ),
    };
    Ok(estimator)
}

/// Root mean squared error
pub fn rmse(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    if y_true.len() != y_pred.len() {
        return Err(PipelineError::ShapeError {
            expected: format!("{} predictions", y_true.len()),
            actual: format!("{} predictions", y_pred.len()),
        });
    }
    if y_true.is_empty() {
        return Err(PipelineError::EmptyResultError(
            "cannot compute RMSE on zero rows".to_string(),
        ));
    }

    let mse = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (p - t).powi(2))
        .sum::<f64>()
        / y_true.len() as f64;
    Ok(mse.sqrt())
}

/// Evaluation report written after each run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub rmse: f64,
    pub model_type: String,
    pub target_column: String,
    pub feature_columns: Vec<String>,
    pub n_train: usize,
    pub n_test: usize,
}

impl Metrics {
    /// Write as 2-space indented JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        write_atomic(path, json.as_bytes())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// Fitted estimator plus the column contract it was trained with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    pub model_type: ModelKind,
    pub target_column: String,
    pub feature_columns: Vec<String>,
    pub estimator: Estimator,
}

impl TrainedModel {
    pub fn new(
        estimator: Estimator,
        target_column: impl Into<String>,
        feature_columns: Vec<String>,
    ) -> Self {
        Self {
            model_type: estimator.kind(),
            target_column: target_column.into(),
            feature_columns,
            estimator,
        }
    }

    /// Predict from a table carrying the training feature columns.
    /// Extra columns are ignored.
    pub fn predict(&self, df: &DataFrame) -> Result<Array1<f64>> {
        let present = column_names(df);
        let missing: Vec<String> = self
            .feature_columns
            .iter()
            .filter(|c| !present.contains(c))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(PipelineError::MissingColumns { missing });
        }

        let x = columns_to_array2(df, &self.feature_columns)?;
        self.estimator.predict(&x)
    }

    /// Save the model as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        write_atomic(path, json.as_bytes())
    }

    /// Load a model saved by [`TrainedModel::save`]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}
