//! Error types for the tripfare pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Main error type for the pipeline.
///
/// The first five variants are the validation taxonomy: each one aborts the
/// run before any artifact is written. The rest wrap I/O, parsing and
/// numerical failures from the plumbing.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Schema error: missing required columns {missing:?}")]
    MissingColumns { missing: Vec<String> },

    #[error("Schema error: {0}")]
    SchemaError(String),

    #[error("Empty result: {0}")]
    EmptyResultError(String),

    #[error("Unsupported model_type: {0:?} (expected \"linear_regression\" or \"random_forest\")")]
    UnsupportedModelError(String),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Computation error: {0}")]
    ComputationError(String),

    #[error("Tracking error: {0}")]
    TrackingError(String),
}

impl PipelineError {
    /// True for both flavours of schema violation.
    pub fn is_schema_error(&self) -> bool {
        matches!(
            self,
            PipelineError::MissingColumns { .. } | PipelineError::SchemaError(_)
        )
    }
}

impl From<polars::error::PolarsError> for PipelineError {
    fn from(err: polars::error::PolarsError) -> Self {
        PipelineError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for PipelineError {
    fn from(err: serde_yaml::Error) -> Self {
        PipelineError::ConfigError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for PipelineError {
    fn from(err: ndarray::ShapeError) -> Self {
        PipelineError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
