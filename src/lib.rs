//! tripfare - Batch trip-fare regression pipeline
//!
//! This crate turns a tabular trip dataset into a trained regression model
//! and a metrics report:
//! - Column selection, validation and null-dropping
//! - Seeded train/test split
//! - Linear regression and random forest regressors
//! - RMSE evaluation, model and metrics artifacts
//! - Optional experiment tracking (local store or MLflow)
//!
//! # Modules
//!
//! - [`preprocessing`] - Feature/target selection and numeric extraction
//! - [`training`] - Parameters, estimators and the [`training::Trainer`]
//! - [`tracking`] - Experiment tracking backends
//! - [`utils`] - Dataset readers and writers
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Core ML modules
pub mod preprocessing;
pub mod training;

// Infrastructure
pub mod tracking;
pub mod utils;

// Services
pub mod cli;

pub use error::{PipelineError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{PipelineError, Result};

    // Preprocessing
    pub use crate::preprocessing::{
        build_features, choose_target, extract, ColumnSelection, FeatureBuilder, FeatureMatrix,
    };

    // Training
    pub use crate::training::{
        load_params, make_model, Estimator, Metrics, ModelKind, PipelineConfig, RunSummary,
        TrainParams, TrainedModel, Trainer,
    };

    // Experiment tracking
    pub use crate::tracking::{tracker_from_env, NoopTracker, Tracker, TrackingConfig};

    // Data I/O
    pub use crate::utils::{DataLoader, DataSaver};
}
