//! Model training module
//!
//! Provides:
//! - Parameter loading and the run configuration ([`config`])
//! - Linear regression and a random forest regressor
//! - A seeded train/test split
//! - The [`Trainer`] that runs the whole pipeline

mod config;
mod engine;
mod models;
pub mod decision_tree;
pub mod linear_models;
pub mod random_forest;
pub mod split;

pub use config::{
    load_params, load_params_for, PipelineConfig, TrainParams, DEFAULT_DATA_PATH,
    DEFAULT_METRICS_PATH, DEFAULT_MODEL_PATH, DEFAULT_PARAMS_PATH,
};
pub use decision_tree::{DecisionTree, TreeNode};
pub use engine::{tracked_params, RunSummary, Trainer};
pub use linear_models::LinearRegression;
pub use models::{
    make_model, rmse, Estimator, Metrics, Model, ModelKind, TrainedModel, FOREST_N_ESTIMATORS,
};
pub use random_forest::RandomForest;
pub use split::{split_indices, train_test_split, SplitIndices, TrainTestSplit};
