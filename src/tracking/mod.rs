//! Experiment Tracking Module
//!
//! Records params, metrics and the model artifact of each training run:
//! - [`NoopTracker`] when nothing is configured
//! - [`LocalTracker`] for `file://` URIs and plain paths
//! - [`MlflowTracker`] for `http(s)://` tracking servers

pub mod mlflow;
pub mod storage;
pub mod tracker;

pub use mlflow::MlflowTracker;
pub use storage::{LocalTracker, RunRecord};
pub use tracker::{
    tracker_from_config, tracker_from_env, NoopTracker, RunStatus, Tracker, TrackingBackend,
    TrackingConfig, DEFAULT_EXPERIMENT_NAME, EXPERIMENT_NAME_ENV, TRACKING_URI_ENV,
};
