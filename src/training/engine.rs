//! Training run orchestration
//!
//! One [`Trainer::run`] performs: load params, check the model type, load
//! the dataset, build features, split, fit, score, persist the model and the
//! metrics, then report to the tracker. Any validation failure stops the run
//! before the first artifact is written.

use super::config::{load_params_for, PipelineConfig, TrainParams};
use super::models::{make_model, rmse, Metrics, TrainedModel};
use super::split::train_test_split;
use crate::error::{PipelineError, Result};
use crate::preprocessing::FeatureBuilder;
use crate::tracking::{NoopTracker, RunStatus, Tracker};
use crate::utils::DataLoader;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn};

/// Outcome of a successful run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub metrics: Metrics,
    pub model_path: PathBuf,
    pub metrics_path: PathBuf,
    /// Tracking run id, when a tracker is configured
    pub run_id: Option<String>,
}

/// Runs the training pipeline for one [`PipelineConfig`]
pub struct Trainer {
    config: PipelineConfig,
    tracker: Box<dyn Tracker>,
}

impl Trainer {
    /// Create a trainer reporting to `tracker`
    pub fn new(config: PipelineConfig, tracker: Box<dyn Tracker>) -> Self {
        Self { config, tracker }
    }

    /// Create a trainer without experiment tracking
    pub fn untracked(config: PipelineConfig) -> Self {
        Self::new(config, Box::new(NoopTracker))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Execute the pipeline end to end.
    pub fn run(&mut self) -> Result<RunSummary> {
        let start = Instant::now();

        let params = load_params_for(&self.config.params_path, self.config.selection)?;
        info!(
            model_type = %params.model_type,
            test_size = params.test_size,
            random_state = params.random_state,
            "Loaded parameters"
        );

        let mut estimator = make_model(&params.model_type, params.random_state)?;

        let df = DataLoader::new().load_auto(&self.config.data_path)?;
        info!(
            path = %self.config.data_path.display(),
            rows = df.height(),
            cols = df.width(),
            "Loaded dataset"
        );

        let matrix = FeatureBuilder::new(self.config.selection).build(&df, &params)?;
        let x = matrix.x()?;
        let y = matrix.y()?;

        let split = train_test_split(&x, &y, params.test_size, params.random_state)?;
        info!(n_train = split.n_train(), n_test = split.n_test(), "Split dataset");

        let fit_start = Instant::now();
        estimator.fit(&split.x_train, &split.y_train)?;
        let predictions = estimator.predict(&split.x_test)?;
        let score = rmse(&split.y_test, &predictions)?;
        info!(
            model_type = %estimator.kind(),
            rmse = score,
            fit_secs = fit_start.elapsed().as_secs_f64(),
            "Model evaluated"
        );

        let metrics = Metrics {
            rmse: score,
            model_type: params.model_type.clone(),
            target_column: matrix.target_column.clone(),
            feature_columns: matrix.feature_columns.clone(),
            n_train: split.n_train(),
            n_test: split.n_test(),
        };

        let model = TrainedModel::new(
            estimator,
            matrix.target_column,
            matrix.feature_columns,
        );
        model.save(&self.config.model_path)?;
        info!(path = %self.config.model_path.display(), "Saved model");

        metrics.save(&self.config.metrics_path)?;
        info!(path = %self.config.metrics_path.display(), "Saved metrics");

        let run_id = self.track(&params, &metrics)?;

        info!(
            rmse = metrics.rmse,
            elapsed_secs = start.elapsed().as_secs_f64(),
            "Training run complete"
        );

        Ok(RunSummary {
            metrics,
            model_path: self.config.model_path.clone(),
            metrics_path: self.config.metrics_path.clone(),
            run_id,
        })
    }

    /// Report the finished run. Once a run is open, any failure closes it
    /// as failed and is returned as a tracking error.
    fn track(&mut self, params: &TrainParams, metrics: &Metrics) -> Result<Option<String>> {
        if !self.tracker.is_enabled() {
            return Ok(None);
        }

        let run_id = self.tracker.start_run().map_err(as_tracking_error)?;
        info!(backend = self.tracker.backend(), run_id = %run_id, "Tracking run started");

        let logged = log_run(self.tracker.as_mut(), &self.config, params, metrics);
        match logged {
            Ok(()) => {
                self.tracker
                    .end_run(RunStatus::Finished)
                    .map_err(as_tracking_error)?;
                info!(run_id = %run_id, "Tracking run finished");
                Ok(Some(run_id))
            }
            Err(e) => {
                warn!(run_id = %run_id, error = %e, "Tracking failed, closing run as failed");
                if let Err(close) = self.tracker.end_run(RunStatus::Failed) {
                    warn!(run_id = %run_id, error = %close, "Could not mark run as failed");
                }
                Err(as_tracking_error(e))
            }
        }
    }
}

/// Parameters recorded for every run, in a fixed order
pub fn tracked_params(params: &TrainParams, metrics: &Metrics) -> Vec<(String, String)> {
    vec![
        ("model_type".to_string(), params.model_type.clone()),
        ("test_size".to_string(), params.test_size.to_string()),
        ("random_state".to_string(), params.random_state.to_string()),
        ("target_column".to_string(), metrics.target_column.clone()),
        ("feature_columns".to_string(), metrics.feature_columns.join(",")),
    ]
}

fn log_run(
    tracker: &mut dyn Tracker,
    config: &PipelineConfig,
    params: &TrainParams,
    metrics: &Metrics,
) -> Result<()> {
    tracker.log_params(&tracked_params(params, metrics))?;
    tracker.log_metric("rmse", metrics.rmse)?;
    tracker.log_artifact(&config.model_path)?;
    Ok(())
}

fn as_tracking_error(err: PipelineError) -> PipelineError {
    match err {
        PipelineError::TrackingError(_) => err,
        other => PipelineError::TrackingError(other.to_string()),
    }
}
