//! Experiment tracker interface and backend selection

use super::mlflow::MlflowTracker;
use super::storage::LocalTracker;
use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Environment variable naming the tracking backend
pub const TRACKING_URI_ENV: &str = "MLFLOW_TRACKING_URI";
/// Environment variable naming the experiment
pub const EXPERIMENT_NAME_ENV: &str = "MLFLOW_EXPERIMENT_NAME";
/// Experiment used when none is named
pub const DEFAULT_EXPERIMENT_NAME: &str = "Default";

/// Status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    /// Run is currently running
    Running,
    /// Run completed successfully
    Finished,
    /// Run failed
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "RUNNING",
            RunStatus::Finished => "FINISHED",
            RunStatus::Failed => "FAILED",
        }
    }
}

/// Records one training run: params, metrics and artifacts.
///
/// Calls arrive in order `start_run`, logging calls, `end_run`. Logging
/// outside a started run is a [`PipelineError::TrackingError`].
pub trait Tracker {
    /// Short backend name for logs
    fn backend(&self) -> &'static str;

    /// `false` for the no-op tracker; the trainer skips tracking entirely
    fn is_enabled(&self) -> bool {
        true
    }

    /// Open a run and return its id
    fn start_run(&mut self) -> Result<String>;

    /// Record string parameters, in order
    fn log_params(&mut self, params: &[(String, String)]) -> Result<()>;

    /// Record one numeric metric
    fn log_metric(&mut self, key: &str, value: f64) -> Result<()>;

    /// Attach a file to the run
    fn log_artifact(&mut self, path: &Path) -> Result<()>;

    /// Close the run
    fn end_run(&mut self, status: RunStatus) -> Result<()>;
}

/// Tracker used when no backend is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTracker;

impl Tracker for NoopTracker {
    fn backend(&self) -> &'static str {
        "none"
    }

    fn is_enabled(&self) -> bool {
        false
    }

    fn start_run(&mut self) -> Result<String> {
        Ok(String::new())
    }

    fn log_params(&mut self, _params: &[(String, String)]) -> Result<()> {
        Ok(())
    }

    fn log_metric(&mut self, _key: &str, _value: f64) -> Result<()> {
        Ok(())
    }

    fn log_artifact(&mut self, _path: &Path) -> Result<()> {
        Ok(())
    }

    fn end_run(&mut self, _status: RunStatus) -> Result<()> {
        Ok(())
    }
}

/// Where runs are recorded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackingBackend {
    None,
    /// Local directory store
    Local(PathBuf),
    /// MLflow tracking server base URL
    Mlflow(String),
}

/// Tracking settings, read once at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingConfig {
    pub uri: Option<String>,
    pub experiment_name: String,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            uri: None,
            experiment_name: DEFAULT_EXPERIMENT_NAME.to_string(),
        }
    }
}

impl TrackingConfig {
    /// Read `MLFLOW_TRACKING_URI` and `MLFLOW_EXPERIMENT_NAME`
    pub fn from_env() -> Self {
        Self::from_values(
            std::env::var(TRACKING_URI_ENV).ok(),
            std::env::var(EXPERIMENT_NAME_ENV).ok(),
        )
    }

    /// Blank values count as unset.
    pub fn from_values(uri: Option<String>, experiment_name: Option<String>) -> Self {
        let uri = uri
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());
        let experiment_name = experiment_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| DEFAULT_EXPERIMENT_NAME.to_string());
        Self {
            uri,
            experiment_name,
        }
    }

    /// Resolve the URI scheme.
    pub fn backend(&self) -> Result<TrackingBackend> {
        let uri = match &self.uri {
            None => return Ok(TrackingBackend::None),
            Some(uri) => uri.as_str(),
        };

        if uri.starts_with("http://") || uri.starts_with("https://") {
            return Ok(TrackingBackend::Mlflow(uri.trim_end_matches('/').to_string()));
        }
        if let Some(path) = uri.strip_prefix("file://") {
            if path.is_empty() {
                return Err(PipelineError::ConfigError(format!(
                    "{} has an empty file:// path",
                    TRACKING_URI_ENV
                )));
            }
            return Ok(TrackingBackend::Local(PathBuf::from(path)));
        }
        if let Some((scheme, _)) = uri.split_once("://") {
            return Err(PipelineError::ConfigError(format!(
                "unsupported {} scheme {:?} in {:?} (expected http, https or file)",
                TRACKING_URI_ENV, scheme, uri
            )));
        }
        Ok(TrackingBackend::Local(PathBuf::from(uri)))
    }
}

/// Build the tracker for `config`.
pub fn tracker_from_config(config: &TrackingConfig) -> Result<Box<dyn Tracker>> {
    let tracker: Box<dyn Tracker> = match config.backend()? {
        TrackingBackend::None => Box::new(NoopTracker),
        TrackingBackend::Local(dir) => {
            Box::new(LocalTracker::new(dir, config.experiment_name.clone()))
        }
        TrackingBackend::Mlflow(base_url) => {
            Box::new(MlflowTracker::new(base_url, config.experiment_name.clone()))
        }
    };

    info!(
        backend = tracker.backend(),
        experiment = %config.experiment_name,
        "Experiment tracking configured"
    );
    Ok(tracker)
}

/// Build the tracker from the process environment.
pub fn tracker_from_env() -> Result<Box<dyn Tracker>> {
    tracker_from_config(&TrackingConfig::from_env())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(uri: &str) -> TrackingConfig {
        TrackingConfig::from_values(Some(uri.to_string()), None)
    }

    #[test]
    fn test_unset_or_blank_is_noop() {
        assert_eq!(TrackingConfig::default().backend().unwrap(), TrackingBackend::None);
        assert_eq!(config("   ").backend().unwrap(), TrackingBackend::None);

        let tracker = tracker_from_config(&config("")).unwrap();
        assert!(!tracker.is_enabled());
    }

    #[test]
    fn test_experiment_name_default() {
        let cfg = TrackingConfig::from_values(None, Some(" ".to_string()));
        assert_eq!(cfg.experiment_name, "Default");

        let cfg = TrackingConfig::from_values(None, Some("taxi".to_string()));
        assert_eq!(cfg.experiment_name, "taxi");
    }

    #[test]
    fn test_scheme_dispatch() {
        assert_eq!(
            config("http://localhost:5000/").backend().unwrap(),
            TrackingBackend::Mlflow("http://localhost:5000".to_string())
        );
        assert_eq!(
            config("file:///tmp/mlruns").backend().unwrap(),
            TrackingBackend::Local(PathBuf::from("/tmp/mlruns"))
        );
        assert_eq!(
            config("mlruns").backend().unwrap(),
            TrackingBackend::Local(PathBuf::from("mlruns"))
        );
        assert!(matches!(
            config("databricks://profile").backend(),
            Err(PipelineError::ConfigError(_))
        ));
    }

    #[test]
    fn test_noop_accepts_everything() {
        let mut tracker = NoopTracker;
        tracker.start_run().unwrap();
        tracker
            .log_params(&[("model_type".to_string(), "linear_regression".to_string())])
            .unwrap();
        tracker.log_metric("rmse", 1.0).unwrap();
        tracker.log_artifact(Path::new("missing.json")).unwrap();
        tracker.end_run(RunStatus::Finished).unwrap();
    }
}
