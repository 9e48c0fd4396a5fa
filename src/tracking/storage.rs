//! Local file-store tracker
//!
//! Layout: `{base_dir}/{experiment}/{run_id}/run.json` plus copied files
//! under `{run_id}/artifacts/`. `run.json` is rewritten after every call so
//! an interrupted run still leaves a readable record.

use super::tracker::{RunStatus, Tracker};
use crate::error::{PipelineError, Result};
use crate::utils::write_atomic;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

/// A run as persisted in `run.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub experiment_name: String,
    pub status: RunStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub params: BTreeMap<String, String>,
    pub metrics: BTreeMap<String, f64>,
    /// Artifact file names, relative to the run's `artifacts/` directory
    pub artifacts: Vec<String>,
}

impl RunRecord {
    fn new(experiment_name: &str) -> Self {
        Self {
            run_id: Uuid::new_v4().simple().to_string(),
            experiment_name: experiment_name.to_string(),
            status: RunStatus::Running,
            start_time: Utc::now(),
            end_time: None,
            params: BTreeMap::new(),
            metrics: BTreeMap::new(),
            artifacts: Vec::new(),
        }
    }
}

/// Local file system tracker
pub struct LocalTracker {
    base_dir: PathBuf,
    experiment_name: String,
    current: Option<RunRecord>,
}

impl LocalTracker {
    /// Create a tracker rooted at `base_dir`. Nothing is written until a run starts.
    pub fn new(base_dir: impl Into<PathBuf>, experiment_name: impl Into<String>) -> Self {
        Self {
            base_dir: base_dir.into(),
            experiment_name: experiment_name.into(),
            current: None,
        }
    }

    fn experiment_dir(&self) -> PathBuf {
        self.base_dir.join(&self.experiment_name)
    }

    /// Directory holding one run
    pub fn run_dir(&self, run_id: &str) -> PathBuf {
        self.experiment_dir().join(run_id)
    }

    /// Read back a persisted run.
    pub fn load_run(&self, run_id: &str) -> Result<RunRecord> {
        let json = fs::read_to_string(self.run_dir(run_id).join("run.json"))?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Ids of all runs stored for this experiment
    pub fn list_runs(&self) -> Result<Vec<String>> {
        let dir = self.experiment_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut runs = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if entry.path().join("run.json").is_file() {
                runs.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        runs.sort();
        Ok(runs)
    }

    fn active(&mut self) -> Result<&mut RunRecord> {
        self.current
            .as_mut()
            .ok_or_else(|| PipelineError::TrackingError("no active run".to_string()))
    }

    fn persist(&self) -> Result<()> {
        if let Some(run) = &self.current {
            let json = serde_json::to_string_pretty(run)?;
            write_atomic(self.run_dir(&run.run_id).join("run.json"), json.as_bytes())
                .map_err(tracking_error)?;
        }
        Ok(())
    }
}

impl Tracker for LocalTracker {
    fn backend(&self) -> &'static str {
        "local"
    }

    fn start_run(&mut self) -> Result<String> {
        if let Some(run) = &self.current {
            return Err(PipelineError::TrackingError(format!(
                "run {} is still active",
                run.run_id
            )));
        }

        let run = RunRecord::new(&self.experiment_name);
        let run_id = run.run_id.clone();
        self.current = Some(run);
        self.persist()?;

        debug!(run_id = %run_id, dir = %self.run_dir(&run_id).display(), "Started local run");
        Ok(run_id)
    }

    fn log_params(&mut self, params: &[(String, String)]) -> Result<()> {
        let run = self.active()?;
        for (key, value) in params {
            run.params.insert(key.clone(), value.clone());
        }
        self.persist()
    }

    fn log_metric(&mut self, key: &str, value: f64) -> Result<()> {
        self.active()?.metrics.insert(key.to_string(), value);
        self.persist()
    }

    fn log_artifact(&mut self, path: &Path) -> Result<()> {
        let run_id = self.active()?.run_id.clone();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                PipelineError::TrackingError(format!("{} is not a file", path.display()))
            })?;

        let artifacts_dir = self.run_dir(&run_id).join("artifacts");
        fs::create_dir_all(&artifacts_dir).map_err(|e| tracking_error(e.into()))?;
        fs::copy(path, artifacts_dir.join(&file_name)).map_err(|e| {
            PipelineError::TrackingError(format!(
                "failed to copy artifact {}: {}",
                path.display(),
                e
            ))
        })?;

        self.active()?.artifacts.push(file_name);
        self.persist()
    }

    fn end_run(&mut self, status: RunStatus) -> Result<()> {
        let run = self.active()?;
        run.status = status;
        run.end_time = Some(Utc::now());
        self.persist()?;
        self.current = None;
        Ok(())
    }
}

fn tracking_error(err: PipelineError) -> PipelineError {
    match err {
        PipelineError::TrackingError(_) => err,
        other => PipelineError::TrackingError(other.to_string()),
    }
}
