//! MLflow REST tracker
//!
//! Talks to the `/api/2.0/mlflow` endpoints of a tracking server with a
//! blocking client. Artifacts are uploaded through the server's artifact
//! proxy (`mlflow-artifacts`), so the server must run with artifact serving
//! enabled.

use super::tracker::{RunStatus, Tracker};
use crate::error::{PipelineError, Result};
use chrono::Utc;
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

const API_PREFIX: &str = "api/2.0/mlflow";
const ARTIFACT_PREFIX: &str = "api/2.0/mlflow-artifacts/artifacts";
const TIMEOUT: Duration = Duration::from_secs(30);

/// Run state kept between calls
#[derive(Debug, Clone)]
struct ActiveRun {
    run_id: String,
    experiment_id: String,
}

/// Tracker backed by an MLflow tracking server
pub struct MlflowTracker {
    base_url: String,
    experiment_name: String,
    agent: ureq::Agent,
    current: Option<ActiveRun>,
}

impl MlflowTracker {
    pub fn new(base_url: impl Into<String>, experiment_name: impl Into<String>) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(TIMEOUT).build();
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            experiment_name: experiment_name.into(),
            agent,
            current: None,
        }
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/{}/{}", self.base_url, API_PREFIX, method)
    }

    fn post(&self, method: &str, body: &Value) -> Result<Value> {
        let url = self.endpoint(method);
        let response = self
            .agent
            .post(&url)
            .set("Content-Type", "application/json")
            .send_json(body);
        read_json(method, response)
    }

    fn get(&self, method: &str, query: &[(&str, &str)]) -> Result<Option<Value>> {
        let url = self.endpoint(method);
        let mut request = self.agent.get(&url);
        for (key, value) in query {
            request = request.query(key, value);
        }

        match request.call() {
            Err(ureq::Error::Status(404, _)) => Ok(None),
            response => read_json(method, response).map(Some),
        }
    }

    /// Look the experiment up by name, creating it when absent.
    fn experiment_id(&self) -> Result<String> {
        let found = self.get(
            "experiments/get-by-name",
            &[("experiment_name", self.experiment_name.as_str())],
        )?;
        if let Some(id) = found
            .as_ref()
            .and_then(|v| v.pointer("/experiment/experiment_id"))
            .and_then(Value::as_str)
        {
            return Ok(id.to_string());
        }

        let created = self.post(
            "experiments/create",
            &json!({ "name": self.experiment_name }),
        )?;
        string_field(&created, "/experiment_id", "experiments/create")
    }

    fn active(&self) -> Result<&ActiveRun> {
        self.current
            .as_ref()
            .ok_or_else(|| PipelineError::TrackingError("no active run".to_string()))
    }
}

impl Tracker for MlflowTracker {
    fn backend(&self) -> &'static str {
        "mlflow"
    }

    fn start_run(&mut self) -> Result<String> {
        if let Some(run) = &self.current {
            return Err(PipelineError::TrackingError(format!(
                "run {} is still active",
                run.run_id
            )));
        }

        let experiment_id = self.experiment_id()?;
        let created = self.post(
            "runs/create",
            &json!({
                "experiment_id": experiment_id,
                "start_time": Utc::now().timestamp_millis(),
            }),
        )?;
        let run_id = string_field(&created, "/run/info/run_id", "runs/create")?;

        debug!(run_id = %run_id, experiment_id = %experiment_id, "Started MLflow run");
        self.current = Some(ActiveRun {
            run_id: run_id.clone(),
            experiment_id,
        });
        Ok(run_id)
    }

    fn log_params(&mut self, params: &[(String, String)]) -> Result<()> {
        let run_id = self.active()?.run_id.clone();
        let params: Vec<Value> = params
            .iter()
            .map(|(key, value)| json!({ "key": key, "value": value }))
            .collect();

        self.post(
            "runs/log-batch",
            &json!({ "run_id": run_id, "params": params }),
        )?;
        Ok(())
    }

    fn log_metric(&mut self, key: &str, value: f64) -> Result<()> {
        let run_id = self.active()?.run_id.clone();
        self.post(
            "runs/log-metric",
            &json!({
                "run_id": run_id,
                "key": key,
                "value": value,
                "timestamp": Utc::now().timestamp_millis(),
                "step": 0,
            }),
        )?;
        Ok(())
    }

    fn log_artifact(&mut self, path: &Path) -> Result<()> {
        let run = self.active()?.clone();
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                PipelineError::TrackingError(format!("{} is not a file", path.display()))
            })?;
        let bytes = std::fs::read(path).map_err(|e| {
            PipelineError::TrackingError(format!(
                "failed to read artifact {}: {}",
                path.display(),
                e
            ))
        })?;

        let url = format!(
            "{}/{}/{}/{}/artifacts/{}",
            self.base_url, ARTIFACT_PREFIX, run.experiment_id, run.run_id, file_name
        );
        let response = self
            .agent
            .put(&url)
            .set("Content-Type", "application/octet-stream")
            .send_bytes(&bytes);

        match response {
            Ok(_) => Ok(()),
            Err(ureq::Error::Status(code, resp)) => {
                let body = resp.into_string().unwrap_or_default();
                Err(PipelineError::TrackingError(format!(
                    "artifact upload failed (HTTP {code}): {body}"
                )))
            }
            Err(e) => Err(PipelineError::TrackingError(format!(
                "artifact upload failed: {e}"
            ))),
        }
    }

    fn end_run(&mut self, status: RunStatus) -> Result<()> {
        let run_id = self.active()?.run_id.clone();
        let result = self.post(
            "runs/update",
            &json!({
                "run_id": run_id,
                "status": status.as_str(),
                "end_time": Utc::now().timestamp_millis(),
            }),
        );
        self.current = None;

        if let Err(e) = &result {
            warn!(run_id = %run_id, error = %e, "Failed to close MLflow run");
        }
        result.map(|_| ())
    }
}

fn read_json(method: &str, response: std::result::Result<ureq::Response, ureq::Error>) -> Result<Value> {
    match response {
        Ok(resp) => resp.into_json::<Value>().map_err(|e| {
            PipelineError::TrackingError(format!("invalid response from {method}: {e}"))
        }),
        Err(ureq::Error::Status(code, resp)) => {
            let body = resp.into_string().unwrap_or_default();
            Err(PipelineError::TrackingError(format!(
                "{method} failed (HTTP {code}): {body}"
            )))
        }
        Err(e) => Err(PipelineError::TrackingError(format!(
            "{method} request failed: {e}"
        ))),
    }
}

fn string_field(value: &Value, pointer: &str, method: &str) -> Result<String> {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            PipelineError::TrackingError(format!("{method} response has no {pointer}"))
        })
}
