//! Experiment tracking
//!
//! Records each unlearning run: its configuration, a stream of metric rows
//! (one row per evaluation, stepped automatically) and a summary of final
//! values. Runs are persisted through a pluggable
//! [`TrackingBackend`](storage::TrackingBackend).
//!
//! # Example
//!
//! ```
//! use desaprender::tracking::{ExperimentTracker, MetricRow, RunStatus};
//! use desaprender::tracking::storage::InMemoryBackend;
//!
//! # fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
//! let mut tracker = ExperimentTracker::new("unlearning", InMemoryBackend::new());
//! let run_id = tracker.start_run(Some("rl_run_20260101_120000"), serde_json::json!({"lr": 0.1}))?;
//!
//! let mut row = MetricRow::new();
//! row.insert("test".into(), 91.5);
//! tracker.log(&run_id, &row)?;
//! tracker.set_summary(&run_id, "best_test", 91.5)?;
//! tracker.end_run(&run_id, RunStatus::Completed)?;
//!
//! let run = tracker.get_run(&run_id)?;
//! assert_eq!(run.history("test"), vec![91.5]);
//! # Ok(())
//! # }
//! ```

pub mod storage;


use std::collections::{BTreeMap, HashMap};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use storage::{TrackingBackend, TrackingStorageError};

/// Metric name -> value, logged together at one step
pub type MetricRow = BTreeMap<String, f64>;

/// Status of a tracking run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Run is actively recording
    Active,
    /// Run completed successfully
    Completed,
    /// Run failed
    Failed,
}

/// One logged metric value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    pub step: u64,
    pub value: f64,
}

/// A single experiment run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    /// Unique identifier for the run
    pub run_id: String,
    /// Optional human-readable name
    pub run_name: Option<String>,
    /// Parent experiment name
    pub experiment_name: String,
    pub status: RunStatus,
    /// Settings the run was started with
    pub config: serde_json::Value,
    /// Metric name -> values in logging order
    pub metrics: BTreeMap<String, Vec<MetricPoint>>,
    /// Final values (best epochs, aggregates)
    pub summary: BTreeMap<String, f64>,
    pub tags: HashMap<String, String>,
    /// Number of rows logged so far
    pub steps: u64,
    /// Unix timestamp (ms) when the run started
    pub start_time_ms: Option<u64>,
    /// Unix timestamp (ms) when the run ended
    pub end_time_ms: Option<u64>,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

impl Run {
    fn new(
        run_id: String,
        run_name: Option<String>,
        experiment_name: String,
        config: serde_json::Value,
    ) -> Self {
        Self {
            run_id,
            run_name,
            experiment_name,
            status: RunStatus::Active,
            config,
            metrics: BTreeMap::new(),
            summary: BTreeMap::new(),
            tags: HashMap::new(),
            steps: 0,
            start_time_ms: Some(now_ms()),
            end_time_ms: None,
        }
    }

    /// Values logged under `key`, in order
    pub fn history(&self, key: &str) -> Vec<f64> {
        self.metrics
            .get(key)
            .map(|points| points.iter().map(|p| p.value).collect())
            .unwrap_or_default()
    }

    /// Most recent value logged under `key`
    pub fn last(&self, key: &str) -> Option<f64> {
        self.metrics.get(key)?.last().map(|p| p.value)
    }
}

/// Errors from experiment tracking operations
#[derive(Debug, thiserror::Error)]
pub enum TrackingError {
    #[error("Run not found: {0}")]
    RunNotFound(String),

    #[error("Run is not active: {0}")]
    RunNotActive(String),

    #[error("Run already exists: {0}")]
    DuplicateRun(String),

    #[error("Storage error: {0}")]
    Storage(#[from] TrackingStorageError),
}

/// Result alias for tracking operations
pub type Result<T> = std::result::Result<T, TrackingError>;

/// Experiment tracker
///
/// Manages runs under a single experiment name. Active runs live in memory
/// and are persisted through the backend when they end.
#[derive(Debug)]
pub struct ExperimentTracker<B: TrackingBackend> {
    experiment_name: String,
    tags: HashMap<String, String>,
    api_key: Option<String>,
    backend: B,
    active_runs: HashMap<String, Run>,
    next_run_id: u64,
}

impl<B: TrackingBackend> ExperimentTracker<B> {
    /// Create a new tracker for the given experiment name
    pub fn new(experiment_name: impl Into<String>, backend: B) -> Self {
        Self {
            experiment_name: experiment_name.into(),
            tags: HashMap::new(),
            api_key: None,
            backend,
            active_runs: HashMap::new(),
            next_run_id: 1,
        }
    }

    /// Attach the credential for a remote tracking service
    ///
    /// The key itself is never written to a run; runs record only that one
    /// was present.
    pub fn with_api_key(mut self, key: Option<String>) -> Self {
        self.api_key = key.filter(|k| !k.is_empty());
        self
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Add an experiment-level tag, inherited by runs started afterwards
    pub fn add_tag(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.tags.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn experiment_name(&self) -> &str {
        &self.experiment_name
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Start a new run; a given name doubles as the run ID
    pub fn start_run(
        &mut self,
        run_name: Option<&str>,
        config: serde_json::Value,
    ) -> Result<String> {
        let run_id = match run_name {
            Some(name) => name.to_string(),
            None => format!("run-{}", self.next_run_id),
        };
        self.next_run_id += 1;
        if self.active_runs.contains_key(&run_id) || self.backend.load_run(&run_id).is_ok() {
            return Err(TrackingError::DuplicateRun(run_id));
        }

        let mut run = Run::new(
            run_id.clone(),
            run_name.map(String::from),
            self.experiment_name.clone(),
            config,
        );
        run.tags.extend(self.tags.iter().map(|(k, v)| (k.clone(), v.clone())));
        if self.api_key.is_some() {
            run.tags.insert("authenticated".into(), "true".into());
        }

        self.active_runs.insert(run_id.clone(), run);
        Ok(run_id)
    }

    fn active_mut(&mut self, run_id: &str) -> Result<&mut Run> {
        self.active_runs
            .get_mut(run_id)
            .ok_or_else(|| TrackingError::RunNotActive(run_id.to_string()))
    }

    /// Log a row of metrics at the run's next step
    pub fn log(&mut self, run_id: &str, row: &MetricRow) -> Result<u64> {
        let run = self.active_mut(run_id)?;
        let step = run.steps;
        for (key, value) in row {
            run.metrics
                .entry(key.clone())
                .or_default()
                .push(MetricPoint {
                    step,
                    value: *value,
                });
        }
        run.steps += 1;
        Ok(step)
    }

    /// Set a summary value, replacing any earlier one
    pub fn set_summary(&mut self, run_id: &str, key: &str, value: f64) -> Result<()> {
        self.active_mut(run_id)?.summary.insert(key.to_string(), value);
        Ok(())
    }

    /// End a run with the given status, persisting it to the backend
    pub fn end_run(&mut self, run_id: &str, status: RunStatus) -> Result<()> {
        let mut run = self
            .active_runs
            .remove(run_id)
            .ok_or_else(|| TrackingError::RunNotFound(run_id.to_string()))?;

        run.status = status;
        run.end_time_ms = Some(now_ms());

        self.backend.save_run(&run)?;
        Ok(())
    }

    /// Retrieve a run by ID
    ///
    /// Checks active (in-memory) runs first, then falls back to the backend.
    pub fn get_run(&self, run_id: &str) -> Result<Run> {
        if let Some(run) = self.active_runs.get(run_id) {
            return Ok(run.clone());
        }
        self.backend
            .load_run(run_id)
            .map_err(|e| TrackingError::RunNotFound(format!("{run_id}: {e}")))
    }

    /// List all runs (active + persisted)
    pub fn list_runs(&self) -> Result<Vec<Run>> {
        let mut runs: Vec<Run> = self.active_runs.values().cloned().collect();
        for r in self.backend.list_runs()? {
            if !self.active_runs.contains_key(&r.run_id) {
                runs.push(r);
            }
        }
        runs.sort_by(|a, b| a.run_id.cmp(&b.run_id));
        Ok(runs)
    }
}
