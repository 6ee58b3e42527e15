//! Where unlearning run records are kept
//!
//! A run record holds the merged checkpoint/settings config, the `base_*`
//! and per-epoch metric history and the best-epoch summary. The on-disk
//! backend keeps one pretty-printed record per run next to the
//! `artifacts/` directory the runner writes masks and forget sets into.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::Run;

/// Errors from reading or writing run records
#[derive(Debug, thiserror::Error)]
pub enum TrackingStorageError {
    #[error("run store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed run record: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no stored run {0}")]
    RunNotFound(String),

    /// Run IDs become file names, so they may not name other paths
    #[error("run id {0:?} is not a plain file name")]
    InvalidRunId(String),
}

pub type Result<T> = std::result::Result<T, TrackingStorageError>;

/// Persistence for run records, keyed by run ID
pub trait TrackingBackend {
    /// Insert or replace the record of `run`
    fn save_run(&mut self, run: &Run) -> Result<()>;

    fn load_run(&self, run_id: &str) -> Result<Run>;

    /// Every stored run, ordered by ID
    fn list_runs(&self) -> Result<Vec<Run>>;

    fn delete_run(&mut self, run_id: &str) -> Result<()>;
}

/// `<dir>/<run_id>.json` per run
///
/// Records are written to a temporary file and renamed into place, so an
/// interrupted save never leaves a half-written record behind. Anything in
/// `dir` that is not a `.json` file, such as the `artifacts/` directory, is
/// ignored when listing.
///
/// # Example
///
/// ```no_run
/// use desaprender::tracking::storage::{JsonFileBackend, TrackingBackend};
///
/// let backend = JsonFileBackend::new("runs");
/// for run in backend.list_runs()? {
///     println!("{} {:?}", run.run_id, run.summary.get("best_test"));
/// }
/// # Ok::<(), desaprender::tracking::storage::TrackingStorageError>(())
/// ```
#[derive(Debug)]
pub struct JsonFileBackend {
    dir: PathBuf,
}

impl JsonFileBackend {
    /// Records go under `dir`, created on the first save
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, run_id: &str) -> Result<PathBuf> {
        let plain = !run_id.is_empty()
            && run_id != "."
            && run_id != ".."
            && !run_id.contains(['/', '\\']);
        if !plain {
            return Err(TrackingStorageError::InvalidRunId(run_id.to_string()));
        }
        Ok(self.dir.join(format!("{run_id}.json")))
    }
}

impl TrackingBackend for JsonFileBackend {
    fn save_run(&mut self, run: &Run) -> Result<()> {
        let path = self.record_path(&run.run_id)?;
        fs::create_dir_all(&self.dir)?;
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, serde_json::to_string_pretty(run)?)?;
        fs::rename(staging, path)?;
        Ok(())
    }

    fn load_run(&self, run_id: &str) -> Result<Run> {
        let path = self.record_path(run_id)?;
        if !path.is_file() {
            return Err(TrackingStorageError::RunNotFound(run_id.to_string()));
        }
        Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
    }

    fn list_runs(&self) -> Result<Vec<Run>> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut runs = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let is_record =
                path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("json");
            if is_record {
                runs.push(serde_json::from_str::<Run>(&fs::read_to_string(&path)?)?);
            }
        }
        runs.sort_by(|a, b| a.run_id.cmp(&b.run_id));
        Ok(runs)
    }

    fn delete_run(&mut self, run_id: &str) -> Result<()> {
        let path = self.record_path(run_id)?;
        if !path.is_file() {
            return Err(TrackingStorageError::RunNotFound(run_id.to_string()));
        }
        fs::remove_file(path)?;
        Ok(())
    }
}

/// Records held for the life of the process; backs `--no-log`
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    runs: BTreeMap<String, Run>,
}

impl InMemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl TrackingBackend for InMemoryBackend {
    fn save_run(&mut self, run: &Run) -> Result<()> {
        self.runs.insert(run.run_id.clone(), run.clone());
        Ok(())
    }

    fn load_run(&self, run_id: &str) -> Result<Run> {
        self.runs
            .get(run_id)
            .cloned()
            .ok_or_else(|| TrackingStorageError::RunNotFound(run_id.to_string()))
    }

    fn list_runs(&self) -> Result<Vec<Run>> {
        Ok(self.runs.values().cloned().collect())
    }

    fn delete_run(&mut self, run_id: &str) -> Result<()> {
        self.runs
            .remove(run_id)
            .map(|_| ())
            .ok_or_else(|| TrackingStorageError::RunNotFound(run_id.to_string()))
    }
}
