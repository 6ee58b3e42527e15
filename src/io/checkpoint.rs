//! Checkpoints: model state, run configuration and optimizer state

use super::{CheckpointFormat, ModelState};
use crate::data::{DataSource, SplitConfig};
use crate::nn::{build_model, Classifier, ModelSpec};
use crate::optim::SgdState;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Keys a checkpoint config must carry
const REQUIRED_CONFIG_KEYS: &[&str] = &["model", "dataset", "nclasses"];

/// Configuration the checkpoint was trained with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointConfig {
    /// Architecture name
    pub model: String,
    /// Dataset name
    pub dataset: String,
    pub nclasses: usize,
    #[serde(default)]
    pub input_dim: usize,
    #[serde(default)]
    pub hidden: Vec<usize>,
    /// Data the model was trained on
    #[serde(default)]
    pub data: DataSource,
    /// Validation hold-out used during training
    #[serde(default)]
    pub split: SplitConfig,
}

impl CheckpointConfig {
    pub fn model_spec(&self) -> ModelSpec {
        ModelSpec {
            name: self.model.clone(),
            input_dim: self.input_dim,
            hidden: self.hidden.clone(),
            num_classes: self.nclasses,
        }
    }
}

/// A trained classifier on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub model: ModelState,
    pub config: CheckpointConfig,
    #[serde(default)]
    pub optimizer: Option<SgdState>,
}

impl Checkpoint {
    /// Capture `model` together with its configuration
    pub fn new(model: &dyn Classifier, config: CheckpointConfig) -> Self {
        Self {
            model: ModelState::capture(model),
            config,
            optimizer: None,
        }
    }

    pub fn with_optimizer(mut self, state: SgdState) -> Self {
        self.optimizer = Some(state);
        self
    }

    /// Freshly initialized model of the checkpoint's architecture
    pub fn build_untrained(&self, seed: u64) -> Result<Box<dyn Classifier>> {
        build_model(&self.config.model_spec(), seed)
    }

    /// Model with the stored weights
    pub fn build_model(&self) -> Result<Box<dyn Classifier>> {
        let mut model = self.build_untrained(0)?;
        self.model.apply_to(model.as_mut())?;
        Ok(model)
    }
}

/// Load a checkpoint; the format follows the file extension
///
/// # Errors
///
/// [`Error::CheckpointNotFound`] when the file does not exist and
/// [`Error::Config`] when the config lacks `model`, `dataset` or `nclasses`.
///
/// # Example
///
/// ```no_run
/// use desaprender::io::load_checkpoint;
///
/// let checkpoint = load_checkpoint("runs/blobs_mlp.json").expect("failed to load checkpoint");
/// println!("{} trained on {}", checkpoint.config.model, checkpoint.config.dataset);
/// ```
pub fn load_checkpoint(path: impl AsRef<Path>) -> Result<Checkpoint> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(Error::CheckpointNotFound {
            path: path.to_path_buf(),
        });
    }
    let format = CheckpointFormat::from_path(path)?;
    let content = std::fs::read_to_string(path)?;

    let raw: serde_json::Value = format.deserialize(&content)?;
    let config = raw
        .get("config")
        .and_then(serde_json::Value::as_object)
        .ok_or_else(|| Error::Config(format!("{}: checkpoint has no config", path.display())))?;
    if let Some(key) = REQUIRED_CONFIG_KEYS.iter().find(|k| !config.contains_key(**k)) {
        return Err(Error::Config(format!(
            "{}: checkpoint config is missing '{key}'",
            path.display()
        )));
    }

    let checkpoint: Checkpoint = serde_json::from_value(raw)
        .map_err(|e| Error::Config(format!("{}: malformed checkpoint: {e}", path.display())))?;
    info!(
        path = %path.display(),
        model = %checkpoint.config.model,
        dataset = %checkpoint.config.dataset,
        nclasses = checkpoint.config.nclasses,
        "loaded checkpoint"
    );
    Ok(checkpoint)
}

/// Write a checkpoint; the format follows the file extension
pub fn save_checkpoint(checkpoint: &Checkpoint, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let format = CheckpointFormat::from_path(path)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, format.serialize(checkpoint)?)?;
    info!(path = %path.display(), "saved checkpoint");
    Ok(())
}
