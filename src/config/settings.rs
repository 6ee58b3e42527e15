//! Run settings for one unlearning experiment

use crate::data::ForgetSelector;
use crate::unlearn::Method;
use crate::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;

/// Deserialize a bool from either a boolean or a quoted string (`"true"`).
fn deserialize_bool_lenient<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolOrString {
        Bool(bool),
        Str(String),
    }

    match BoolOrString::deserialize(deserializer)? {
        BoolOrString::Bool(b) => Ok(b),
        BoolOrString::Str(s) => match s.to_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(serde::de::Error::custom(format!(
                "expected 'true' or 'false', got '{other}'"
            ))),
        },
    }
}

/// Deserialize an optional path where `false`, `""` and `null` all mean none
fn deserialize_optional_path<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<PathBuf>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum PathOrFlag {
        Flag(bool),
        Path(String),
    }

    match Option::<PathOrFlag>::deserialize(deserializer)? {
        None | Some(PathOrFlag::Flag(false)) => Ok(None),
        Some(PathOrFlag::Path(s)) if s.is_empty() => Ok(None),
        Some(PathOrFlag::Path(s)) => Ok(Some(PathBuf::from(s))),
        Some(PathOrFlag::Flag(true)) => Err(serde::de::Error::custom(
            "load_mask must be a path, not `true`",
        )),
    }
}

/// Immutable configuration of one unlearning run
///
/// Built by layering an override object onto defaults with
/// [`Settings::with_overrides`]; unknown keys are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Trained checkpoint to unlearn from
    pub checkpoint: PathBuf,
    /// Forget every training example of this class
    pub class_to_forget: Option<usize>,
    /// Forget this fraction of the training pool (ignored when a class is set)
    pub unlearning_rate: Option<f32>,
    /// Use a saved mask instead of computing one
    #[serde(deserialize_with = "deserialize_optional_path")]
    pub load_mask: Option<PathBuf>,
    #[serde(deserialize_with = "deserialize_bool_lenient")]
    pub use_mask: bool,
    /// Saliency threshold relative to each parameter's maximum
    pub mask_thr: f32,
    pub lr: f32,
    pub epochs: usize,
    pub method: Method,
    /// Free-form label attached to the tracked run
    pub tag: Option<String>,
    pub batch_size: usize,
    pub seed: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            checkpoint: PathBuf::from("checkpoints/mlp_blobs_best.json"),
            class_to_forget: None,
            unlearning_rate: None,
            load_mask: None,
            use_mask: true,
            mask_thr: 0.5,
            lr: 0.1,
            epochs: 10,
            method: Method::RandomLabel,
            tag: None,
            batch_size: 64,
            seed: 0,
        }
    }
}

impl Settings {
    /// Copy of `self` with the keys of `overrides` replaced
    ///
    /// # Errors
    ///
    /// [`Error::Config`] when `overrides` is not an object, names an unknown
    /// key or holds a value of the wrong type.
    pub fn with_overrides(&self, overrides: &serde_json::Value) -> Result<Self> {
        let overrides = overrides.as_object().ok_or_else(|| {
            Error::Config(format!("experiment must be an object, got {overrides}"))
        })?;

        let mut merged = match serde_json::to_value(self)? {
            serde_json::Value::Object(map) => map,
            _ => return Err(Error::Config("settings did not serialize to an object".into())),
        };
        merged.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));

        let settings: Self = serde_json::from_value(serde_json::Value::Object(merged))
            .map_err(|e| Error::Config(format!("invalid experiment settings: {e}")))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings no run could use
    pub fn validate(&self) -> Result<()> {
        if !(self.lr.is_finite() && self.lr > 0.0) {
            return Err(Error::Config(format!("lr must be positive, got {}", self.lr)));
        }
        if self.batch_size == 0 {
            return Err(Error::Config("batch_size must be at least 1".into()));
        }
        if !self.mask_thr.is_finite() {
            return Err(Error::Config(format!("mask_thr must be finite, got {}", self.mask_thr)));
        }
        self.forget_selector().map(|_| ())
    }

    /// How the forget set is chosen
    pub fn forget_selector(&self) -> Result<ForgetSelector> {
        ForgetSelector::from_settings(self.class_to_forget, self.unlearning_rate)
    }
}
