//! Model construction by architecture name

use super::{Classifier, Mlp};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Architecture description stored in checkpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Architecture name (`mlp` or `linear`)
    pub name: String,
    /// Feature dimension of one example
    pub input_dim: usize,
    /// Hidden layer widths
    #[serde(default)]
    pub hidden: Vec<usize>,
    /// Number of output classes
    pub num_classes: usize,
}

/// Architectures understood by [`build_model`]
pub const ARCHITECTURES: &[&str] = &["mlp", "linear"];

/// Build a freshly initialized classifier
///
/// # Errors
///
/// Returns [`Error::Config`] for unknown architectures or invalid sizes.
pub fn build_model(spec: &ModelSpec, seed: u64) -> Result<Box<dyn Classifier>> {
    match spec.name.as_str() {
        "mlp" => Ok(Box::new(Mlp::new(spec, seed)?)),
        "linear" => {
            if !spec.hidden.is_empty() {
                return Err(Error::Config(
                    "linear model does not take hidden layers".into(),
                ));
            }
            Ok(Box::new(Mlp::new(spec, seed)?))
        }
        other => Err(Error::Config(format!(
            "unknown model '{other}', expected one of {ARCHITECTURES:?}"
        ))),
    }
}
