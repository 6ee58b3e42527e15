//! Gradient-saliency masks over model parameters
//!
//! A mask gates which parameter elements the unlearning updates may touch.
//! Saliency is the magnitude of the forget-set ascent gradient scaled by
//! the unlearning rate; elements above a fraction of their parameter's
//! maximum saliency stay trainable.

use crate::autograd::{backward, mean, scale};
use crate::data::DataLoader;
use crate::nn::Classifier;
use crate::train::{CrossEntropyLoss, LossFn};
use crate::{Device, Error, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

/// Binary gate for one parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskTensor {
    pub shape: Vec<usize>,
    /// Row-major values in {0, 1}
    pub values: Vec<f32>,
}

impl MaskTensor {
    /// Number of ones
    pub fn active(&self) -> usize {
        self.values.iter().filter(|&&v| v != 0.0).count()
    }
}

/// Parameter name to binary mask
///
/// Parameters without an entry are updated unmasked; entries naming an
/// unknown parameter are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SaliencyMask {
    entries: BTreeMap<String, MaskTensor>,
}

impl SaliencyMask {
    /// Mask that keeps every parameter element trainable
    pub fn all_ones(model: &dyn Classifier) -> Self {
        let entries = model
            .named_parameters()
            .into_iter()
            .map(|(name, p)| {
                (
                    name,
                    MaskTensor {
                        shape: p.shape().to_vec(),
                        values: vec![1.0; p.len()],
                    },
                )
            })
            .collect();
        Self { entries }
    }

    pub fn insert(&mut self, name: impl Into<String>, mask: MaskTensor) {
        self.entries.insert(name.into(), mask);
    }

    pub fn get(&self, name: &str) -> Option<&MaskTensor> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &MaskTensor)> {
        self.entries.iter()
    }

    /// Fraction of masked elements that are trainable
    pub fn coverage(&self) -> f32 {
        let (active, total) = self
            .entries
            .values()
            .fold((0, 0), |(a, t), m| (a + m.active(), t + m.values.len()));
        if total == 0 {
            0.0
        } else {
            active as f32 / total as f32
        }
    }

    /// Multiply each masked parameter's gradient by its mask in place
    ///
    /// # Errors
    ///
    /// [`Error::ShapeMismatch`] when an entry's length differs from its
    /// parameter.
    pub fn apply(&self, model: &dyn Classifier) -> Result<()> {
        for (name, param) in model.named_parameters() {
            let Some(mask) = self.entries.get(&name) else {
                continue;
            };
            if mask.values.len() != param.len() {
                return Err(Error::ShapeMismatch {
                    name,
                    expected: param.shape().to_vec(),
                    actual: mask.shape.clone(),
                });
            }
            param.update_grad(|grad| {
                for (g, m) in grad.iter_mut().zip(&mask.values) {
                    *g *= m;
                }
            });
        }
        Ok(())
    }

    /// Write the mask as JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, serde_json::to_string(self)?)?;
        Ok(())
    }

    /// Read a mask written by [`SaliencyMask::save`]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Build a saliency mask from one pass over the forget loader
///
/// No optimizer step is taken; parameter values are unchanged and all
/// gradient buffers are clear on return.
pub fn build_mask(
    model: &dyn Classifier,
    forget: &DataLoader,
    unlearn_lr: f32,
    saliency_threshold: f32,
    device: Device,
) -> Result<SaliencyMask> {
    let loss_fn = CrossEntropyLoss;
    let mut saliency: Vec<(String, Vec<usize>, Array1<f32>)> = model
        .named_parameters()
        .into_iter()
        .map(|(name, p)| (name, p.shape().to_vec(), Array1::zeros(p.len())))
        .collect();

    model.zero_grad();
    let mut batches = 0usize;
    for batch in forget.iter() {
        let batch = batch.to_device(device);
        let logits = model.forward(&batch.inputs, batch.size())?;
        let losses = loss_fn.per_example(&logits, &batch.labels)?;
        let mut objective = scale(&mean(&losses), -1.0);

        let value = objective.data()[0];
        if !value.is_finite() {
            model.zero_grad();
            return Err(Error::NonFinite {
                what: "saliency loss".into(),
                value,
            });
        }
        backward(&mut objective, None);

        for ((_, _, acc), (_, param)) in saliency.iter_mut().zip(model.named_parameters()) {
            if let Some(grad) = param.grad() {
                acc.zip_mut_with(&grad, |a, g| *a += (unlearn_lr * g).abs());
            }
        }
        model.zero_grad();
        batches += 1;
    }

    if batches > 0 {
        for (_, _, acc) in &mut saliency {
            *acc /= batches as f32;
        }
    }

    let mut mask = SaliencyMask::default();
    for (name, shape, s) in saliency {
        let values: Vec<f32> = if saliency_threshold <= 0.0 {
            vec![1.0; s.len()]
        } else {
            let max = s.iter().copied().fold(0.0f32, f32::max);
            let cutoff = saliency_threshold * max;
            s.iter().map(|&v| if v > cutoff { 1.0 } else { 0.0 }).collect()
        };
        let entry = MaskTensor { shape, values };
        debug!(param = %name, active = entry.active(), total = entry.values.len(), "mask entry");
        mask.insert(name, entry);
    }

    info!(
        batches,
        threshold = saliency_threshold,
        coverage = mask.coverage(),
        "built saliency mask"
    );
    Ok(mask)
}
