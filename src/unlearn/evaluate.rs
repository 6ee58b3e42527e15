//! Held-out evaluation: per-example losses and top-k accuracy

use crate::autograd::NoGradGuard;
use crate::data::DataLoader;
use crate::nn::Classifier;
use crate::train::LossFn;
use crate::{Device, Error, Result};
use std::collections::BTreeMap;
use tracing::debug;

/// Per-split accuracies and loss lists from one evaluation pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evaluation {
    /// Top-1 rate in [0, 1]
    pub accuracies: BTreeMap<String, f32>,
    /// Per-example losses in loader order
    pub losses: BTreeMap<String, Vec<f32>>,
}

impl Evaluation {
    /// Accuracy of a split, 0 when absent
    pub fn accuracy(&self, split: &str) -> f32 {
        self.accuracies.get(split).copied().unwrap_or(0.0)
    }

    /// Losses of a split, empty when absent
    pub fn losses(&self, split: &str) -> &[f32] {
        self.losses.get(split).map_or(&[], Vec::as_slice)
    }
}

/// Rows whose label is among the `k` highest logits
///
/// A row counts when fewer than `k` classes score strictly higher than the
/// true class.
pub fn topk_correct(logits: &[f32], num_classes: usize, labels: &[usize], k: usize) -> usize {
    if num_classes == 0 {
        return 0;
    }
    logits
        .chunks(num_classes)
        .zip(labels)
        .filter(|&(row, &label)| {
            let target = row[label];
            row.iter().filter(|&&v| v > target).count() < k
        })
        .count()
}

/// Evaluate `model` on each named split
///
/// Gradient recording is disabled for the whole pass. Accuracy is
/// correct / split size, 0 for an empty split.
///
/// # Errors
///
/// [`Error::NonFinite`] if any example's loss is NaN or infinite.
pub fn evaluate(
    model: &dyn Classifier,
    splits: &[(&str, &DataLoader)],
    loss_fn: &dyn LossFn,
    device: Device,
) -> Result<Evaluation> {
    let _guard = NoGradGuard::new();
    let num_classes = model.num_classes();
    let mut evaluation = Evaluation::default();

    for &(name, loader) in splits {
        let mut losses = Vec::with_capacity(loader.len());
        let mut correct = 0usize;

        for batch in loader.iter() {
            let batch = batch.to_device(device);
            let logits = model.forward(&batch.inputs, batch.size())?;
            let batch_losses = loss_fn.per_example(&logits, &batch.labels)?;
            if let Some(&value) = batch_losses.data().iter().find(|v| !v.is_finite()) {
                return Err(Error::NonFinite {
                    what: format!("{name} loss"),
                    value,
                });
            }
            losses.extend(batch_losses.data().iter().copied());
            correct += topk_correct(&logits.data().to_vec(), num_classes, &batch.labels, 1);
        }

        let accuracy = if loader.is_empty() {
            0.0
        } else {
            correct as f32 / loader.len() as f32
        };
        debug!(split = name, accuracy, examples = losses.len(), "evaluated split");
        evaluation.accuracies.insert(name.to_string(), accuracy);
        evaluation.losses.insert(name.to_string(), losses);
    }

    Ok(evaluation)
}
