//! Unlearning strategies
//!
//! Each strategy turns a batch into the scalar loss that is backpropagated
//! by the update loop. The variant is resolved once into a [`StrategyFn`].

use crate::autograd::{mean, mul, scale};
use crate::data::{Batch, ForgetSet};
use crate::nn::Classifier;
use crate::train::LossFn;
use crate::{Error, Result, Tensor};
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Unlearning method
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    /// Relabel forget rows with a different random class
    #[default]
    #[serde(rename = "rl")]
    RandomLabel,
    /// Negate the loss of forget rows
    #[serde(rename = "ga")]
    GradientAscent,
    /// Ascend on the forget set alone
    #[serde(rename = "ga_small")]
    GradientAscentForgetOnly,
    /// Train from scratch on the retain set
    #[serde(rename = "retrain")]
    Retrain,
}

/// Which loader a method iterates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderKind {
    /// Forget ∪ retain
    Train,
    Forget,
    Retain,
}

/// Per-run state shared with strategies
pub struct StepContext<'a> {
    pub forget_set: &'a ForgetSet,
    pub loss_fn: &'a dyn LossFn,
    pub rng: &'a mut StdRng,
}

/// Resolved strategy: batch to scalar loss
pub type StrategyFn = fn(&dyn Classifier, &Batch, &mut StepContext<'_>) -> Result<Tensor>;

impl Method {
    /// Every method, in CLI order
    pub const ALL: [Method; 4] = [
        Self::RandomLabel,
        Self::GradientAscent,
        Self::GradientAscentForgetOnly,
        Self::Retrain,
    ];

    /// Command-line name
    pub fn name(self) -> &'static str {
        match self {
            Self::RandomLabel => "rl",
            Self::GradientAscent => "ga",
            Self::GradientAscentForgetOnly => "ga_small",
            Self::Retrain => "retrain",
        }
    }

    /// Loader the update loop iterates for this method
    pub fn loader_kind(self) -> LoaderKind {
        match self {
            Self::RandomLabel | Self::GradientAscent => LoaderKind::Train,
            Self::GradientAscentForgetOnly => LoaderKind::Forget,
            Self::Retrain => LoaderKind::Retain,
        }
    }

    /// Whether the run starts from a freshly initialized model
    pub fn reinitializes_model(self) -> bool {
        matches!(self, Self::Retrain)
    }

    pub fn resolve(self) -> StrategyFn {
        match self {
            Self::RandomLabel => random_label,
            Self::GradientAscent => gradient_ascent,
            Self::GradientAscentForgetOnly => gradient_ascent_forget_only,
            Self::Retrain => retrain,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.name() == s)
            .ok_or_else(|| {
                Error::Config(format!(
                    "unknown method '{s}', expected one of: rl, ga, ga_small, retrain"
                ))
            })
    }
}

/// Replace forget labels with `(label + r) mod C`, `r ~ U[1, C)`
///
/// Non-forget labels are returned unchanged; every relabeled class differs
/// from the original.
pub fn relabel_forget(
    labels: &[usize],
    membership: &[bool],
    num_classes: usize,
    rng: &mut StdRng,
) -> Result<Vec<usize>> {
    if num_classes < 2 {
        return Err(Error::InvalidInput(format!(
            "random relabeling needs at least 2 classes, got {num_classes}"
        )));
    }
    if labels.len() != membership.len() {
        return Err(Error::length("relabel.membership", labels.len(), membership.len()));
    }
    Ok(labels
        .iter()
        .zip(membership)
        .map(|(&label, &is_forget)| {
            if is_forget {
                (label + rng.random_range(1..num_classes)) % num_classes
            } else {
                label
            }
        })
        .collect())
}

/// `-1` for forget rows, `+1` otherwise
pub fn ascent_signs(membership: &[bool]) -> Vec<f32> {
    membership
        .iter()
        .map(|&is_forget| if is_forget { -1.0 } else { 1.0 })
        .collect()
}

fn per_example(
    model: &dyn Classifier,
    batch: &Batch,
    labels: &[usize],
    ctx: &StepContext<'_>,
) -> Result<Tensor> {
    let logits = model.forward(&batch.inputs, batch.size())?;
    ctx.loss_fn.per_example(&logits, labels)
}

fn random_label(
    model: &dyn Classifier,
    batch: &Batch,
    ctx: &mut StepContext<'_>,
) -> Result<Tensor> {
    let membership = ctx.forget_set.membership(&batch.indices);
    let labels = relabel_forget(&batch.labels, &membership, model.num_classes(), ctx.rng)?;
    Ok(mean(&per_example(model, batch, &labels, ctx)?))
}

fn gradient_ascent(
    model: &dyn Classifier,
    batch: &Batch,
    ctx: &mut StepContext<'_>,
) -> Result<Tensor> {
    let losses = per_example(model, batch, &batch.labels, ctx)?;
    let membership = ctx.forget_set.membership(&batch.indices);
    let signs = Tensor::from_vec(ascent_signs(&membership), false);
    Ok(mean(&mul(&losses, &signs)))
}

fn gradient_ascent_forget_only(
    model: &dyn Classifier,
    batch: &Batch,
    ctx: &mut StepContext<'_>,
) -> Result<Tensor> {
    let losses = per_example(model, batch, &batch.labels, ctx)?;
    Ok(scale(&mean(&losses), -1.0))
}

fn retrain(model: &dyn Classifier, batch: &Batch, ctx: &mut StepContext<'_>) -> Result<Tensor> {
    Ok(mean(&per_example(model, batch, &batch.labels, ctx)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_method_names_roundtrip() {
        for method in Method::ALL {
            assert_eq!(method.name().parse::<Method>().unwrap(), method);
            let json = serde_json::to_string(&method).unwrap();
            assert_eq!(json, format!("\"{}\"", method.name()));
        }
        assert!("sgd".parse::<Method>().is_err());
    }

    #[test]
    fn test_loader_kinds() {
        assert_eq!(Method::RandomLabel.loader_kind(), LoaderKind::Train);
        assert_eq!(Method::GradientAscent.loader_kind(), LoaderKind::Train);
        assert_eq!(Method::GradientAscentForgetOnly.loader_kind(), LoaderKind::Forget);
        assert_eq!(Method::Retrain.loader_kind(), LoaderKind::Retain);
        assert!(Method::Retrain.reinitializes_model());
        assert!(!Method::GradientAscent.reinitializes_model());
    }

    #[test]
    fn test_relabel_always_changes_forget_labels() {
        let mut rng = StdRng::seed_from_u64(1);
        let labels: Vec<usize> = (0..200).map(|i| i % 5).collect();
        let membership: Vec<bool> = (0..200).map(|i| i % 3 == 0).collect();
        let relabeled = relabel_forget(&labels, &membership, 5, &mut rng).unwrap();

        for ((old, new), is_forget) in labels.iter().zip(&relabeled).zip(&membership) {
            assert!(*new < 5);
            if *is_forget {
                assert_ne!(old, new);
            } else {
                assert_eq!(old, new);
            }
        }
    }

    #[test]
    fn test_relabel_binary_flips() {
        let mut rng = StdRng::seed_from_u64(0);
        let relabeled = relabel_forget(&[0, 1, 0], &[true, true, false], 2, &mut rng).unwrap();
        assert_eq!(relabeled, vec![1, 0, 0]);
    }

    #[test]
    fn test_relabel_needs_two_classes() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(relabel_forget(&[0], &[true], 1, &mut rng).is_err());
    }

    #[test]
    fn test_ascent_signs() {
        assert_eq!(ascent_signs(&[false, true, false, true]), vec![1.0, -1.0, 1.0, -1.0]);
    }
}
