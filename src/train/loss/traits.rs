//! Loss function trait

use crate::{Result, Tensor};

/// Per-example classification loss
///
/// Implementations return one loss per row (no reduction) so callers can
/// transform individual examples before aggregating.
pub trait LossFn {
    /// Per-example losses for `logits` of shape `[batch, classes]`
    fn per_example(&self, logits: &Tensor, labels: &[usize]) -> Result<Tensor>;

    /// Name of the loss function
    fn name(&self) -> &str;
}
