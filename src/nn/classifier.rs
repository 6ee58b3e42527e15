//! Classifier trait consumed by training, unlearning and evaluation

use super::ModelSpec;
use crate::{Result, Tensor};

/// A differentiable classifier with named parameters
///
/// `forward` maps a flattened `[batch, input_dim]` tensor to logits of shape
/// `[batch, num_classes]`. Parameters are reported in a stable order; masks
/// and checkpoints address them by name.
pub trait Classifier {
    /// Compute logits for a batch
    fn forward(&self, inputs: &Tensor, batch: usize) -> Result<Tensor>;

    /// Number of output classes
    fn num_classes(&self) -> usize;

    /// Feature dimension of one example
    fn input_dim(&self) -> usize;

    /// Architecture description used to rebuild the model
    fn spec(&self) -> ModelSpec;

    /// Parameters with their names, in registration order
    fn named_parameters(&self) -> Vec<(String, &Tensor)>;

    /// Mutable parameters with their names, in registration order
    fn named_parameters_mut(&mut self) -> Vec<(String, &mut Tensor)>;

    /// Mutable parameters in registration order, for optimizers
    fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        self.named_parameters_mut()
            .into_iter()
            .map(|(_, p)| p)
            .collect()
    }

    /// Clear every parameter gradient
    fn zero_grad(&self) {
        for (_, param) in self.named_parameters() {
            param.zero_grad();
        }
    }

    /// Total trainable parameter count
    fn num_parameters(&self) -> usize {
        self.named_parameters().iter().map(|(_, p)| p.len()).sum()
    }
}
