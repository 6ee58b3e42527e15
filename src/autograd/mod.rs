//! Tape-based autograd engine
//!
//! Provides reverse-mode automatic differentiation over flat `f32` tensors.
//! Each op attaches a [`BackwardOp`] to its result; [`backward`] seeds the
//! output gradient and walks the tape back to the leaves.
//!
//! Graphs built by the classifiers in this crate are trees (every
//! intermediate tensor has exactly one consumer), which is what the
//! recursive propagation assumes.

mod backward;
mod context;
mod ops;
mod tensor;

#[cfg(test)]
mod tests;

pub use backward::BackwardOp;
pub use context::{is_grad_enabled, no_grad, NoGradGuard};
pub use ops::*;
pub use tensor::{GradCell, Tensor};

/// Perform backward pass on a tensor
pub fn backward(tensor: &mut Tensor, grad_output: Option<ndarray::Array1<f32>>) {
    if let Some(grad) = grad_output {
        tensor.set_grad(grad);
    } else {
        // Initialize with ones for scalar loss
        let ones = ndarray::Array1::ones(tensor.len());
        tensor.set_grad(ones);
    }

    if let Some(op) = tensor.backward_op() {
        op.backward();
    }
}
