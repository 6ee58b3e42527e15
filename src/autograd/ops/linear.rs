//! Fused affine op: `y = x · W + b`
//!
//! `x` is `[batch, in]`, `W` is `[in, out]`, `b` is `[out]`, all row-major.
//! Forward and backward both go through ndarray's GEMM.

use crate::autograd::{is_grad_enabled, BackwardOp, GradCell, Tensor};
use crate::{Error, Result};
use ndarray::{Array1, Array2, Axis};
use std::rc::Rc;

/// Affine transform of a batch of row vectors
pub fn linear(x: &Tensor, weight: &Tensor, bias: &Tensor, batch: usize) -> Result<Tensor> {
    let out_dim = bias.len();
    if out_dim == 0 || weight.len() % out_dim != 0 {
        return Err(Error::length("linear.weight", out_dim, weight.len()));
    }
    let in_dim = weight.len() / out_dim;
    if x.len() != batch * in_dim {
        return Err(Error::ShapeMismatch {
            name: "linear.input".to_string(),
            expected: vec![batch, in_dim],
            actual: x.shape().to_vec(),
        });
    }

    let x2 = to_matrix(x.data(), batch, in_dim);
    let w2 = to_matrix(weight.data(), in_dim, out_dim);
    let y = x2.dot(&w2) + bias.data();

    let requires_grad = (x.requires_grad() || weight.requires_grad() || bias.requires_grad())
        && is_grad_enabled();
    let mut result = Tensor::from_shape_vec(&[batch, out_dim], flatten(&y), requires_grad);

    if requires_grad {
        let backward_op = Rc::new(LinearBackward {
            x: x.clone(),
            weight: weight.clone(),
            bias: bias.clone(),
            x2,
            w2,
            batch,
            out_dim,
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    Ok(result)
}

fn to_matrix(flat: &Array1<f32>, rows: usize, cols: usize) -> Array2<f32> {
    Array2::from_shape_fn((rows, cols), |(r, c)| flat[r * cols + c])
}

fn flatten(m: &Array2<f32>) -> Vec<f32> {
    m.iter().copied().collect()
}

struct LinearBackward {
    x: Tensor,
    weight: Tensor,
    bias: Tensor,
    x2: Array2<f32>,
    w2: Array2<f32>,
    batch: usize,
    out_dim: usize,
    result_grad: GradCell,
}

impl BackwardOp for LinearBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            let g = to_matrix(grad, self.batch, self.out_dim);

            if self.weight.requires_grad() {
                // ∂L/∂W = xᵀ · ∂L/∂y
                let grad_w = self.x2.t().dot(&g);
                self.weight.accumulate_grad(Array1::from(flatten(&grad_w)));
            }
            if self.bias.requires_grad() {
                self.bias.accumulate_grad(g.sum_axis(Axis(0)));
            }
            if self.x.requires_grad() {
                // ∂L/∂x = ∂L/∂y · Wᵀ
                let grad_x = g.dot(&self.w2.t());
                self.x.accumulate_grad(Array1::from(flatten(&grad_x)));
            }

            if let Some(op) = self.x.backward_op() {
                op.backward();
            }
        }
    }
}
