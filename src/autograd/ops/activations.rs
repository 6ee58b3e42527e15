//! Activation ops

use crate::autograd::{is_grad_enabled, BackwardOp, GradCell, Tensor};
use std::rc::Rc;

/// ReLU activation, preserving the input shape
pub fn relu(a: &Tensor) -> Tensor {
    let data = a.data().mapv(|x| x.max(0.0));
    let requires_grad = a.requires_grad() && is_grad_enabled();

    let mut result = Tensor::from_shape_vec(a.shape(), data.to_vec(), requires_grad);

    if requires_grad {
        let backward_op = Rc::new(ReluBackward {
            a: a.clone(),
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct ReluBackward {
    a: Tensor,
    result_grad: GradCell,
}

impl BackwardOp for ReluBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                // ∂L/∂a = ∂L/∂out * (a > 0)
                let gate = self.a.data().mapv(|x| if x > 0.0 { 1.0 } else { 0.0 });
                self.a.accumulate_grad(grad * &gate);
            }

            if let Some(op) = self.a.backward_op() {
                op.backward();
            }
        }
    }
}
