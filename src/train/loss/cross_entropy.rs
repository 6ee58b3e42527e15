//! Cross Entropy Loss for classification

use crate::autograd::{is_grad_enabled, BackwardOp, GradCell};
use crate::{Error, Result, Tensor};
use ndarray::Array1;
use std::rc::Rc;

use super::LossFn;

/// Cross Entropy Loss over integer class labels
///
/// L_b = -log(softmax(logits_b)[label_b])
///
/// # Example
///
/// ```
/// use desaprender::train::{CrossEntropyLoss, LossFn};
/// use desaprender::Tensor;
///
/// let logits = Tensor::from_shape_vec(&[2, 3], vec![2.0, 1.0, 0.5, 0.1, 0.2, 3.0], true);
/// let losses = CrossEntropyLoss.per_example(&logits, &[0, 2]).unwrap();
/// assert_eq!(losses.len(), 2);
/// assert!(losses.data()[0] > 0.0);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct CrossEntropyLoss;

impl CrossEntropyLoss {
    /// Compute softmax: exp(x_i) / sum(exp(x_j))
    pub(crate) fn softmax(x: &[f32]) -> Vec<f32> {
        let max = x.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
        let exp_x: Vec<f32> = x.iter().map(|v| (v - max).exp()).collect();
        let sum: f32 = exp_x.iter().sum();
        exp_x.into_iter().map(|e| e / sum).collect()
    }
}

impl LossFn for CrossEntropyLoss {
    fn per_example(&self, logits: &Tensor, labels: &[usize]) -> Result<Tensor> {
        let batch = labels.len();
        if batch == 0 {
            return Ok(Tensor::from_vec(Vec::new(), false));
        }
        if logits.len() % batch != 0 || logits.is_empty() {
            return Err(Error::ShapeMismatch {
                name: "cross_entropy.logits".to_string(),
                expected: vec![batch, logits.len() / batch.max(1)],
                actual: logits.shape().to_vec(),
            });
        }
        let classes = logits.len() / batch;

        let flat = logits.data();
        let mut losses = Vec::with_capacity(batch);
        // d(CE_b)/d(logits_b) = probs_b - onehot(label_b)
        let mut local_grad = Vec::with_capacity(logits.len());
        for (b, &label) in labels.iter().enumerate() {
            if label >= classes {
                return Err(Error::InvalidInput(format!(
                    "label {label} out of range for {classes} classes"
                )));
            }
            let row: Vec<f32> = (0..classes).map(|c| flat[b * classes + c]).collect();
            let probs = Self::softmax(&row);
            losses.push(-(probs[label] + 1e-10).ln());
            local_grad.extend(
                probs
                    .iter()
                    .enumerate()
                    .map(|(c, &p)| if c == label { p - 1.0 } else { p }),
            );
        }

        let requires_grad = logits.requires_grad() && is_grad_enabled();
        let mut loss = Tensor::from_vec(losses, requires_grad);

        if requires_grad {
            loss.set_backward_op(Rc::new(CEBackward {
                logits: logits.clone(),
                local_grad: Array1::from(local_grad),
                classes,
                result_grad: loss.grad_cell(),
            }));
        }

        Ok(loss)
    }

    fn name(&self) -> &'static str {
        "CrossEntropy"
    }
}

struct CEBackward {
    logits: Tensor,
    local_grad: Array1<f32>,
    classes: usize,
    result_grad: GradCell,
}

impl BackwardOp for CEBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            // Row b of the logits gradient is grad[b] * (probs_b - onehot_b)
            let mut grad_logits = self.local_grad.clone();
            for (i, g) in grad_logits.iter_mut().enumerate() {
                *g *= grad[i / self.classes];
            }
            self.logits.accumulate_grad(grad_logits);

            if let Some(op) = self.logits.backward_op() {
                op.backward();
            }
        }
    }
}
