//! Stochastic Gradient Descent optimizer

use super::Optimizer;
use crate::Tensor;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// SGD optimizer with optional momentum and L2 weight decay
///
/// Update rule per parameter `p` with gradient `g`:
///
/// ```text
/// d = g + weight_decay * p
/// v = momentum * v + d        (v starts at d)
/// p = p - lr * v
/// ```
pub struct SGD {
    lr: f32,
    momentum: f32,
    weight_decay: f32,
    velocities: Vec<Option<Array1<f32>>>,
}

/// Serializable SGD state, stored alongside model checkpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SgdState {
    pub lr: f32,
    pub momentum: f32,
    pub weight_decay: f32,
    #[serde(default)]
    pub velocities: Vec<Option<Vec<f32>>>,
}

impl SGD {
    /// Create a new SGD optimizer
    pub fn new(lr: f32, momentum: f32) -> Self {
        Self::with_weight_decay(lr, momentum, 0.0)
    }

    /// Create a new SGD optimizer with L2 weight decay
    pub fn with_weight_decay(lr: f32, momentum: f32, weight_decay: f32) -> Self {
        Self {
            lr,
            momentum,
            weight_decay,
            velocities: Vec::new(),
        }
    }

    /// Momentum coefficient
    pub fn momentum(&self) -> f32 {
        self.momentum
    }

    /// Weight decay coefficient
    pub fn weight_decay(&self) -> f32 {
        self.weight_decay
    }

    /// Snapshot the optimizer state
    pub fn state(&self) -> SgdState {
        SgdState {
            lr: self.lr,
            momentum: self.momentum,
            weight_decay: self.weight_decay,
            velocities: self
                .velocities
                .iter()
                .map(|v| v.as_ref().map(|a| a.to_vec()))
                .collect(),
        }
    }

    /// Rebuild an optimizer from a saved state
    pub fn from_state(state: SgdState) -> Self {
        Self {
            lr: state.lr,
            momentum: state.momentum,
            weight_decay: state.weight_decay,
            velocities: state
                .velocities
                .into_iter()
                .map(|v| v.map(Array1::from))
                .collect(),
        }
    }

    fn ensure_velocities(&mut self, count: usize) {
        if self.velocities.len() != count {
            self.velocities = vec![None; count];
        }
    }
}

impl Optimizer for SGD {
    fn step(&mut self, params: &mut [&mut Tensor]) {
        self.ensure_velocities(params.len());

        for (i, param) in params.iter_mut().enumerate() {
            let Some(grad) = param.grad() else {
                continue;
            };

            let mut d = grad;
            if self.weight_decay != 0.0 {
                d = d + param.data() * self.weight_decay;
            }

            if self.momentum > 0.0 {
                let velocity = match self.velocities[i].take() {
                    Some(v) if v.len() == d.len() => v * self.momentum + &d,
                    _ => d,
                };
                *param.data_mut() -= &(&velocity * self.lr);
                self.velocities[i] = Some(velocity);
            } else {
                *param.data_mut() -= &(&d * self.lr);
            }
        }
    }

    fn lr(&self) -> f32 {
        self.lr
    }

    fn set_lr(&mut self, lr: f32) {
        self.lr = lr;
    }
}
