//! Learning rate scheduling on a monitored metric

use super::Optimizer;
use serde::{Deserialize, Serialize};

/// Whether the monitored metric should go up or down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlateauMode {
    Min,
    Max,
}

/// Reduce the learning rate when a metric stops improving
///
/// After more than `patience` consecutive epochs without a relative
/// improvement of at least `threshold`, the learning rate is multiplied by
/// `factor` (never below `min_lr`) and the counter resets.
#[derive(Debug, Clone)]
pub struct ReduceLROnPlateau {
    lr: f32,
    mode: PlateauMode,
    factor: f32,
    patience: usize,
    threshold: f32,
    min_lr: f32,
    best: Option<f32>,
    num_bad_epochs: usize,
}

impl ReduceLROnPlateau {
    /// Create a new plateau scheduler
    ///
    /// # Arguments
    /// * `lr` - Initial learning rate
    /// * `mode` - Direction of improvement for the monitored metric
    /// * `factor` - Multiplicative decay (e.g. 0.2)
    /// * `patience` - Epochs without improvement tolerated before decaying
    pub fn new(lr: f32, mode: PlateauMode, factor: f32, patience: usize) -> Self {
        Self {
            lr,
            mode,
            factor,
            patience,
            threshold: 1e-4,
            min_lr: 0.0,
            best: None,
            num_bad_epochs: 0,
        }
    }

    /// Current learning rate
    pub fn get_lr(&self) -> f32 {
        self.lr
    }

    /// Best metric observed so far
    pub fn best(&self) -> Option<f32> {
        self.best
    }

    fn is_better(&self, metric: f32, best: f32) -> bool {
        match self.mode {
            PlateauMode::Max => metric > best * (1.0 + self.threshold.copysign(best)),
            PlateauMode::Min => metric < best * (1.0 - self.threshold.copysign(best)),
        }
    }

    /// Record an epoch's metric; returns true when the learning rate decayed
    pub fn step(&mut self, metric: f32) -> bool {
        let improved = match self.best {
            None => true,
            Some(best) => self.is_better(metric, best),
        };

        if improved {
            self.best = Some(metric);
            self.num_bad_epochs = 0;
            return false;
        }

        self.num_bad_epochs += 1;
        if self.num_bad_epochs > self.patience {
            let new_lr = (self.lr * self.factor).max(self.min_lr);
            let decayed = new_lr < self.lr;
            self.lr = new_lr;
            self.num_bad_epochs = 0;
            return decayed;
        }
        false
    }

    /// Apply the current learning rate to an optimizer
    pub fn apply<O: Optimizer + ?Sized>(&self, optimizer: &mut O) {
        optimizer.set_lr(self.lr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optim::SGD;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_improving_metric_keeps_lr() {
        let mut sched = ReduceLROnPlateau::new(0.1, PlateauMode::Max, 0.2, 1);
        for acc in [10.0, 20.0, 30.0, 40.0] {
            assert!(!sched.step(acc));
        }
        assert_abs_diff_eq!(sched.get_lr(), 0.1);
        assert_eq!(sched.best(), Some(40.0));
    }

    #[test]
    fn test_plateau_decays_after_patience() {
        let mut sched = ReduceLROnPlateau::new(0.1, PlateauMode::Max, 0.2, 2);
        sched.step(50.0);
        assert!(!sched.step(50.0));
        assert!(!sched.step(49.0));
        // Third bad epoch exceeds patience
        assert!(sched.step(48.0));
        assert_abs_diff_eq!(sched.get_lr(), 0.02, epsilon = 1e-7);
    }

    #[test]
    fn test_min_mode() {
        let mut sched = ReduceLROnPlateau::new(1.0, PlateauMode::Min, 0.5, 0);
        sched.step(1.0);
        assert!(!sched.step(0.5));
        assert!(sched.step(0.6));
        assert_abs_diff_eq!(sched.get_lr(), 0.5);
    }

    #[test]
    fn test_apply_sets_optimizer_lr() {
        let mut sched = ReduceLROnPlateau::new(0.1, PlateauMode::Max, 0.1, 0);
        let mut opt = SGD::new(0.1, 0.9);
        sched.step(1.0);
        sched.step(0.0);
        sched.apply(&mut opt);
        assert_abs_diff_eq!(opt.lr(), 0.01, epsilon = 1e-7);
    }
}
