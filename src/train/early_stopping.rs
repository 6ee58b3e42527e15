//! Early stopping on a monitored metric

use crate::optim::PlateauMode;

/// Stop training when a metric has not improved for `patience` epochs
///
/// # Example
///
/// ```
/// use desaprender::optim::PlateauMode;
/// use desaprender::train::EarlyStopping;
///
/// // Stop if validation accuracy does not rise for 10 epochs
/// let mut early_stop = EarlyStopping::new(10, 0.0, PlateauMode::Max);
/// assert!(!early_stop.update(42.0));
/// ```
#[derive(Clone, Debug)]
pub struct EarlyStopping {
    /// Number of epochs to wait for improvement
    patience: usize,
    /// Minimum improvement to reset patience
    min_delta: f32,
    mode: PlateauMode,
    best: Option<f32>,
    /// Epochs without improvement
    pub(crate) epochs_without_improvement: usize,
}

impl EarlyStopping {
    /// Create new early stopping monitor
    pub fn new(patience: usize, min_delta: f32, mode: PlateauMode) -> Self {
        Self {
            patience,
            min_delta,
            mode,
            best: None,
            epochs_without_improvement: 0,
        }
    }

    /// Best metric seen so far
    pub fn best(&self) -> Option<f32> {
        self.best
    }

    /// Reset internal state
    pub fn reset(&mut self) {
        self.best = None;
        self.epochs_without_improvement = 0;
    }

    /// Check if metric improved
    fn check_improvement(&mut self, metric: f32) -> bool {
        let improved = match (self.best, self.mode) {
            (None, _) => true,
            (Some(best), PlateauMode::Max) => metric > best + self.min_delta,
            (Some(best), PlateauMode::Min) => metric < best - self.min_delta,
        };
        if improved {
            self.best = Some(metric);
            self.epochs_without_improvement = 0;
        } else {
            self.epochs_without_improvement += 1;
        }
        improved
    }

    /// Record an epoch's metric; returns true when training should stop
    pub fn update(&mut self, metric: f32) -> bool {
        self.check_improvement(metric);
        self.epochs_without_improvement >= self.patience
    }
}
