//! Loss functions for training and unlearning
//!
//! Losses are computed per example (no reduction). Strategies and the
//! training driver decide how rows are transformed and aggregated.

mod cross_entropy;
mod traits;

pub use cross_entropy::CrossEntropyLoss;
pub use traits::LossFn;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loss_names() {
        assert_eq!(CrossEntropyLoss.name(), "CrossEntropy");
    }
}
