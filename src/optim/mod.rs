//! Optimizers for training and unlearning

mod optimizer;
mod scheduler;
mod sgd;

pub use optimizer::Optimizer;
pub use scheduler::{PlateauMode, ReduceLROnPlateau};
pub use sgd::{SgdState, SGD};
