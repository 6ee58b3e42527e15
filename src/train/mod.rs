//! Training: losses, early stopping and the supervised training driver

mod early_stopping;
mod loss;
mod trainer;

pub use early_stopping::EarlyStopping;
pub use loss::{CrossEntropyLoss, LossFn};
pub use trainer::{topk_accuracy, EpochReport, TrainConfig, TrainResult, Trainer};
