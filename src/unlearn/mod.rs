//! Approximate machine unlearning engine
//!
//! - [`build_mask`]: gradient-saliency mask over parameters
//! - [`Method`]: unlearning strategies, resolved to a [`StrategyFn`]
//! - [`unlearn_epoch`]: masked update loop
//! - [`evaluate`]: per-split losses and accuracy
//! - [`MiaAttacker`]: random-forest membership inference on losses

mod evaluate;
mod mia;
mod saliency;
mod strategy;
mod update;

#[cfg(test)]
mod tests;

pub use evaluate::{evaluate, topk_correct, Evaluation};
pub use mia::{best_of, GridScore, MiaAttacker, MiaConfig, MiaScore};
pub use saliency::{build_mask, MaskTensor, SaliencyMask};
pub use strategy::{ascent_signs, relabel_forget, LoaderKind, Method, StepContext, StrategyFn};
pub use update::{unlearn_epoch, EpochStats};
