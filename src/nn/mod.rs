//! Classifier models
//!
//! A small feed-forward family built on the tape autograd:
//! - [`Linear`]: affine layer
//! - [`Mlp`]: linear layers with ReLU, implementing [`Classifier`]
//! - [`build_model`]: construct a classifier from a [`ModelSpec`]

mod classifier;
mod linear;
mod mlp;
mod registry;

pub use classifier::Classifier;
pub use linear::Linear;
pub use mlp::Mlp;
pub use registry::{build_model, ModelSpec, ARCHITECTURES};
