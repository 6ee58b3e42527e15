//! Autograd operations with backward passes

mod activations;
mod basic;
mod linear;

pub use activations::relu;
pub use basic::{mean, mul, scale, sum};
pub use linear::linear;
