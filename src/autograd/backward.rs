//! Backward operation trait

/// A node in the gradient tape
///
/// Each differentiable op stores one of these on its result tensor. Calling
/// `backward` reads the result's gradient, accumulates the contribution into
/// every input that requires a gradient, then recurses into the inputs' ops.
pub trait BackwardOp {
    /// Propagate the result gradient to the op's inputs
    fn backward(&self);
}
