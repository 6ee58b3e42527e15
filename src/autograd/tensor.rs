//! Tensor with gradient tracking
//!
//! Storage is a flat `Array1<f32>` in row-major order plus shape metadata.
//! Cloning a tensor copies the data but shares the gradient cell, so a clone
//! captured by a backward op accumulates into the same buffer as the
//! original parameter.

use super::backward::BackwardOp;
use ndarray::Array1;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Shared, optionally-populated gradient buffer
pub type GradCell = Rc<RefCell<Option<Array1<f32>>>>;

/// Differentiable tensor
#[derive(Clone)]
pub struct Tensor {
    data: Array1<f32>,
    shape: Vec<usize>,
    grad: GradCell,
    backward_op: Option<Rc<dyn BackwardOp>>,
    requires_grad: bool,
}

impl Tensor {
    /// Create a 1-D tensor from an array
    pub fn new(data: Array1<f32>, requires_grad: bool) -> Self {
        let shape = vec![data.len()];
        Self {
            data,
            shape,
            grad: Rc::new(RefCell::new(None)),
            backward_op: None,
            requires_grad,
        }
    }

    /// Create a 1-D tensor from a vector
    pub fn from_vec(data: Vec<f32>, requires_grad: bool) -> Self {
        Self::new(Array1::from(data), requires_grad)
    }

    /// Create a tensor with an explicit shape
    ///
    /// # Panics
    ///
    /// Panics if the shape's element count differs from `data.len()`.
    pub fn from_shape_vec(shape: &[usize], data: Vec<f32>, requires_grad: bool) -> Self {
        let numel: usize = shape.iter().product();
        assert_eq!(
            numel,
            data.len(),
            "Shape {shape:?} needs {numel} elements, got {}",
            data.len()
        );
        let mut tensor = Self::from_vec(data, requires_grad);
        tensor.shape = shape.to_vec();
        tensor
    }

    /// Zero-filled 1-D tensor
    pub fn zeros(len: usize, requires_grad: bool) -> Self {
        Self::new(Array1::zeros(len), requires_grad)
    }

    /// Zero-filled tensor with an explicit shape
    pub fn zeros_shaped(shape: &[usize], requires_grad: bool) -> Self {
        let numel = shape.iter().product();
        Self::from_shape_vec(shape, vec![0.0; numel], requires_grad)
    }

    /// Flat data view
    pub fn data(&self) -> &Array1<f32> {
        &self.data
    }

    /// Mutable flat data, used by optimizers for in-place updates
    pub fn data_mut(&mut self) -> &mut Array1<f32> {
        &mut self.data
    }

    /// Logical shape
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the tensor holds no elements
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether gradients flow into this tensor
    pub fn requires_grad(&self) -> bool {
        self.requires_grad
    }

    /// Snapshot of the current gradient
    pub fn grad(&self) -> Option<Array1<f32>> {
        self.grad.borrow().clone()
    }

    /// Overwrite the gradient
    pub fn set_grad(&self, grad: Array1<f32>) {
        *self.grad.borrow_mut() = Some(grad);
    }

    /// Add into the gradient, initializing it on first use
    pub fn accumulate_grad(&self, grad: Array1<f32>) {
        let mut cell = self.grad.borrow_mut();
        match cell.as_mut() {
            Some(existing) => *existing += &grad,
            None => *cell = Some(grad),
        }
    }

    /// Apply `f` to the gradient in place, if one is present
    pub fn update_grad<F>(&self, f: F)
    where
        F: FnOnce(&mut Array1<f32>),
    {
        if let Some(grad) = self.grad.borrow_mut().as_mut() {
            f(grad);
        }
    }

    /// Drop the gradient buffer
    pub fn zero_grad(&self) {
        *self.grad.borrow_mut() = None;
    }

    /// Shared handle to the gradient cell
    pub fn grad_cell(&self) -> GradCell {
        Rc::clone(&self.grad)
    }

    /// Attach the op that produced this tensor
    pub fn set_backward_op(&mut self, op: Rc<dyn BackwardOp>) {
        self.backward_op = Some(op);
    }

    /// Op that produced this tensor, if any
    pub fn backward_op(&self) -> Option<Rc<dyn BackwardOp>> {
        self.backward_op.clone()
    }

    /// Copy of the data cut off from the tape
    pub fn detach(&self) -> Self {
        let mut tensor = Self::new(self.data.clone(), false);
        tensor.shape = self.shape.clone();
        tensor
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("shape", &self.shape)
            .field("requires_grad", &self.requires_grad)
            .field("has_grad", &self.grad.borrow().is_some())
            .field("has_backward_op", &self.backward_op.is_some())
            .finish()
    }
}
