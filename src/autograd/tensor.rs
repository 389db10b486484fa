//! Tensor with gradient tracking
//!
//! Storage is flat (`Array1<f32>`) with a separate logical shape. Cloning a
//! `Tensor` yields another handle onto the same storage and gradient cell,
//! which is what lets a parameter index, an optimizer and a forward hook all
//! act on one live parameter. Use [`Tensor::deep_clone`] for an independent
//! copy.

use super::BackwardOp;
use crate::{Error, Result};
use ndarray::Array1;
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

/// Shared gradient cell written by backward ops
pub type GradCell = Rc<RefCell<Option<Array1<f32>>>>;

/// A tensor participating in the tape-free recursive autograd
#[derive(Clone)]
pub struct Tensor {
    data: Rc<RefCell<Array1<f32>>>,
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
            data: Rc::new(RefCell::new(data)),
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

    /// Create a tensor with an explicit logical shape
    ///
    /// # Errors
    ///
    /// Returns `ShapeMismatch` if the element count does not match the shape.
    pub fn from_shape_vec(shape: &[usize], data: Vec<f32>, requires_grad: bool) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(Error::ShapeMismatch {
                name: "tensor".to_string(),
                expected: shape.to_vec(),
                actual: vec![data.len()],
            });
        }
        let mut tensor = Self::from_vec(data, requires_grad);
        tensor.shape = shape.to_vec();
        Ok(tensor)
    }

    /// Tensor of zeros with the given shape
    pub fn zeros(shape: &[usize], requires_grad: bool) -> Self {
        let len: usize = shape.iter().product();
        let mut tensor = Self::new(Array1::zeros(len), requires_grad);
        tensor.shape = shape.to_vec();
        tensor
    }

    /// Tensor of ones with the given shape
    pub fn ones(shape: &[usize], requires_grad: bool) -> Self {
        let len: usize = shape.iter().product();
        let mut tensor = Self::new(Array1::ones(len), requires_grad);
        tensor.shape = shape.to_vec();
        tensor
    }

    /// Ones with the same shape as `other`
    pub fn ones_like(other: &Tensor, requires_grad: bool) -> Self {
        Self::ones(&other.shape, requires_grad)
    }

    /// Zeros with the same shape as `other`
    pub fn zeros_like(other: &Tensor, requires_grad: bool) -> Self {
        Self::zeros(&other.shape, requires_grad)
    }

    /// Borrow the flat storage
    pub fn data(&self) -> Ref<'_, Array1<f32>> {
        self.data.borrow()
    }

    /// Mutably borrow the flat storage
    ///
    /// Writes are visible through every handle of this tensor and bypass
    /// gradient tracking.
    pub fn data_mut(&self) -> RefMut<'_, Array1<f32>> {
        self.data.borrow_mut()
    }

    /// Copy of the values
    pub fn to_vec(&self) -> Vec<f32> {
        self.data.borrow().to_vec()
    }

    /// Logical shape
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Reinterpret the logical shape without touching storage
    ///
    /// # Errors
    ///
    /// Returns `ShapeMismatch` if the element counts differ.
    pub fn reshape(mut self, shape: &[usize]) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if expected != self.len() {
            return Err(Error::ShapeMismatch {
                name: "reshape".to_string(),
                expected: shape.to_vec(),
                actual: self.shape.clone(),
            });
        }
        self.shape = shape.to_vec();
        Ok(self)
    }

    /// Adopt the logical shape of an equally sized tensor
    pub(crate) fn shaped_like(mut self, other: &Tensor) -> Self {
        debug_assert_eq!(self.len(), other.len());
        self.shape = other.shape.clone();
        self
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.data.borrow().len()
    }

    /// Whether the tensor holds no elements
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Single value of a one-element tensor
    ///
    /// # Errors
    ///
    /// Returns `ShapeMismatch` unless the tensor has exactly one element.
    pub fn item(&self) -> Result<f32> {
        let data = self.data.borrow();
        if data.len() != 1 {
            return Err(Error::ShapeMismatch {
                name: "item".to_string(),
                expected: vec![1],
                actual: self.shape.clone(),
            });
        }
        Ok(data[0])
    }

    /// Count of elements that are not exactly zero
    pub fn count_nonzero(&self) -> usize {
        self.data.borrow().iter().filter(|&&v| v != 0.0).count()
    }

    /// Whether gradients flow into this tensor
    pub fn requires_grad(&self) -> bool {
        self.requires_grad
    }

    /// Enable or disable gradient tracking
    pub fn set_requires_grad(&mut self, requires_grad: bool) {
        self.requires_grad = requires_grad;
    }

    /// Leaf tensors were created directly rather than by an operation
    pub fn is_leaf(&self) -> bool {
        self.backward_op.is_none()
    }

    /// Current gradient, if any backward pass reached this tensor
    pub fn grad(&self) -> Option<Array1<f32>> {
        self.grad.borrow().clone()
    }

    /// Shared gradient cell (for backward ops)
    pub fn grad_cell(&self) -> GradCell {
        Rc::clone(&self.grad)
    }

    /// Overwrite the gradient
    pub fn set_grad(&self, grad: Array1<f32>) {
        *self.grad.borrow_mut() = Some(grad);
    }

    /// Add to the gradient, initializing it on first use
    pub fn accumulate_grad(&self, grad: Array1<f32>) {
        let mut cell = self.grad.borrow_mut();
        match cell.as_mut() {
            Some(existing) => *existing += &grad,
            None => *cell = Some(grad),
        }
    }

    /// Drop the gradient
    pub fn zero_grad(&self) {
        *self.grad.borrow_mut() = None;
    }

    /// Operation that produced this tensor
    pub fn backward_op(&self) -> Option<Rc<dyn BackwardOp>> {
        self.backward_op.clone()
    }

    /// Attach the operation that produced this tensor
    pub fn set_backward_op(&mut self, op: Rc<dyn BackwardOp>) {
        self.backward_op = Some(op);
    }

    /// Independent copy of the values and shape, with no gradient history
    pub fn deep_clone(&self) -> Self {
        let mut tensor = Self::new(self.data.borrow().clone(), self.requires_grad);
        tensor.shape = self.shape.clone();
        tensor
    }

    /// Handle onto the same storage with gradient tracking cut off
    pub fn detach(&self) -> Self {
        Self {
            data: Rc::clone(&self.data),
            shape: self.shape.clone(),
            grad: Rc::new(RefCell::new(None)),
            backward_op: None,
            requires_grad: false,
        }
    }

    /// Identity of the graph node, shared by every handle onto this tensor
    pub(crate) fn node_id(&self) -> usize {
        Rc::as_ptr(&self.grad) as usize
    }

    /// Whether two handles refer to the same storage
    pub fn shares_storage(&self, other: &Tensor) -> bool {
        Rc::ptr_eq(&self.data, &other.data)
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("shape", &self.shape)
            .field("requires_grad", &self.requires_grad)
            .field("is_leaf", &self.is_leaf())
            .field("has_grad", &self.grad.borrow().is_some())
            .finish_non_exhaustive()
    }
}
