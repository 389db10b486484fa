//! Reverse-mode autograd
//!
//! Each operation attaches a [`BackwardOp`] to its output. Calling
//! [`backward`] on a scalar loss seeds its gradient and runs the recorded
//! operations in reverse topological order, so a tensor consumed several
//! times receives the sum of its consumers' gradients before passing it on. The graph lives only as long as the tensors
//! that reference it: dropping the loss and every intermediate releases it.
//!
//! ```
//! use podar::autograd::{backward, mul, sum, Tensor};
//!
//! let w = Tensor::from_vec(vec![2.0, 3.0], false);
//! let m = Tensor::from_vec(vec![1.0, 1.0], true);
//! let loss = sum(&mul(&w, &m));
//! backward(&loss, None);
//! assert_eq!(m.grad().unwrap().to_vec(), vec![2.0, 3.0]);
//! ```

mod backward;
mod ops;
pub mod precision;
mod tensor;

#[cfg(test)]
mod tests;

pub use backward::BackwardOp;
pub use ops::*;
pub use precision::Precision;
pub use tensor::{GradCell, Tensor};

/// Perform a backward pass from `tensor`
///
/// Without an explicit output gradient the tensor is treated as a loss and
/// seeded with ones.
pub fn backward(tensor: &Tensor, grad_output: Option<ndarray::Array1<f32>>) {
    match grad_output {
        Some(grad) => tensor.set_grad(grad),
        None => tensor.set_grad(ndarray::Array1::ones(tensor.len())),
    }

    for node in backward::topological_order(tensor).iter().rev() {
        if let Some(op) = node.backward_op() {
            op.backward();
        }
    }
}
