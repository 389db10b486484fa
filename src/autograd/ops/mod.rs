//! Autograd operations with backward passes
//!
//! This module provides differentiable operations for automatic differentiation.

mod activations;
mod basic;
mod loss;
mod matmul;

pub use activations::{relu, tanh};
pub use basic::{add, add_row_broadcast, mul, scale, sum};
pub use loss::mse_loss;
pub use matmul::{matmul_compute, matmul_transposed, transpose};
