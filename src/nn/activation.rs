//! Activation function modules.
//!
//! These wrap the autograd activations for use in [`Sequential`](super::Sequential).

use super::hooks::ForwardHooks;
use super::module::Module;
use crate::autograd::{relu, tanh, Tensor};

/// Rectified Linear Unit activation: ReLU(x) = max(0, x)
#[derive(Debug, Default)]
pub struct ReLU {
    hooks: ForwardHooks,
}

impl ReLU {
    /// Create a new ReLU activation.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Module for ReLU {
    fn forward(&self, input: &Tensor) -> Tensor {
        relu(input)
    }

    fn hooks(&self) -> &ForwardHooks {
        &self.hooks
    }
}

/// Hyperbolic tangent activation
#[derive(Debug, Default)]
pub struct Tanh {
    hooks: ForwardHooks,
}

impl Tanh {
    /// Create a new Tanh activation.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Module for Tanh {
    fn forward(&self, input: &Tensor) -> Tensor {
        tanh(input)
    }

    fn hooks(&self) -> &ForwardHooks {
        &self.hooks
    }
}
