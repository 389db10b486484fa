//! Optimizer trait and parameter groups

use crate::Tensor;
use std::cell::RefCell;
use std::rc::Rc;

/// A named set of parameters sharing one learning rate
#[derive(Debug, Clone)]
pub struct ParamGroup {
    /// Full-model qualified name for single-parameter groups, free text otherwise
    pub name: String,
    /// Parameter handles updated by the optimizer
    pub params: Vec<Tensor>,
    /// Live learning rate, read on every step
    pub lr: f32,
}

impl ParamGroup {
    /// Create a parameter group
    pub fn new(name: impl Into<String>, params: Vec<Tensor>, lr: f32) -> Self {
        Self {
            name: name.into(),
            params,
            lr,
        }
    }
}

/// Trait for optimization algorithms
///
/// The learning rate lives in the parameter groups so that schedulers and
/// the pruning engine can rewrite it between steps.
pub trait Optimizer {
    /// Parameter groups in registration order
    fn param_groups(&self) -> &[ParamGroup];

    /// Mutable access to the parameter groups
    fn param_groups_mut(&mut self) -> &mut [ParamGroup];

    /// Perform a single optimization step using the current gradients
    fn step(&mut self);

    /// Zero out all gradients
    fn zero_grad(&mut self) {
        for group in self.param_groups() {
            for param in &group.params {
                param.zero_grad();
            }
        }
    }

    /// Learning rate of the first group
    fn lr(&self) -> f32 {
        self.param_groups().first().map_or(0.0, |g| g.lr)
    }

    /// Set every group's learning rate
    fn set_lr(&mut self, lr: f32) {
        for group in self.param_groups_mut() {
            group.lr = lr;
        }
    }
}

/// Optimizer shared between the training loop, schedulers and the pruning engine
pub type SharedOptimizer = Rc<RefCell<dyn Optimizer>>;

/// Wrap an optimizer for shared single-threaded ownership
pub fn shared_optimizer<O: Optimizer + 'static>(optimizer: O) -> SharedOptimizer {
    Rc::new(RefCell::new(optimizer))
}
