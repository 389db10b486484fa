//! Multiplicative learning rate scheduler

use super::{LRScheduler, SchedulerKind};
use crate::optim::SharedOptimizer;

/// Multiplies every group's live rate by a user function of the step count
///
/// Formula: lr_t = lr_{t-1} * lambda(t)
pub struct MultiplicativeLR {
    optimizer: SharedOptimizer,
    lambda: Box<dyn Fn(usize) -> f32>,
    current_step: usize,
}

impl MultiplicativeLR {
    /// Create a new multiplicative scheduler
    pub fn new(optimizer: SharedOptimizer, lambda: impl Fn(usize) -> f32 + 'static) -> Self {
        Self {
            optimizer,
            lambda: Box::new(lambda),
            current_step: 0,
        }
    }
}

impl LRScheduler for MultiplicativeLR {
    fn kind(&self) -> SchedulerKind {
        SchedulerKind::Chainable
    }

    fn optimizer(&self) -> SharedOptimizer {
        self.optimizer.clone()
    }

    fn next_lrs(&mut self, current: &[f32]) -> Vec<f32> {
        self.current_step += 1;
        let factor = (self.lambda)(self.current_step);
        current.iter().map(|&lr| lr * factor).collect()
    }
}
