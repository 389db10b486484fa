//! Lambda learning rate scheduler

use super::{base_lrs, LRScheduler, SchedulerKind};
use crate::optim::SharedOptimizer;

/// Base rate times a user function of the step count
///
/// Formula: lr_t = lr_base * lambda(t)
pub struct LambdaLR {
    optimizer: SharedOptimizer,
    base_lrs: Vec<f32>,
    lambda: Box<dyn Fn(usize) -> f32>,
    current_step: usize,
}

impl LambdaLR {
    /// Create a new lambda scheduler
    pub fn new(optimizer: SharedOptimizer, lambda: impl Fn(usize) -> f32 + 'static) -> Self {
        let base_lrs = base_lrs(&optimizer);
        Self {
            optimizer,
            base_lrs,
            lambda: Box::new(lambda),
            current_step: 0,
        }
    }
}

impl LRScheduler for LambdaLR {
    fn kind(&self) -> SchedulerKind {
        SchedulerKind::ClosedForm
    }

    fn optimizer(&self) -> SharedOptimizer {
        self.optimizer.clone()
    }

    fn next_lrs(&mut self, _current: &[f32]) -> Vec<f32> {
        self.current_step += 1;
        let factor = (self.lambda)(self.current_step);
        self.base_lrs.iter().map(|&base| base * factor).collect()
    }
}
