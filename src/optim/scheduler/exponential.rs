//! Exponential decay learning rate scheduler

use super::{LRScheduler, SchedulerKind};
use crate::optim::SharedOptimizer;

/// Multiplies every group's live rate by gamma each step
///
/// Formula: lr_t = lr_{t-1} * gamma
pub struct ExponentialLR {
    optimizer: SharedOptimizer,
    gamma: f32,
}

impl ExponentialLR {
    /// Create a new exponential scheduler
    pub fn new(optimizer: SharedOptimizer, gamma: f32) -> Self {
        Self { optimizer, gamma }
    }
}

impl LRScheduler for ExponentialLR {
    fn kind(&self) -> SchedulerKind {
        SchedulerKind::Chainable
    }

    fn optimizer(&self) -> SharedOptimizer {
        self.optimizer.clone()
    }

    fn next_lrs(&mut self, current: &[f32]) -> Vec<f32> {
        current.iter().map(|&lr| lr * self.gamma).collect()
    }
}
