//! Cosine annealing learning rate scheduler

use super::{base_lrs, LRScheduler, SchedulerKind};
use crate::optim::SharedOptimizer;
use std::f32::consts::PI;

/// Cosine Annealing Learning Rate Scheduler
///
/// Decreases each group's learning rate following a cosine curve from its
/// base rate to lr_min.
///
/// Formula: lr_t = lr_min + 0.5 * (lr_base - lr_min) * (1 + cos(pi * t / T))
///
/// Where:
/// - t is the current step
/// - T is the total number of steps
/// - lr_base is the group's rate when the scheduler was created
pub struct CosineAnnealingLR {
    optimizer: SharedOptimizer,
    base_lrs: Vec<f32>,
    lr_min: f32,
    t_max: usize,
    current_step: usize,
}

impl CosineAnnealingLR {
    /// Create a new cosine annealing scheduler
    ///
    /// # Arguments
    /// * `optimizer` - Optimizer whose current rates become the maxima
    /// * `t_max` - Total number of steps for the schedule
    /// * `lr_min` - Minimum learning rate
    pub fn new(optimizer: SharedOptimizer, t_max: usize, lr_min: f32) -> Self {
        let base_lrs = base_lrs(&optimizer);
        Self {
            optimizer,
            base_lrs,
            lr_min,
            t_max,
            current_step: 0,
        }
    }

    fn lr_at(&self, lr_max: f32) -> f32 {
        if self.current_step >= self.t_max {
            return self.lr_min;
        }

        let progress = self.current_step as f32 / self.t_max as f32;
        let cosine_decay = 0.5 * (1.0 + (PI * progress).cos());
        self.lr_min + (lr_max - self.lr_min) * cosine_decay
    }
}

impl LRScheduler for CosineAnnealingLR {
    fn kind(&self) -> SchedulerKind {
        SchedulerKind::ClosedForm
    }

    fn optimizer(&self) -> SharedOptimizer {
        self.optimizer.clone()
    }

    fn next_lrs(&mut self, _current: &[f32]) -> Vec<f32> {
        self.current_step += 1;
        self.base_lrs.iter().map(|&base| self.lr_at(base)).collect()
    }
}
