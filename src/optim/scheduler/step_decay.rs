//! Step decay learning rate scheduler

use super::{base_lrs, LRScheduler, SchedulerKind};
use crate::optim::SharedOptimizer;

/// Step Decay Learning Rate Scheduler
///
/// Multiplies each group's base rate by gamma every step_size epochs.
///
/// Formula: lr_t = lr_base * gamma^(floor(epoch / step_size))
pub struct StepDecayLR {
    optimizer: SharedOptimizer,
    base_lrs: Vec<f32>,
    gamma: f32,
    step_size: usize,
    current_epoch: usize,
}

impl StepDecayLR {
    /// Create a new step decay scheduler
    ///
    /// # Arguments
    /// * `optimizer` - Optimizer whose current rates become the base rates
    /// * `step_size` - Decay LR every step_size epochs
    /// * `gamma` - Multiplicative factor (e.g., 0.1 for 10x reduction)
    pub fn new(optimizer: SharedOptimizer, step_size: usize, gamma: f32) -> Self {
        let base_lrs = base_lrs(&optimizer);
        Self {
            optimizer,
            base_lrs,
            gamma,
            step_size,
            current_epoch: 0,
        }
    }

    fn decay(&self) -> f32 {
        if self.step_size == 0 {
            return 1.0;
        }
        let num_decays = self.current_epoch / self.step_size;
        self.gamma.powi(num_decays as i32)
    }
}

impl LRScheduler for StepDecayLR {
    fn kind(&self) -> SchedulerKind {
        SchedulerKind::ClosedForm
    }

    fn optimizer(&self) -> SharedOptimizer {
        self.optimizer.clone()
    }

    fn next_lrs(&mut self, _current: &[f32]) -> Vec<f32> {
        self.current_epoch += 1;
        let decay = self.decay();
        self.base_lrs.iter().map(|&base| base * decay).collect()
    }
}
