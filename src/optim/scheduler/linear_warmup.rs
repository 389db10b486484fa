//! Linear warmup learning rate scheduler

use super::{base_lrs, LRScheduler, SchedulerKind};
use crate::optim::SharedOptimizer;

/// Linear Warmup Learning Rate Scheduler
///
/// Linearly increases each group's rate from 0 to its base rate over
/// warmup_steps, then holds it.
///
/// Formula: lr_t = lr_base * min(1, t / warmup_steps)
pub struct LinearWarmupLR {
    optimizer: SharedOptimizer,
    base_lrs: Vec<f32>,
    warmup_steps: usize,
    current_step: usize,
}

impl LinearWarmupLR {
    /// Create a new linear warmup scheduler
    ///
    /// # Arguments
    /// * `optimizer` - Optimizer whose current rates become the targets
    /// * `warmup_steps` - Number of steps for warmup
    pub fn new(optimizer: SharedOptimizer, warmup_steps: usize) -> Self {
        let base_lrs = base_lrs(&optimizer);
        Self {
            optimizer,
            base_lrs,
            warmup_steps,
            current_step: 0,
        }
    }

    fn progress(&self) -> f32 {
        if self.warmup_steps == 0 {
            return 1.0;
        }
        (self.current_step as f32 / self.warmup_steps as f32).min(1.0)
    }
}

impl LRScheduler for LinearWarmupLR {
    fn kind(&self) -> SchedulerKind {
        SchedulerKind::ClosedForm
    }

    fn optimizer(&self) -> SharedOptimizer {
        self.optimizer.clone()
    }

    fn next_lrs(&mut self, _current: &[f32]) -> Vec<f32> {
        self.current_step += 1;
        let progress = self.progress();
        self.base_lrs.iter().map(|&base| base * progress).collect()
    }
}
