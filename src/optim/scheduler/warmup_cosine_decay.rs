//! Warmup + cosine decay learning rate scheduler

use super::{base_lrs, LRScheduler, SchedulerKind};
use crate::optim::SharedOptimizer;
use std::f32::consts::PI;

/// Warmup + Cosine Decay Learning Rate Scheduler
///
/// Combines linear warmup with cosine annealing decay, per group.
/// - Phase 1 (warmup): Linear increase from 0 to the base rate
/// - Phase 2 (decay): Cosine decay from the base rate to lr_min
pub struct WarmupCosineDecayLR {
    optimizer: SharedOptimizer,
    base_lrs: Vec<f32>,
    lr_min: f32,
    warmup_steps: usize,
    total_steps: usize,
    current_step: usize,
}

impl WarmupCosineDecayLR {
    /// Create a new warmup + cosine decay scheduler
    ///
    /// # Arguments
    /// * `optimizer` - Optimizer whose current rates become the maxima
    /// * `lr_min` - Minimum learning rate (at end)
    /// * `warmup_steps` - Number of warmup steps
    /// * `total_steps` - Total training steps (including warmup)
    pub fn new(
        optimizer: SharedOptimizer,
        lr_min: f32,
        warmup_steps: usize,
        total_steps: usize,
    ) -> Self {
        let base_lrs = base_lrs(&optimizer);
        Self {
            optimizer,
            base_lrs,
            lr_min,
            warmup_steps,
            total_steps,
            current_step: 0,
        }
    }

    fn lr_at(&self, lr_max: f32) -> f32 {
        if self.current_step < self.warmup_steps {
            let progress = self.current_step as f32 / self.warmup_steps as f32;
            return lr_max * progress;
        }

        let decay_steps = self.total_steps.saturating_sub(self.warmup_steps);
        if decay_steps == 0 {
            return self.lr_min;
        }

        let decay_step = self.current_step - self.warmup_steps;
        if decay_step >= decay_steps {
            return self.lr_min;
        }

        let progress = decay_step as f32 / decay_steps as f32;
        let cosine_decay = 0.5 * (1.0 + (PI * progress).cos());
        self.lr_min + (lr_max - self.lr_min) * cosine_decay
    }
}

impl LRScheduler for WarmupCosineDecayLR {
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
