//! Learning rate schedulers
//!
//! Provides learning rate scheduling strategies for training. Every scheduler
//! drives one shared optimizer and writes a learning rate per parameter group.
//!
//! Closed-form schedulers recompute each group's rate from its base rate and
//! the step count:
//! - `CosineAnnealingLR` - Smooth cosine decay
//! - `LinearWarmupLR` - Linear warmup from 0 to the base rate
//! - `StepDecayLR` - Step decay by factor every N epochs
//! - `WarmupCosineDecayLR` - Combined warmup + cosine decay
//! - `LambdaLR` - Base rate times a user function of the step
//!
//! Chainable schedulers derive the next rate from the live group rate, so
//! outside edits to that rate carry forward:
//! - `ExponentialLR` - Multiply by a constant every step
//! - `MultiplicativeLR` - Multiply by a user function of the step
//!
//! [`ScaledScheduler`] decorates any scheduler with per-group factors, and
//! [`SchedulerHandle`] lets a decorator be swapped in behind the caller's back.

mod cosine_annealing;
mod exponential;
mod handle;
mod lambda;
mod linear_warmup;
mod multiplicative;
mod scaled;
mod step_decay;
mod warmup_cosine_decay;


pub use cosine_annealing::CosineAnnealingLR;
pub use exponential::ExponentialLR;
pub use handle::SchedulerHandle;
pub use lambda::LambdaLR;
pub use linear_warmup::LinearWarmupLR;
pub use multiplicative::MultiplicativeLR;
pub use scaled::ScaledScheduler;
pub use step_decay::StepDecayLR;
pub use warmup_cosine_decay::WarmupCosineDecayLR;

use super::SharedOptimizer;
use std::cell::RefCell;
use std::rc::Rc;

/// How a scheduler's next learning rate depends on state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerKind {
    /// Next rate is a function of the live group rate
    Chainable,
    /// Next rate is a pure function of the base rate and step count
    ClosedForm,
}

/// Learning rate scheduler trait
pub trait LRScheduler {
    /// Dependency of the next rate on the previous one
    fn kind(&self) -> SchedulerKind;

    /// Optimizer whose groups this scheduler writes
    fn optimizer(&self) -> SharedOptimizer;

    /// Advance one step and return the new per-group rates
    ///
    /// `current` holds the live group rates before the step.
    fn next_lrs(&mut self, current: &[f32]) -> Vec<f32>;

    /// Step the scheduler and write the new rates into the optimizer
    fn step(&mut self) {
        let optimizer = self.optimizer();
        let current: Vec<f32> = optimizer.borrow().param_groups().iter().map(|g| g.lr).collect();
        let lrs = self.next_lrs(&current);
        for (group, lr) in optimizer.borrow_mut().param_groups_mut().iter_mut().zip(lrs) {
            group.lr = lr;
        }
    }
}

/// Scheduler shared between a [`SchedulerHandle`] and its decorators
pub type SharedScheduler = Rc<RefCell<dyn LRScheduler>>;

/// Initial learning rate of every group, captured when a scheduler is built
pub(crate) fn base_lrs(optimizer: &SharedOptimizer) -> Vec<f32> {
    optimizer.borrow().param_groups().iter().map(|g| g.lr).collect()
}
