//! Optimizers and learning rate schedulers
//!
//! Optimizers expose their learning rates through [`ParamGroup`]s so that
//! schedulers and the pruning engine can rewrite them between steps.

mod optimizer;
mod scheduler;
mod sgd;

pub use optimizer::{shared_optimizer, Optimizer, ParamGroup, SharedOptimizer};
pub use scheduler::{
    CosineAnnealingLR, ExponentialLR, LRScheduler, LambdaLR, LinearWarmupLR, MultiplicativeLR,
    ScaledScheduler, SchedulerHandle, SchedulerKind, SharedScheduler, StepDecayLR,
    WarmupCosineDecayLR,
};
pub use sgd::SGD;
