//! Per-group scaling decorator for schedulers

use super::{LRScheduler, SchedulerKind, SharedScheduler};
use crate::optim::SharedOptimizer;

/// Wraps a scheduler and multiplies each group's output by a fixed factor
///
/// The wrapped scheduler keeps its own state and advances normally; only the
/// rates written to the optimizer are scaled. Groups beyond `factors` are
/// left unscaled.
pub struct ScaledScheduler {
    inner: SharedScheduler,
    factors: Vec<f32>,
}

impl ScaledScheduler {
    /// Decorate `inner` with per-group `factors`
    pub fn new(inner: SharedScheduler, factors: Vec<f32>) -> Self {
        Self { inner, factors }
    }

    /// Factors applied to the wrapped scheduler's output
    pub fn factors(&self) -> &[f32] {
        &self.factors
    }
}

impl LRScheduler for ScaledScheduler {
    fn kind(&self) -> SchedulerKind {
        self.inner.borrow().kind()
    }

    fn optimizer(&self) -> SharedOptimizer {
        self.inner.borrow().optimizer()
    }

    fn next_lrs(&mut self, current: &[f32]) -> Vec<f32> {
        let lrs = self.inner.borrow_mut().next_lrs(current);
        lrs.into_iter()
            .enumerate()
            .map(|(i, lr)| lr * self.factors.get(i).copied().unwrap_or(1.0))
            .collect()
    }
}
