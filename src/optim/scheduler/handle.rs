//! Swappable scheduler handle

use super::{LRScheduler, ScaledScheduler, SchedulerKind, SharedScheduler};
use crate::optim::SharedOptimizer;
use std::cell::RefCell;
use std::rc::Rc;

/// Cloneable handle the training loop steps
///
/// All clones share the same active scheduler, so a decorator installed
/// through one clone is what every other clone steps next.
///
/// # Example
///
/// ```
/// use podar::optim::{shared_optimizer, LambdaLR, SchedulerHandle, SGD};
/// use podar::Tensor;
///
/// let param = Tensor::from_vec(vec![1.0], true);
/// let optimizer = shared_optimizer(SGD::with_params(vec![param], 1.0, 0.0));
/// let handle = SchedulerHandle::new(LambdaLR::new(optimizer.clone(), |_| 0.5));
///
/// handle.intercept(vec![2.0]);
/// handle.step();
/// assert_eq!(optimizer.borrow().lr(), 1.0);
///
/// handle.restore();
/// handle.step();
/// assert_eq!(optimizer.borrow().lr(), 0.5);
/// ```
#[derive(Clone)]
pub struct SchedulerHandle {
    original: SharedScheduler,
    active: Rc<RefCell<SharedScheduler>>,
}

impl SchedulerHandle {
    /// Take ownership of a scheduler
    pub fn new<S: LRScheduler + 'static>(scheduler: S) -> Self {
        Self::from_shared(Rc::new(RefCell::new(scheduler)))
    }

    /// Wrap an already shared scheduler
    pub fn from_shared(scheduler: SharedScheduler) -> Self {
        Self {
            active: Rc::new(RefCell::new(scheduler.clone())),
            original: scheduler,
        }
    }

    /// Step whichever scheduler is active
    pub fn step(&self) {
        let active = self.active.borrow().clone();
        active.borrow_mut().step();
    }

    /// Kind of the wrapped scheduler
    pub fn kind(&self) -> SchedulerKind {
        self.original.borrow().kind()
    }

    /// Optimizer the wrapped scheduler writes
    pub fn optimizer(&self) -> SharedOptimizer {
        self.original.borrow().optimizer()
    }

    /// Route future steps through a [`ScaledScheduler`] with `factors`
    ///
    /// Replaces any earlier interception; the original is always the one
    /// decorated, so factors never compound.
    pub fn intercept(&self, factors: Vec<f32>) {
        let scaled: SharedScheduler =
            Rc::new(RefCell::new(ScaledScheduler::new(self.original.clone(), factors)));
        *self.active.borrow_mut() = scaled;
    }

    /// Route future steps back to the original scheduler
    pub fn restore(&self) {
        *self.active.borrow_mut() = self.original.clone();
    }

    /// Whether a decorator is installed
    pub fn is_intercepted(&self) -> bool {
        !Rc::ptr_eq(&self.original, &*self.active.borrow())
    }
}

impl std::fmt::Debug for SchedulerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulerHandle")
            .field("kind", &self.kind())
            .field("intercepted", &self.is_intercepted())
            .finish()
    }
}
