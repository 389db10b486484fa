//! Stochastic Gradient Descent optimizer

use super::{Optimizer, ParamGroup};
use crate::Tensor;
use ndarray::Array1;

/// SGD optimizer with optional momentum
pub struct SGD {
    groups: Vec<ParamGroup>,
    momentum: f32,
    velocities: Vec<Vec<Option<Array1<f32>>>>,
}

impl SGD {
    /// Create an optimizer over explicit parameter groups
    pub fn new(groups: Vec<ParamGroup>, momentum: f32) -> Self {
        let velocities = groups.iter().map(|g| vec![None; g.params.len()]).collect();
        Self {
            groups,
            momentum,
            velocities,
        }
    }

    /// Single group named `"default"` holding all `params`
    pub fn with_params(params: Vec<Tensor>, lr: f32, momentum: f32) -> Self {
        Self::new(vec![ParamGroup::new("default", params, lr)], momentum)
    }

    /// One group per named parameter, named after it
    ///
    /// This is the layout per-parameter learning-rate scaling expects.
    pub fn per_parameter(params: Vec<(String, Tensor)>, lr: f32, momentum: f32) -> Self {
        let groups = params
            .into_iter()
            .map(|(name, param)| ParamGroup::new(name, vec![param], lr))
            .collect();
        Self::new(groups, momentum)
    }
}

impl Optimizer for SGD {
    fn param_groups(&self) -> &[ParamGroup] {
        &self.groups
    }

    fn param_groups_mut(&mut self) -> &mut [ParamGroup] {
        &mut self.groups
    }

    fn step(&mut self) {
        for (group, velocities) in self.groups.iter().zip(self.velocities.iter_mut()) {
            let lr = group.lr;
            for (param, velocity) in group.params.iter().zip(velocities.iter_mut()) {
                let Some(grad) = param.grad() else {
                    continue;
                };
                if self.momentum > 0.0 {
                    // v = momentum * v - lr * grad
                    let update = match velocity.take() {
                        Some(v) => v * self.momentum - &grad * lr,
                        None => &grad * (-lr),
                    };
                    *param.data_mut() += &update;
                    *velocity = Some(update);
                } else {
                    // param -= lr * grad
                    param.data_mut().scaled_add(-lr, &grad);
                }
            }
        }
    }
}
