//! Learning-rate coordination across sparsity changes
//!
//! Each parameter group carries a factor relative to its nominal learning
//! rate. When sparsity changes, chainable schedulers (and optimizers without
//! a scheduler) have their live group rates multiplied by `new / old`;
//! closed-form schedulers, which ignore the live rate, are routed through a
//! [`ScaledScheduler`](crate::optim::ScaledScheduler) carrying the absolute
//! factors from their next step on.

use super::mask::MaskSet;
use crate::nn::ParameterIndex;
use crate::optim::{SchedulerHandle, SchedulerKind, SharedOptimizer};
use crate::{Error, Result};
use tracing::{debug, info};

/// Scaling switches and limits
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LrScaling {
    /// One factor for all groups from overall sparsity
    pub scale_lr: bool,
    /// One factor per group from that parameter's mask density
    pub scale_lr_by_param: bool,
    /// Upper bound on any factor
    pub max_lr_scaling: f32,
}

impl LrScaling {
    /// `min(max_lr_scaling, 1 / (1 - sparsity_ratio))`
    pub fn scaling_fn(&self, sparsity_ratio: f32) -> f32 {
        self.max_lr_scaling.min(1.0 / (1.0 - sparsity_ratio))
    }

    fn enabled(&self) -> bool {
        self.scale_lr || self.scale_lr_by_param
    }
}

/// Owns the learning-rate factors of every optimizer parameter group
pub struct LrCoordinator {
    scaling: LrScaling,
    optimizers: Vec<SharedOptimizer>,
    schedulers: Vec<SchedulerHandle>,
    nominal_lrs: Vec<Vec<f32>>,
    factors: Vec<Vec<f32>>,
    tracked_groups: Vec<Option<usize>>,
}

impl LrCoordinator {
    /// Coordinate `optimizers`, with `schedulers[i]` driving `optimizers[i]`.
    ///
    /// `optim_lrs` gives one nominal rate per optimizer; without it the
    /// current group rates are taken as nominal. With `track_all_params_lr`
    /// unset, the first group of each optimizer still at its nominal rate is
    /// recorded for reporting.
    ///
    /// # Errors
    ///
    /// `ConfigError` if there are more schedulers than optimizers or
    /// `optim_lrs` has the wrong length.
    pub fn new(
        scaling: LrScaling,
        optimizers: Vec<SharedOptimizer>,
        schedulers: Vec<SchedulerHandle>,
        optim_lrs: Option<&[f32]>,
        track_all_params_lr: bool,
    ) -> Result<Self> {
        if schedulers.len() > optimizers.len() {
            return Err(Error::ConfigError(format!(
                "{} schedulers given for {} optimizers",
                schedulers.len(),
                optimizers.len()
            )));
        }
        if let Some(lrs) = optim_lrs {
            if lrs.len() != optimizers.len() {
                return Err(Error::ConfigError(format!(
                    "optim_lrs has {} entries for {} optimizers",
                    lrs.len(),
                    optimizers.len()
                )));
            }
        }

        let current: Vec<Vec<f32>> = optimizers.iter().map(group_lrs).collect();
        let nominal_lrs: Vec<Vec<f32>> = match optim_lrs {
            Some(lrs) => current
                .iter()
                .zip(lrs)
                .map(|(groups, &lr)| vec![lr; groups.len()])
                .collect(),
            None => current.clone(),
        };
        let tracked_groups = current
            .iter()
            .zip(&nominal_lrs)
            .map(|(groups, nominal)| {
                if track_all_params_lr {
                    return None;
                }
                let optimizer_lr = nominal.first().copied()?;
                groups.iter().position(|&lr| lr == optimizer_lr)
            })
            .collect();
        let factors = current.iter().map(|groups| vec![1.0; groups.len()]).collect();

        Ok(Self {
            scaling,
            optimizers,
            schedulers,
            nominal_lrs,
            factors,
            tracked_groups,
        })
    }

    /// Current factor of every group, per optimizer
    pub fn factors(&self) -> &[Vec<f32>] {
        &self.factors
    }

    /// Nominal rate of every group, per optimizer
    pub fn nominal_lrs(&self) -> &[Vec<f32>] {
        &self.nominal_lrs
    }

    /// Per optimizer, the group whose rate reflects the overall schedule
    ///
    /// `None` when every group should be reported.
    pub fn tracked_groups(&self) -> &[Option<usize>] {
        &self.tracked_groups
    }

    /// Rebind to restored optimizers and schedulers, keeping the factors.
    ///
    /// # Errors
    ///
    /// `ConfigError` if there are more schedulers than optimizers, or if the
    /// optimizers or their parameter groups differ in number from the ones
    /// this coordinator was built with. Nothing is rebound on error.
    pub fn rebind(
        &mut self,
        optimizers: Vec<SharedOptimizer>,
        schedulers: Vec<SchedulerHandle>,
    ) -> Result<()> {
        if schedulers.len() > optimizers.len() {
            return Err(Error::ConfigError(format!(
                "{} schedulers given for {} optimizers",
                schedulers.len(),
                optimizers.len()
            )));
        }
        if optimizers.len() != self.factors.len() {
            return Err(Error::ConfigError(format!(
                "{} optimizers given to resume a run set up with {}",
                optimizers.len(),
                self.factors.len()
            )));
        }
        for (i, (optimizer, factors)) in optimizers.iter().zip(&self.factors).enumerate() {
            let groups = optimizer.borrow().param_groups().len();
            if groups != factors.len() {
                return Err(Error::ConfigError(format!(
                    "optimizer {i} has {groups} parameter groups, expected {}",
                    factors.len()
                )));
            }
        }
        self.optimizers = optimizers;
        self.schedulers = schedulers;
        Ok(())
    }

    /// Target factors for a sparsity level and its masks
    ///
    /// Uniform and per-parameter factors multiply, capped at
    /// `max_lr_scaling`. A group's per-parameter factor comes from the mask
    /// of the parameter named by the group; unnamed, unmasked or fully
    /// pruned parameters get 1.
    pub fn factors_for(&self, sparsity: f32, masks: &MaskSet, index: &ParameterIndex) -> Vec<Vec<f32>> {
        let uniform = if self.scaling.scale_lr {
            self.scaling.scaling_fn(sparsity / 100.0)
        } else {
            1.0
        };

        self.optimizers
            .iter()
            .map(|optimizer| {
                optimizer
                    .borrow()
                    .param_groups()
                    .iter()
                    .map(|group| {
                        let per_param = if self.scaling.scale_lr_by_param {
                            index
                                .to_local_name(&group.name)
                                .and_then(|local| masks.get(local))
                                .map(|mask| mask.density())
                                .filter(|&density| density > 0.0)
                                .map_or(1.0, |density| self.scaling.scaling_fn(1.0 - density))
                        } else {
                            1.0
                        };
                        self.scaling.max_lr_scaling.min(uniform * per_param)
                    })
                    .collect()
            })
            .collect()
    }

    /// Move every group to the factors of a new sparsity level
    pub fn update(&mut self, sparsity: f32, masks: &MaskSet, index: &ParameterIndex) {
        if !self.scaling.enabled() {
            return;
        }
        info!(sparsity, "Setting new learning rates");
        let new_factors = self.factors_for(sparsity, masks, index);

        for (i, (old, new)) in self.factors.iter().zip(&new_factors).enumerate() {
            match self.schedulers.get(i) {
                Some(scheduler) if scheduler.kind() == SchedulerKind::ClosedForm => {
                    debug!(optimizer = i, "Intercepting closed-form scheduler");
                    scheduler.intercept(new.clone());
                }
                _ => {
                    let mut optimizer = self.optimizers[i].borrow_mut();
                    for (group, (old, new)) in optimizer.param_groups_mut().iter_mut().zip(old.iter().zip(new)) {
                        group.lr *= new / old;
                        debug!(group = %group.name, lr = group.lr, "Scaled learning rate");
                    }
                }
            }
        }
        self.factors = new_factors;
    }

    /// Adopt the factors of a sparsity level without touching live rates
    ///
    /// Used after a checkpoint restore: the optimizer rates already carry
    /// the scaling, but the factors and any scheduler interception are
    /// runtime state that must be rebuilt.
    pub fn resume(&mut self, sparsity: f32, masks: Option<&MaskSet>, index: &ParameterIndex) {
        if !self.scaling.enabled() {
            return;
        }
        self.factors = match masks {
            Some(masks) if sparsity > 0.0 => self.factors_for(sparsity, masks, index),
            _ => self.factors.iter().map(|f| vec![1.0; f.len()]).collect(),
        };
        for (scheduler, factors) in self.schedulers.iter().zip(&self.factors) {
            if scheduler.kind() != SchedulerKind::ClosedForm {
                continue;
            }
            if factors.iter().all(|&f| f == 1.0) {
                scheduler.restore();
            } else {
                scheduler.intercept(factors.clone());
            }
        }
    }

    /// Undo all scaling when sparsity returns to zero
    ///
    /// Closed-form schedulers get their original step back, chainable ones
    /// have the last factor divided out, and optimizers without a scheduler
    /// return to their nominal rates.
    pub fn reset(&mut self) {
        if !self.scaling.enabled() {
            return;
        }
        info!("Resetting learning rates");
        for (i, factors) in self.factors.iter_mut().enumerate() {
            let mut optimizer = self.optimizers[i].borrow_mut();
            let groups = optimizer.param_groups_mut();
            match self.schedulers.get(i) {
                Some(scheduler) if scheduler.kind() == SchedulerKind::ClosedForm => {
                    scheduler.restore();
                }
                Some(_) => {
                    for (group, factor) in groups.iter_mut().zip(factors.iter()) {
                        group.lr /= factor;
                    }
                }
                None => {
                    for (group, &nominal) in groups.iter_mut().zip(&self.nominal_lrs[i]) {
                        group.lr = nominal;
                    }
                }
            }
            factors.fill(1.0);
        }
    }
}

fn group_lrs(optimizer: &SharedOptimizer) -> Vec<f32> {
    optimizer.borrow().param_groups().iter().map(|g| g.lr).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::{Linear, Module, Sequential};
    use crate::optim::{shared_optimizer, ExponentialLR, LambdaLR, Optimizer, SGD};
    use crate::prune::ParameterMask;
    use approx::assert_abs_diff_eq;

    fn scaling(scale_lr: bool, scale_lr_by_param: bool) -> LrScaling {
        LrScaling {
            scale_lr,
            scale_lr_by_param,
            max_lr_scaling: 4.0,
        }
    }

    fn setup() -> (Sequential, ParameterIndex, SharedOptimizer, MaskSet) {
        let model = Sequential::new().add_named("body", Linear::with_seed(2, 2, Some(0)));
        let index = ParameterIndex::build(&model, "body").unwrap();
        let optimizer = shared_optimizer(SGD::per_parameter(model.named_parameters(), 1.0, 0.0));
        let mut masks = MaskSet::new();
        masks.insert(
            "weight".to_string(),
            ParameterMask::new(vec![2, 2], vec![true, false, false, false]).unwrap(),
        );
        (model, index, optimizer, masks)
    }

    fn lrs(optimizer: &SharedOptimizer) -> Vec<f32> {
        group_lrs(optimizer)
    }

    #[test]
    fn test_scaling_fn_is_capped() {
        let s = scaling(true, false);
        assert_abs_diff_eq!(s.scaling_fn(0.5), 2.0, epsilon = 1e-6);
        assert_abs_diff_eq!(s.scaling_fn(0.9), 4.0, epsilon = 1e-6);
        assert_abs_diff_eq!(s.scaling_fn(1.0), 4.0, epsilon = 1e-6);
    }

    #[test]
    fn test_per_parameter_factors_follow_group_names() {
        let (_model, index, optimizer, masks) = setup();
        let coordinator =
            LrCoordinator::new(scaling(false, true), vec![optimizer], vec![], None, false).unwrap();

        // groups are "body.weight", "body.bias" in registration order
        let factors = coordinator.factors_for(50.0, &masks, &index);
        assert_eq!(factors, vec![vec![4.0, 1.0]]);
    }

    #[test]
    fn test_uniform_and_per_parameter_compose_under_the_cap() {
        let (_model, index, optimizer, masks) = setup();
        let coordinator =
            LrCoordinator::new(scaling(true, true), vec![optimizer], vec![], None, false).unwrap();
        let factors = coordinator.factors_for(50.0, &masks, &index);
        // masked weight: 2 * 4 capped at 4; unmasked bias: uniform only
        assert_eq!(factors, vec![vec![4.0, 2.0]]);
    }

    #[test]
    fn test_update_then_reset_without_schedulers_restores_nominal() {
        let (_model, index, optimizer, masks) = setup();
        let mut coordinator = LrCoordinator::new(
            scaling(true, true),
            vec![optimizer.clone()],
            vec![],
            None,
            false,
        )
        .unwrap();

        coordinator.update(50.0, &masks, &index);
        assert_eq!(lrs(&optimizer), vec![4.0, 2.0]);

        coordinator.update(25.0, &MaskSet::new(), &index);
        assert!(lrs(&optimizer).iter().all(|&lr| (lr - 4.0 / 3.0).abs() < 1e-5));

        coordinator.reset();
        assert_eq!(lrs(&optimizer), vec![1.0, 1.0]);
        assert_eq!(coordinator.factors(), &[vec![1.0, 1.0]]);
    }

    #[test]
    fn test_chainable_scheduler_gets_ratio_and_reset_divides() {
        let (_model, index, optimizer, _) = setup();
        let scheduler = SchedulerHandle::new(ExponentialLR::new(optimizer.clone(), 0.5));
        let mut coordinator = LrCoordinator::new(
            scaling(true, false),
            vec![optimizer.clone()],
            vec![scheduler.clone()],
            None,
            false,
        )
        .unwrap();

        coordinator.update(50.0, &MaskSet::new(), &index);
        assert_eq!(lrs(&optimizer), vec![2.0, 2.0]);
        scheduler.step();
        assert_eq!(lrs(&optimizer), vec![1.0, 1.0]);

        coordinator.reset();
        assert_eq!(lrs(&optimizer), vec![0.5, 0.5]);
        assert!(!scheduler.is_intercepted());
    }

    #[test]
    fn test_closed_form_scheduler_is_intercepted_with_absolute_factors() {
        let (_model, index, optimizer, _) = setup();
        let scheduler = SchedulerHandle::new(LambdaLR::new(optimizer.clone(), |_| 0.5));
        let mut coordinator = LrCoordinator::new(
            scaling(true, false),
            vec![optimizer.clone()],
            vec![scheduler.clone()],
            None,
            false,
        )
        .unwrap();

        coordinator.update(50.0, &MaskSet::new(), &index);
        // live rates are untouched until the scheduler steps
        assert_eq!(lrs(&optimizer), vec![1.0, 1.0]);
        scheduler.step();
        assert_eq!(lrs(&optimizer), vec![1.0, 1.0]);

        coordinator.update(75.0, &MaskSet::new(), &index);
        scheduler.step();
        assert_eq!(lrs(&optimizer), vec![2.0, 2.0]);

        coordinator.reset();
        scheduler.step();
        assert_eq!(lrs(&optimizer), vec![0.5, 0.5]);
    }

    #[test]
    fn test_disabled_scaling_leaves_rates_alone() {
        let (_model, index, optimizer, masks) = setup();
        let mut coordinator = LrCoordinator::new(
            scaling(false, false),
            vec![optimizer.clone()],
            vec![],
            None,
            false,
        )
        .unwrap();
        coordinator.update(90.0, &masks, &index);
        assert_eq!(lrs(&optimizer), vec![1.0, 1.0]);
    }

    #[test]
    fn test_configured_nominal_rates_and_tracked_groups() {
        let a = crate::Tensor::from_vec(vec![1.0], true);
        let b = crate::Tensor::from_vec(vec![1.0], true);
        let optimizer = shared_optimizer(SGD::per_parameter(
            vec![("a".to_string(), a), ("b".to_string(), b)],
            0.1,
            0.0,
        ));
        optimizer.borrow_mut().param_groups_mut()[0].lr = 0.3;

        let mut coordinator = LrCoordinator::new(
            scaling(true, false),
            vec![optimizer.clone()],
            vec![],
            Some(&[0.1][..]),
            false,
        )
        .unwrap();
        assert_eq!(coordinator.tracked_groups(), &[Some(1)]);
        assert_eq!(coordinator.nominal_lrs(), &[vec![0.1, 0.1]]);

        coordinator.reset();
        assert_eq!(optimizer.borrow().lr(), 0.1);

        let all = LrCoordinator::new(scaling(true, false), vec![optimizer], vec![], None, true).unwrap();
        assert_eq!(all.tracked_groups(), &[None]);
    }

    #[test]
    fn test_resume_rebuilds_interception_but_not_rates() {
        let (_model, index, optimizer, masks) = setup();
        optimizer.borrow_mut().set_lr(0.7);
        let scheduler = SchedulerHandle::new(LambdaLR::new(optimizer.clone(), |_| 1.0));
        let mut coordinator = LrCoordinator::new(
            scaling(false, true),
            vec![optimizer.clone()],
            vec![scheduler.clone()],
            None,
            false,
        )
        .unwrap();

        coordinator.resume(50.0, Some(&masks), &index);
        assert_eq!(lrs(&optimizer), vec![0.7, 0.7]);
        assert_eq!(coordinator.factors(), &[vec![4.0, 1.0]]);
        assert!(scheduler.is_intercepted());

        coordinator.resume(0.0, None, &index);
        assert!(!scheduler.is_intercepted());
    }

    #[test]
    fn test_more_schedulers_than_optimizers_is_rejected() {
        let (_model, _index, optimizer, _) = setup();
        let scheduler = SchedulerHandle::new(ExponentialLR::new(optimizer, 0.5));
        let result = LrCoordinator::new(scaling(true, false), vec![], vec![scheduler], None, false);
        assert!(matches!(result, Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_rebind_requires_matching_optimizers() {
        let (model, index, optimizer, masks) = setup();
        let mut coordinator =
            LrCoordinator::new(scaling(true, false), vec![optimizer.clone()], vec![], None, false)
                .unwrap();

        let result = coordinator.rebind(vec![optimizer.clone(), optimizer.clone()], vec![]);
        assert!(matches!(result, Err(Error::ConfigError(_))));

        let params = model.named_parameters().into_iter().map(|(_, p)| p).collect();
        let single_group = shared_optimizer(SGD::with_params(params, 1.0, 0.0));
        let result = coordinator.rebind(vec![single_group], vec![]);
        assert!(matches!(result, Err(Error::ConfigError(_))));

        // The failed attempts left the original binding usable.
        coordinator.update(50.0, &masks, &index);
        coordinator.reset();
        assert_eq!(lrs(&optimizer), vec![1.0, 1.0]);

        let restored = shared_optimizer(SGD::per_parameter(model.named_parameters(), 1.0, 0.0));
        coordinator.rebind(vec![restored.clone()], vec![]).unwrap();
        coordinator.update(50.0, &masks, &index);
        assert_eq!(lrs(&restored), vec![2.0, 2.0]);
        coordinator.reset();
        assert_eq!(lrs(&restored), vec![1.0, 1.0]);
    }
}
