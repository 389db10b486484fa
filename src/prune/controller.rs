//! Epoch-driven pruning controller

use super::config::SniperConfig;
use super::hook::MaskHook;
use super::lr::LrCoordinator;
use super::mask::{derive_masks, retain_prunable, MaskSet};
use super::report::SparsityReport;
use super::restore::restore_initial_values;
use super::sensitivity::{GradientSensitivity, SensitivityMap};
use crate::io::{load_masks, load_tensors, save_masks, save_tensors, SnipPaths};
use crate::nn::{get_submodule, ForwardHooks, HookHandle, Module, ParameterIndex, StateDict};
use crate::optim::{SchedulerHandle, SharedOptimizer};
use crate::{Error, Result, Tensor};
use std::rc::Rc;
use tracing::info;

/// Scheduled SNIP pruning of one submodule during training.
///
/// [`Sniper::setup`] prepares initial values, sensitivities and masks for
/// every scheduled sparsity (reusing whatever is already on disk) and binds
/// the starting sparsity. The training loop then calls [`Sniper::step`] once
/// per epoch.
///
/// # Example
///
/// ```
/// use podar::autograd::{mse_loss, Tensor};
/// use podar::nn::{Linear, Module};
/// use podar::optim::{shared_optimizer, SGD};
/// use podar::prune::{Sniper, SniperConfig, SparsitySchedule};
///
/// let dir = tempfile::tempdir().unwrap();
/// let builder = || Linear::with_seed(4, 2, Some(0));
/// let model = builder();
/// let optimizer = shared_optimizer(SGD::per_parameter(model.named_parameters(), 0.1, 0.0));
/// let batches = vec![(vec![1.0, 0.5, -0.5, 2.0], vec![1.0, 0.0])];
///
/// let config = SniperConfig::new(dir.path())
///     .with_schedule(SparsitySchedule::new([(0, 0.0), (1, 50.0)]).unwrap())
///     .with_exclude_params(Vec::<String>::new());
/// let mut sniper = Sniper::setup(
///     config,
///     &model,
///     &builder,
///     batches,
///     |m: &Linear, (x, y): &(Vec<f32>, Vec<f32>)| {
///         let pred = m.call(&Tensor::from_vec(x.clone(), false));
///         Ok(mse_loss(&pred, &Tensor::from_vec(y.clone(), false)))
///     },
///     vec![optimizer],
///     vec![],
/// )
/// .unwrap();
///
/// sniper.step().unwrap();
/// assert_eq!(sniper.current_sparsity(), 50.0);
/// model.call(&Tensor::from_vec(vec![0.0; 4], false));
/// assert!(sniper.report().total_nonzero() <= 5);
/// ```
pub struct Sniper {
    config: SniperConfig,
    paths: SnipPaths,
    epoch: usize,
    current_sparsity: f32,
    current_masks: Option<Rc<MaskSet>>,
    index: ParameterIndex,
    module_hooks: ForwardHooks,
    forward_hook: Option<HookHandle>,
    lr: LrCoordinator,
}

impl Sniper {
    /// Prepare a pruning run.
    ///
    /// `model` is the live model being trained; `model_builder` must return
    /// fresh, identically structured instances. `batches` is only consumed
    /// when some scheduled sparsity has no cached masks. `schedulers[i]`
    /// drives `optimizers[i]`.
    ///
    /// # Errors
    ///
    /// `ConfigError` for an invalid configuration or a nonzero starting
    /// sparsity without optimizers, both before any I/O. Lookup, shape, I/O
    /// and codec failures propagate.
    pub fn setup<M, B, I, F>(
        config: SniperConfig,
        model: &dyn Module,
        model_builder: &dyn Fn() -> M,
        batches: I,
        loss_fn: F,
        optimizers: Vec<SharedOptimizer>,
        schedulers: Vec<SchedulerHandle>,
    ) -> Result<Self>
    where
        M: Module,
        I: IntoIterator<Item = B>,
        F: FnMut(&M, &B) -> Result<Tensor>,
    {
        config.validate()?;
        let start_sparsity = config.schedule().start_sparsity();
        if start_sparsity > 0.0 && optimizers.is_empty() {
            return Err(Error::ConfigError(
                "a nonzero starting sparsity requires at least one optimizer".to_string(),
            ));
        }
        let lr = LrCoordinator::new(
            config.lr_scaling(),
            optimizers,
            schedulers,
            config.optim_lrs(),
            config.track_all_params_lr(),
        )?;

        let scope = config.snip_module_name();
        let module_hooks = get_submodule(model, scope)?.hooks().clone();
        let index = ParameterIndex::build(model, scope)?;

        let paths = SnipPaths::new(config.sniper_dir());
        std::fs::create_dir_all(paths.dir())?;

        let init_values = Self::initial_values(&config, &paths, model)?;

        let missing: Vec<f32> = config
            .schedule()
            .sparsity_levels()
            .into_iter()
            .filter(|&s| !paths.masks(s, config.max_param_sparsity()).exists())
            .collect();
        if !missing.is_empty() {
            let total_grads = if paths.total_grads().exists() {
                info!(path = %paths.total_grads().display(), "Loading gradients");
                load_tensors(paths.total_grads())?
            } else {
                info!("Computing gradients...");
                let total_grads: SensitivityMap = GradientSensitivity::new(model_builder, &init_values)
                    .with_scope(scope)
                    .with_exclude_params(config.exclude_params())
                    .with_precision(config.train_precision())
                    .with_accumulation(config.accumulation())
                    .compute(batches, loss_fn)?;
                save_tensors(paths.total_grads(), &total_grads)?;
                info!(path = %paths.total_grads().display(), "Saved gradients");
                total_grads
            };

            for sparsity in missing {
                let masks = derive_masks(&total_grads, sparsity, config.max_param_sparsity());
                let path = paths.masks(sparsity, config.max_param_sparsity());
                save_masks(&path, &masks)?;
                info!(sparsity, path = %path.display(), "Saved masks at sparsity {sparsity}");
            }
        }
        info!("All required sparsities present");

        let mut sniper = Self {
            paths,
            epoch: 0,
            current_sparsity: start_sparsity,
            current_masks: None,
            index,
            module_hooks,
            forward_hook: None,
            lr,
            config,
        };

        if sniper.config.resume_epoch() > 0 {
            sniper.resume(sniper.config.resume_epoch())?;
        } else if start_sparsity > 0.0 {
            info!(sparsity = start_sparsity, "Loading sparsity {start_sparsity}...");
            let masks = sniper.load_masks(start_sparsity)?;
            sniper.lr.update(start_sparsity, &masks, &sniper.index);
            sniper.current_masks = Some(Rc::new(masks));
            if sniper.config.forward_mask() {
                sniper.rebind_forward_hook()?;
            }
        }
        Ok(sniper)
    }

    /// Load the persisted snapshot (and, on a fresh start, write it into the
    /// live model), or snapshot the live model.
    fn initial_values(config: &SniperConfig, paths: &SnipPaths, model: &dyn Module) -> Result<StateDict> {
        let path = paths.init_values();
        if path.exists() {
            info!(path = %path.display(), "Loading initial model state");
            let init_values = load_tensors(&path)?;
            if config.resume_epoch() == 0 {
                model.load_state_dict(&init_values)?;
            }
            Ok(init_values)
        } else {
            info!(path = %path.display(), "Saving initial model state");
            let init_values = model.state_dict();
            save_tensors(&path, &init_values)?;
            Ok(init_values)
        }
    }

    /// Advance one epoch, switching sparsity if the schedule says so.
    pub fn step(&mut self) -> Result<()> {
        self.epoch += 1;
        let Some(sparsity) = self.config.schedule().transition_at(self.epoch) else {
            return Ok(());
        };
        self.current_sparsity = sparsity;

        if sparsity > 0.0 {
            info!(epoch = self.epoch, sparsity, "New sparsity scheduled: {sparsity} -- replacing with new mask");
            let masks = self.load_masks(sparsity)?;
            self.lr.update(sparsity, &masks, &self.index);
            self.current_masks = Some(Rc::new(masks));
        } else {
            info!(epoch = self.epoch, "New sparsity is 0 -- removing mask");
            self.current_masks = None;
            self.lr.reset();
        }

        if self.config.forward_mask() {
            self.rebind_forward_hook()?;
        }
        if self.config.restore_init_values() {
            self.restore_init()?;
        } else {
            self.log_nonzeros();
        }
        Ok(())
    }

    /// Resume at `epoch` with optimizers and schedulers restored from a
    /// checkpoint.
    ///
    /// Masks and the forward hook are rebound for the sparsity in force at
    /// `epoch`; learning rates are taken as restored.
    pub fn resume_from(
        &mut self,
        epoch: usize,
        optimizers: Vec<SharedOptimizer>,
        schedulers: Vec<SchedulerHandle>,
    ) -> Result<()> {
        self.lr.rebind(optimizers, schedulers)?;
        self.resume(epoch)
    }

    fn resume(&mut self, epoch: usize) -> Result<()> {
        info!(epoch, "Resuming from epoch {epoch}");
        self.epoch = epoch;
        let sparsity = self.config.schedule().sparsity_at(epoch);
        self.current_sparsity = sparsity;
        self.current_masks = if sparsity > 0.0 {
            Some(Rc::new(self.load_masks(sparsity)?))
        } else {
            None
        };
        self.lr.resume(sparsity, self.current_masks.as_deref(), &self.index);
        if self.config.forward_mask() {
            self.rebind_forward_hook()?;
        }
        Ok(())
    }

    /// Remove the installed hook, then install one for the current masks.
    fn rebind_forward_hook(&mut self) -> Result<()> {
        if let Some(handle) = self.forward_hook.take() {
            info!("Removing forward hook");
            handle.remove();
        }
        if let Some(masks) = &self.current_masks {
            info!("Adding new forward hook");
            let hook = MaskHook::new(Rc::clone(masks), &self.index)?;
            self.forward_hook = Some(self.module_hooks.register(Rc::new(hook)));
        }
        Ok(())
    }

    fn load_masks(&self, sparsity: f32) -> Result<MaskSet> {
        let path = self.paths.masks(sparsity, self.config.max_param_sparsity());
        let mut masks = load_masks(&path)?;
        retain_prunable(&mut masks, self.config.exclude_params());
        info!(path = %path.display(), "Loaded mask");
        Ok(masks)
    }

    fn restore_init(&self) -> Result<()> {
        let init_values = load_tensors(self.paths.init_values())?;
        restore_initial_values(&self.index, &init_values, self.current_masks.as_deref())?;
        Ok(())
    }

    fn log_nonzeros(&self) {
        let report = self.report();
        info!(
            nonzero = report.total_nonzero(),
            numel = report.total_numel(),
            epoch = self.epoch,
            "Module has {} / {} parameters (sparsity {:.2}%) at epoch {}",
            report.total_nonzero(),
            report.total_numel(),
            report.sparsity(),
            self.epoch
        );
    }

    /// Nonzero counts of the pruned submodule
    pub fn report(&self) -> SparsityReport {
        SparsityReport::from_parameters(self.index.iter().map(|(name, param)| (name, param.clone())))
    }

    /// Epochs stepped so far
    pub fn epoch(&self) -> usize {
        self.epoch
    }

    /// Sparsity (%) in force
    pub fn current_sparsity(&self) -> f32 {
        self.current_sparsity
    }

    /// Masks in force, if any
    pub fn current_masks(&self) -> Option<&MaskSet> {
        self.current_masks.as_deref()
    }

    /// Whether a mask hook is installed on the pruned submodule
    pub fn has_forward_hook(&self) -> bool {
        self.forward_hook.is_some()
    }

    /// Learning-rate factors per optimizer and group
    pub fn lr_factors(&self) -> &[Vec<f32>] {
        self.lr.factors()
    }

    /// Per optimizer, the group to report the learning rate of
    pub fn tracked_groups(&self) -> &[Option<usize>] {
        self.lr.tracked_groups()
    }

    /// File layout of the persistence directory
    pub fn paths(&self) -> &SnipPaths {
        &self.paths
    }

    /// The run configuration
    pub fn config(&self) -> &SniperConfig {
        &self.config
    }
}
