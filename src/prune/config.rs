//! Pruning run configuration.

use super::lr::LrScaling;
use super::schedule::SparsitySchedule;
use super::sensitivity::Accumulation;
use crate::autograd::Precision;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Plain-data options of a pruning run.
///
/// Runtime collaborators (model, builder, batches, loss, optimizers,
/// schedulers) are handed to [`Sniper::setup`](super::Sniper::setup)
/// instead.
///
/// # Example
///
/// ```
/// use podar::prune::{SniperConfig, SparsitySchedule};
///
/// let config = SniperConfig::new("runs/snip")
///     .with_schedule(SparsitySchedule::new([(0, 0.0), (2, 50.0)]).unwrap())
///     .with_snip_module_name("encoder")
///     .with_scale_lr(true)
///     .with_max_lr_scaling(2.0);
/// assert!(config.validate().is_ok());
///
/// let yaml = "sniper_dir: runs/snip\nschedule: {0: 0.0, 5: 90.0}\nmax_param_sparsity: 80.0\n";
/// let config = SniperConfig::from_yaml_str(yaml).unwrap();
/// assert_eq!(config.schedule().sparsity_at(7), 90.0);
/// assert!(config.forward_mask());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SniperConfig {
    /// Directory holding initial values, sensitivities and masks.
    sniper_dir: PathBuf,

    /// Epoch to target sparsity (%).
    schedule: SparsitySchedule,

    /// Dotted path of the submodule to prune; empty for the whole model.
    snip_module_name: String,

    /// Apply masks before every forward pass.
    forward_mask: bool,

    /// Scale all learning rates by overall density.
    scale_lr: bool,

    /// Scale each parameter group's learning rate by its own density.
    scale_lr_by_param: bool,

    /// Upper bound on any learning-rate factor.
    max_lr_scaling: f32,

    /// Upper bound (%) on the sparsity of any single parameter.
    max_param_sparsity: f32,

    /// Parameters whose names contain any of these are never pruned.
    exclude_params: Vec<String>,

    /// Re-seed newly unmasked weights from their initial values.
    restore_init_values: bool,

    /// Precision models are rebuilt in for gradient computation.
    train_precision: Precision,

    /// Nonzero to resume at this epoch instead of starting fresh.
    resume_epoch: usize,

    /// Nominal learning rate per optimizer, used when resetting.
    optim_lrs: Option<Vec<f32>>,

    /// Report every group's learning rate instead of one per optimizer.
    track_all_params_lr: bool,

    /// How per-batch gradients are accumulated.
    accumulation: Accumulation,
}

impl Default for SniperConfig {
    fn default() -> Self {
        Self {
            sniper_dir: PathBuf::from("sniper"),
            schedule: SparsitySchedule::default(),
            snip_module_name: String::new(),
            forward_mask: true,
            scale_lr: false,
            scale_lr_by_param: true,
            max_lr_scaling: 100.0,
            max_param_sparsity: 100.0,
            exclude_params: vec!["embed".to_string(), "norm".to_string()],
            restore_init_values: true,
            train_precision: Precision::Fp32,
            resume_epoch: 0,
            optim_lrs: None,
            track_all_params_lr: false,
            accumulation: Accumulation::SumOfAbs,
        }
    }
}

impl SniperConfig {
    /// Default configuration persisting under `sniper_dir`.
    pub fn new(sniper_dir: impl Into<PathBuf>) -> Self {
        Self {
            sniper_dir: sniper_dir.into(),
            ..Self::default()
        }
    }

    /// Parse a YAML document.
    ///
    /// Omitted keys take their defaults. The result is validated.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| Error::ConfigError(format!("Invalid YAML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| Error::Serialization(format!("YAML serialization failed: {e}")))
    }

    /// Set the persistence directory.
    pub fn with_sniper_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.sniper_dir = dir.into();
        self
    }

    /// Set the sparsity schedule.
    pub fn with_schedule(mut self, schedule: SparsitySchedule) -> Self {
        self.schedule = schedule;
        self
    }

    /// Set the pruned submodule path.
    pub fn with_snip_module_name(mut self, name: impl Into<String>) -> Self {
        self.snip_module_name = name.into();
        self
    }

    /// Enable or disable forward masking.
    pub fn with_forward_mask(mut self, enabled: bool) -> Self {
        self.forward_mask = enabled;
        self
    }

    /// Enable or disable uniform learning-rate scaling.
    pub fn with_scale_lr(mut self, enabled: bool) -> Self {
        self.scale_lr = enabled;
        self
    }

    /// Enable or disable per-parameter learning-rate scaling.
    pub fn with_scale_lr_by_param(mut self, enabled: bool) -> Self {
        self.scale_lr_by_param = enabled;
        self
    }

    /// Set the learning-rate factor cap.
    pub fn with_max_lr_scaling(mut self, max: f32) -> Self {
        self.max_lr_scaling = max;
        self
    }

    /// Set the per-parameter sparsity cap (%).
    pub fn with_max_param_sparsity(mut self, max: f32) -> Self {
        self.max_param_sparsity = max;
        self
    }

    /// Set the exclusion substrings.
    pub fn with_exclude_params<S: Into<String>>(mut self, exclude: impl IntoIterator<Item = S>) -> Self {
        self.exclude_params = exclude.into_iter().map(Into::into).collect();
        self
    }

    /// Enable or disable restoring initial values.
    pub fn with_restore_init_values(mut self, enabled: bool) -> Self {
        self.restore_init_values = enabled;
        self
    }

    /// Set the gradient computation precision.
    pub fn with_train_precision(mut self, precision: Precision) -> Self {
        self.train_precision = precision;
        self
    }

    /// Resume at `epoch` (0 starts fresh).
    pub fn with_resume_epoch(mut self, epoch: usize) -> Self {
        self.resume_epoch = epoch;
        self
    }

    /// Set one nominal learning rate per optimizer.
    pub fn with_optim_lrs(mut self, lrs: Vec<f32>) -> Self {
        self.optim_lrs = Some(lrs);
        self
    }

    /// Report every group's learning rate.
    pub fn with_track_all_params_lr(mut self, enabled: bool) -> Self {
        self.track_all_params_lr = enabled;
        self
    }

    /// Set the gradient accumulation mode.
    pub fn with_accumulation(mut self, accumulation: Accumulation) -> Self {
        self.accumulation = accumulation;
        self
    }

    /// Get the persistence directory.
    pub fn sniper_dir(&self) -> &Path {
        &self.sniper_dir
    }

    /// Get the sparsity schedule.
    pub fn schedule(&self) -> &SparsitySchedule {
        &self.schedule
    }

    /// Get the pruned submodule path.
    pub fn snip_module_name(&self) -> &str {
        &self.snip_module_name
    }

    /// Check if forward masking is enabled.
    pub fn forward_mask(&self) -> bool {
        self.forward_mask
    }

    /// Check if uniform scaling is enabled.
    pub fn scale_lr(&self) -> bool {
        self.scale_lr
    }

    /// Check if per-parameter scaling is enabled.
    pub fn scale_lr_by_param(&self) -> bool {
        self.scale_lr_by_param
    }

    /// Get the learning-rate factor cap.
    pub fn max_lr_scaling(&self) -> f32 {
        self.max_lr_scaling
    }

    /// Get the per-parameter sparsity cap (%).
    pub fn max_param_sparsity(&self) -> f32 {
        self.max_param_sparsity
    }

    /// Get the exclusion substrings.
    pub fn exclude_params(&self) -> &[String] {
        &self.exclude_params
    }

    /// Check if initial values are restored.
    pub fn restore_init_values(&self) -> bool {
        self.restore_init_values
    }

    /// Get the gradient computation precision.
    pub fn train_precision(&self) -> Precision {
        self.train_precision
    }

    /// Get the resume epoch.
    pub fn resume_epoch(&self) -> usize {
        self.resume_epoch
    }

    /// Get the nominal learning rates.
    pub fn optim_lrs(&self) -> Option<&[f32]> {
        self.optim_lrs.as_deref()
    }

    /// Check if every group's learning rate is tracked.
    pub fn track_all_params_lr(&self) -> bool {
        self.track_all_params_lr
    }

    /// Get the gradient accumulation mode.
    pub fn accumulation(&self) -> Accumulation {
        self.accumulation
    }

    /// Learning-rate scaling switches.
    pub fn lr_scaling(&self) -> LrScaling {
        LrScaling {
            scale_lr: self.scale_lr,
            scale_lr_by_param: self.scale_lr_by_param,
            max_lr_scaling: self.max_lr_scaling,
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        self.schedule.validate()?;

        if !(self.max_lr_scaling.is_finite() && self.max_lr_scaling > 0.0) {
            return Err(Error::ConfigError(format!(
                "max_lr_scaling ({}) must be positive",
                self.max_lr_scaling
            )));
        }

        if !(0.0..=100.0).contains(&self.max_param_sparsity) {
            return Err(Error::ConfigError(format!(
                "max_param_sparsity ({}) must be between 0 and 100",
                self.max_param_sparsity
            )));
        }

        if let Some(lrs) = &self.optim_lrs {
            if lrs.iter().any(|lr| !(lr.is_finite() && *lr >= 0.0)) {
                return Err(Error::ConfigError(
                    "optim_lrs must be finite and non-negative".to_string(),
                ));
            }
        }

        Ok(())
    }
}
