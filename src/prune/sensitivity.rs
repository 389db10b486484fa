//! One-shot gradient sensitivity
//!
//! Each prunable parameter `w` is replaced by `w * m` with an all-ones
//! multiplier `m` that tracks gradients. The gradient of the loss with
//! respect to `m` is the connection sensitivity of every element of `w`.
//! The model is rebuilt from the initial values for every batch so that no
//! graph outlives its batch.

use super::mask::is_prunable;
use crate::autograd::{backward, mul, Precision};
use crate::nn::{Module, ParameterIndex, StateDict};
use crate::{Result, Tensor};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug_span, info, warn};

/// Absolute accumulated gradient per element, keyed by submodule-local name
pub type SensitivityMap = BTreeMap<String, Tensor>;

/// How per-batch gradients are folded into one sensitivity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Accumulation {
    /// Sum the magnitude of every batch's gradient
    #[default]
    SumOfAbs,
    /// Sum raw gradients and take the magnitude at the end
    AbsOfSum,
}

/// Gradient sensitivity computation over a finite batch sequence.
///
/// # Example
///
/// ```
/// use podar::autograd::{mse_loss, Tensor};
/// use podar::nn::{Linear, Module};
/// use podar::prune::GradientSensitivity;
///
/// let builder = || Linear::with_seed(2, 1, Some(3));
/// let init_values = builder().state_dict();
/// let batches = vec![(vec![1.0, -1.0], vec![0.5])];
///
/// let sensitivity = GradientSensitivity::new(&builder, &init_values)
///     .compute(batches, |model, (x, y)| {
///         let pred = model.call(&Tensor::from_vec(x.clone(), false));
///         Ok(mse_loss(&pred, &Tensor::from_vec(y.clone(), false)))
///     })
///     .unwrap();
/// assert_eq!(sensitivity["weight"].shape(), &[1, 2]);
/// ```
pub struct GradientSensitivity<'a, M> {
    builder: &'a dyn Fn() -> M,
    init_values: &'a StateDict,
    scope: &'a str,
    exclude_params: &'a [String],
    precision: Precision,
    accumulation: Accumulation,
}

impl<'a, M: Module> GradientSensitivity<'a, M> {
    /// Sensitivity of the whole model rebuilt by `builder` from `init_values`
    pub fn new(builder: &'a dyn Fn() -> M, init_values: &'a StateDict) -> Self {
        Self {
            builder,
            init_values,
            scope: "",
            exclude_params: &[],
            precision: Precision::Fp32,
            accumulation: Accumulation::SumOfAbs,
        }
    }

    /// Restrict to the submodule at a dotted path
    pub fn with_scope(mut self, scope: &'a str) -> Self {
        self.scope = scope;
        self
    }

    /// Skip parameters whose local name contains any of these substrings
    pub fn with_exclude_params(mut self, exclude_params: &'a [String]) -> Self {
        self.exclude_params = exclude_params;
        self
    }

    /// Precision the rebuilt models are rounded to
    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }

    /// Batch accumulation mode
    pub fn with_accumulation(mut self, accumulation: Accumulation) -> Self {
        self.accumulation = accumulation;
        self
    }

    /// Fresh model with multipliers spliced in front of every prunable
    /// parameter; returns the model and the `(local name, multiplier)` pairs.
    fn rebuild(&self) -> Result<(M, Vec<(String, Tensor)>)> {
        let _span = debug_span!("rebuild_model", scope = self.scope).entered();

        let mut model = (self.builder)();
        model.load_state_dict(self.init_values)?;
        for (_, param) in model.named_parameters() {
            self.precision.cast_in_place(&param);
        }

        let index = ParameterIndex::build(&model, self.scope)?;
        let mut multipliers = Vec::new();
        for (name, param) in index.iter() {
            if !is_prunable(name, self.exclude_params) {
                continue;
            }
            let multiplier = Tensor::ones_like(param, true);
            let product = mul(param, &multiplier);
            model.set_parameter(&index.to_model_name(name), product)?;
            multipliers.push((name.to_string(), multiplier));
        }
        Ok((model, multipliers))
    }

    /// Run one forward/backward pass per batch and return the accumulated
    /// sensitivities of the prunable parameters.
    ///
    /// `batches` is consumed exactly once. Any error from rebuilding or from
    /// `loss_fn` aborts the computation.
    pub fn compute<B, I, F>(&self, batches: I, mut loss_fn: F) -> Result<SensitivityMap>
    where
        I: IntoIterator<Item = B>,
        F: FnMut(&M, &B) -> Result<Tensor>,
    {
        let start = Instant::now();

        let reference = (self.builder)();
        let trainable: usize = ParameterIndex::build(&reference, self.scope)?
            .iter()
            .filter(|(_, p)| p.requires_grad())
            .map(|(_, p)| p.len())
            .sum();
        drop(reference);

        let (mut model, mut multipliers) = self.rebuild()?;
        let eligible: usize = multipliers.iter().map(|(_, m)| m.len()).sum();
        info!(trainable, "Total trainable params: {trainable}");
        info!(eligible, "Total params eligible to prune: {eligible}");

        let mut totals: Vec<Array1<f32>> = multipliers
            .iter()
            .map(|(_, m)| Array1::zeros(m.len()))
            .collect();
        let mut num_batches = 0usize;

        for batch in batches {
            let loss = loss_fn(&model, &batch)?;
            backward(&loss, None);
            for (total, (_, multiplier)) in totals.iter_mut().zip(&multipliers) {
                if let Some(grad) = multiplier.grad() {
                    match self.accumulation {
                        Accumulation::SumOfAbs => *total += &grad.mapv(f32::abs),
                        Accumulation::AbsOfSum => *total += &grad,
                    }
                }
            }
            num_batches += 1;

            drop(loss);
            (model, multipliers) = self.rebuild()?;
        }

        if num_batches == 0 {
            warn!("No batches to compute gradients from; all sensitivities are zero");
        }
        let elapsed = start.elapsed().as_secs_f64();
        let per_batch = elapsed / num_batches.max(1) as f64;
        info!(elapsed, "SNIP time: {elapsed:.3}s");
        info!(per_batch, num_batches, "SNIP time/batch: {per_batch:.3}s");

        multipliers
            .iter()
            .zip(totals)
            .map(|((name, multiplier), total)| {
                let values = match self.accumulation {
                    Accumulation::SumOfAbs => total,
                    Accumulation::AbsOfSum => total.mapv(f32::abs),
                };
                let tensor = Tensor::from_shape_vec(multiplier.shape(), values.to_vec(), false)?;
                Ok((name.clone(), tensor))
            })
            .collect()
    }
}
