//! Nonzero accounting and global magnitude pruning

use crate::nn::Module;
use crate::Tensor;
use std::fmt;

/// Nonzero count of one parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterSparsity {
    /// Qualified parameter name
    pub name: String,
    /// Elements that are not zero
    pub nonzero: usize,
    /// Total elements
    pub numel: usize,
}

impl ParameterSparsity {
    /// Zeroed share in percent
    pub fn sparsity(&self) -> f32 {
        sparsity_percent(self.nonzero, self.numel)
    }
}

/// Per-parameter and total nonzero counts of a module
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SparsityReport {
    parameters: Vec<ParameterSparsity>,
}

fn sparsity_percent(nonzero: usize, numel: usize) -> f32 {
    if numel == 0 {
        0.0
    } else {
        100.0 * (1.0 - nonzero as f32 / numel as f32)
    }
}

impl SparsityReport {
    /// Count the nonzero elements of every parameter of `module`
    pub fn from_module(module: &dyn Module) -> Self {
        Self::from_parameters(module.named_parameters())
    }

    /// Count the nonzero elements of named tensors
    pub fn from_parameters<I, S>(params: I) -> Self
    where
        I: IntoIterator<Item = (S, Tensor)>,
        S: Into<String>,
    {
        let parameters = params
            .into_iter()
            .map(|(name, tensor)| ParameterSparsity {
                name: name.into(),
                nonzero: tensor.count_nonzero(),
                numel: tensor.len(),
            })
            .collect();
        Self { parameters }
    }

    /// Per-parameter entries
    pub fn parameters(&self) -> &[ParameterSparsity] {
        &self.parameters
    }

    /// Nonzero elements over all parameters
    pub fn total_nonzero(&self) -> usize {
        self.parameters.iter().map(|p| p.nonzero).sum()
    }

    /// Elements over all parameters
    pub fn total_numel(&self) -> usize {
        self.parameters.iter().map(|p| p.numel).sum()
    }

    /// Overall zeroed share in percent
    pub fn sparsity(&self) -> f32 {
        sparsity_percent(self.total_nonzero(), self.total_numel())
    }
}

impl fmt::Display for SparsityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for p in &self.parameters {
            writeln!(
                f,
                "{} has {} / {} parameters (sparsity {:.2}%)",
                p.name,
                p.nonzero,
                p.numel,
                p.sparsity()
            )?;
        }
        write!(
            f,
            "Module has {} / {} parameters (sparsity {:.2}%)",
            self.total_nonzero(),
            self.total_numel(),
            self.sparsity()
        )
    }
}

/// Zero the smallest-magnitude `ratio` of all elements across `params`.
///
/// Elements are ranked together; those whose magnitude is below the
/// `floor(ratio * N)`-th smallest magnitude are zeroed in place. Returns the
/// number of elements zeroed.
pub fn global_magnitude_prune(params: &[Tensor], ratio: f32) -> usize {
    let mut magnitudes: Vec<f32> = params
        .iter()
        .flat_map(|p| p.data().iter().map(|v| v.abs()).collect::<Vec<_>>())
        .collect();
    let k = (f64::from(ratio.clamp(0.0, 1.0)) * magnitudes.len() as f64).floor() as usize;
    if k == 0 {
        return 0;
    }
    let (_, threshold, _) = magnitudes.select_nth_unstable_by(k - 1, f32::total_cmp);
    let threshold = *threshold;

    let mut zeroed = 0;
    for param in params {
        for value in param.data_mut().iter_mut() {
            if value.abs() < threshold && *value != 0.0 {
                *value = 0.0;
                zeroed += 1;
            }
        }
    }
    zeroed
}
