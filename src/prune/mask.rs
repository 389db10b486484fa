//! Boolean keep-masks and their derivation from sensitivities

use super::sensitivity::SensitivityMap;
use crate::{Error, Result, Tensor};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::BTreeMap;
use tracing::info;

/// Seed for choosing among tied elements when a cap must hold exactly
const TIE_BREAK_SEED: u64 = 0;

/// Keep-mask for one parameter; `true` keeps the element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterMask {
    shape: Vec<usize>,
    keep: Vec<bool>,
}

/// Masks for one sparsity level, keyed by submodule-local qualified name
pub type MaskSet = BTreeMap<String, ParameterMask>;

impl ParameterMask {
    /// Create a mask from a shape and row-major keep flags.
    ///
    /// # Errors
    ///
    /// `InvalidParameter` if the flag count does not match the shape.
    pub fn new(shape: Vec<usize>, keep: Vec<bool>) -> Result<Self> {
        let numel: usize = shape.iter().product();
        if numel != keep.len() {
            return Err(Error::InvalidParameter(format!(
                "mask of shape {shape:?} needs {numel} flags, got {}",
                keep.len()
            )));
        }
        Ok(Self { shape, keep })
    }

    /// Mask keeping every element of `shape`
    pub fn dense(shape: &[usize]) -> Self {
        let numel = shape.iter().product();
        Self {
            shape: shape.to_vec(),
            keep: vec![true; numel],
        }
    }

    /// Shape of the masked parameter
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Row-major keep flags
    pub fn keep(&self) -> &[bool] {
        &self.keep
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.keep.len()
    }

    /// Whether the mask covers no elements
    pub fn is_empty(&self) -> bool {
        self.keep.is_empty()
    }

    /// Number of kept elements
    pub fn num_kept(&self) -> usize {
        self.keep.iter().filter(|&&k| k).count()
    }

    /// Number of zeroed elements
    pub fn num_dropped(&self) -> usize {
        self.len() - self.num_kept()
    }

    /// Kept fraction; an empty mask counts as dense
    pub fn density(&self) -> f32 {
        if self.is_empty() {
            1.0
        } else {
            self.num_kept() as f32 / self.len() as f32
        }
    }

    /// Multiply `tensor` by the mask in place.
    ///
    /// The write bypasses autograd.
    ///
    /// # Errors
    ///
    /// `ShapeMismatch` if the tensor is not shaped like the mask.
    pub fn apply(&self, name: &str, tensor: &Tensor) -> Result<()> {
        if tensor.shape() != self.shape.as_slice() {
            return Err(Error::ShapeMismatch {
                name: name.to_string(),
                expected: self.shape.clone(),
                actual: tensor.shape().to_vec(),
            });
        }
        self.zero_dropped(tensor);
        Ok(())
    }

    /// Multiply by the mask without checking the shape
    pub(crate) fn zero_dropped(&self, tensor: &Tensor) {
        let mut data = tensor.data_mut();
        for (value, &keep) in data.iter_mut().zip(&self.keep) {
            *value *= if keep { 1.0 } else { 0.0 };
        }
    }
}

/// Whether a qualified name avoids every exclusion substring
pub fn is_prunable(name: &str, exclude_params: &[String]) -> bool {
    !exclude_params.iter().any(|exclude| name.contains(exclude.as_str()))
}

/// Drop masks whose names contain an exclusion substring
pub fn retain_prunable(masks: &mut MaskSet, exclude_params: &[String]) {
    masks.retain(|name, _| is_prunable(name, exclude_params));
}

/// Number of elements to drop for a percentage of `numel`
fn drop_count(percent: f32, numel: usize) -> usize {
    (f64::from(percent) * numel as f64 / 100.0).floor() as usize
}

/// k-th smallest value, 1-based; `k` must be in `1..=values.len()`
fn kth_smallest(values: &[f32], k: usize) -> f32 {
    let mut scratch = values.to_vec();
    let (_, kth, _) = scratch.select_nth_unstable_by(k - 1, f32::total_cmp);
    *kth
}

/// Mask keeping only values strictly above a threshold
fn above(values: &[f32], threshold: Option<f32>) -> Vec<bool> {
    match threshold {
        Some(t) => values.iter().map(|&v| v > t).collect(),
        None => vec![true; values.len()],
    }
}

/// Re-threshold one parameter so at most `max_drop` elements are dropped
///
/// Ties at the threshold are broken by a seeded shuffle so the count is
/// exact.
fn cap_parameter(values: &[f32], max_drop: usize) -> Vec<bool> {
    if max_drop == 0 {
        return vec![true; values.len()];
    }
    let threshold = kth_smallest(values, max_drop);
    let mut keep = above(values, Some(threshold));
    let dropped = keep.iter().filter(|&&k| !k).count();
    if dropped > max_drop {
        let below = values.iter().filter(|&&v| v < threshold).count();
        let mut ties: Vec<usize> = values
            .iter()
            .enumerate()
            .filter(|(_, &v)| v == threshold)
            .map(|(i, _)| i)
            .collect();
        ties.shuffle(&mut StdRng::seed_from_u64(TIE_BREAK_SEED));
        for &i in &ties {
            keep[i] = true;
        }
        for &i in ties.iter().take(max_drop - below) {
            keep[i] = false;
        }
    }
    keep
}

/// Derive the masks for one sparsity level.
///
/// Every sensitivity competes in one global ranking: the lowest
/// `sparsity%` are dropped (values tied with the cut-off included). A
/// parameter that would lose more than `max_param_sparsity%` of its own
/// elements is re-thresholded against its own values instead, dropping
/// exactly `floor(max_param_sparsity% * numel)` elements.
///
/// ```
/// use podar::prune::derive_masks;
/// use podar::Tensor;
/// use std::collections::BTreeMap;
///
/// let mut sensitivity = BTreeMap::new();
/// sensitivity.insert("w".to_string(), Tensor::from_vec(vec![0.1, 0.4, 0.2, 0.3], false));
/// let masks = derive_masks(&sensitivity, 50.0, 100.0);
/// assert_eq!(masks["w"].keep(), &[false, true, false, true]);
/// ```
pub fn derive_masks(
    sensitivity: &SensitivityMap,
    sparsity: f32,
    max_param_sparsity: f32,
) -> MaskSet {
    let flattened: Vec<f32> = sensitivity
        .values()
        .flat_map(|tensor| tensor.to_vec())
        .collect();
    let global_drop = drop_count(sparsity, flattened.len());
    let threshold = (global_drop > 0).then(|| kth_smallest(&flattened, global_drop));

    sensitivity
        .iter()
        .map(|(name, tensor)| {
            let values = tensor.to_vec();
            let numel = values.len();
            let mut keep = above(&values, threshold);
            let dropped = keep.iter().filter(|&&k| !k).count();
            let max_drop = drop_count(max_param_sparsity, numel);
            if dropped > max_drop {
                keep = cap_parameter(&values, max_drop);
            }
            let mask = ParameterMask {
                shape: tensor.shape().to_vec(),
                keep,
            };
            info!(parameter = %name, numel, kept = mask.num_kept(), "{name}: {numel} -> {}", mask.num_kept());
            (name.clone(), mask)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    fn sensitivity(entries: &[(&str, Vec<f32>)]) -> SensitivityMap {
        entries
            .iter()
            .map(|(name, values)| (name.to_string(), Tensor::from_vec(values.clone(), false)))
            .collect()
    }

    #[test]
    fn test_zero_sparsity_keeps_everything() {
        let map = sensitivity(&[("a", vec![0.0, 0.0, 1.0])]);
        let masks = derive_masks(&map, 0.0, 100.0);
        assert_eq!(masks["a"].num_dropped(), 0);
    }

    #[test]
    fn test_global_ranking_spans_parameters() {
        let map = sensitivity(&[("a", vec![1.0, 2.0, 3.0]), ("b", vec![4.0, 5.0, 6.0])]);
        let masks = derive_masks(&map, 50.0, 100.0);
        assert_eq!(masks["a"].keep(), &[false, false, false]);
        assert_eq!(masks["b"].keep(), &[true, true, true]);
    }

    #[test]
    fn test_cap_limits_drop_to_exact_count() {
        // 100 values in a small layer, 900 large values elsewhere: a global
        // 95% cut would wipe out the small layer entirely.
        let small: Vec<f32> = (0..100).map(|i| i as f32 * 1e-3).collect();
        let large: Vec<f32> = (0..900).map(|i| 10.0 + i as f32).collect();
        let map = sensitivity(&[("small", small), ("large", large)]);

        let masks = derive_masks(&map, 95.0, 80.0);
        assert_eq!(masks["small"].num_dropped(), 80);
        // the 20 most sensitive elements survive
        assert!(masks["small"].keep()[80..].iter().all(|&k| k));
    }

    #[test]
    fn test_all_equal_parameter_is_filled_deterministically() {
        let map = sensitivity(&[("flat", vec![0.0; 10]), ("rest", vec![1.0; 10])]);
        let first = derive_masks(&map, 50.0, 60.0);
        let second = derive_masks(&map, 50.0, 60.0);

        assert_eq!(first["flat"].num_dropped(), 6);
        assert_eq!(first, second);
    }

    #[test]
    fn test_cap_of_zero_keeps_parameter_dense() {
        let map = sensitivity(&[("a", vec![0.0, 0.1]), ("b", vec![5.0, 6.0])]);
        let masks = derive_masks(&map, 50.0, 0.0);
        assert_eq!(masks["a"].num_dropped(), 0);
    }

    #[test]
    fn test_apply_zeroes_dropped_elements() {
        let mask = ParameterMask::new(vec![2, 2], vec![true, false, false, true]).unwrap();
        let tensor = Tensor::from_shape_vec(&[2, 2], vec![1.0, 2.0, 3.0, 4.0], true).unwrap();
        mask.apply("w", &tensor).unwrap();
        assert_eq!(tensor.to_vec(), vec![1.0, 0.0, 0.0, 4.0]);
        assert_abs_diff_eq!(mask.density(), 0.5, epsilon = 1e-6);

        let wrong = Tensor::from_vec(vec![1.0; 4], false);
        assert!(matches!(mask.apply("w", &wrong), Err(Error::ShapeMismatch { .. })));
    }

    #[test]
    fn test_mask_flag_count_is_checked() {
        assert!(ParameterMask::new(vec![3], vec![true]).is_err());
        assert_eq!(ParameterMask::dense(&[2, 3]).num_kept(), 6);
    }

    #[test]
    fn test_exclusions() {
        let exclude = vec!["embed".to_string(), "norm".to_string()];
        assert!(!is_prunable("embed.weight", &exclude));
        assert!(!is_prunable("layers.0.norm.bias", &exclude));
        assert!(is_prunable("layers.0.weight", &exclude));

        let mut masks = MaskSet::new();
        masks.insert("embed.weight".to_string(), ParameterMask::dense(&[1]));
        masks.insert("fc.weight".to_string(), ParameterMask::dense(&[1]));
        retain_prunable(&mut masks, &exclude);
        assert_eq!(masks.keys().collect::<Vec<_>>(), vec!["fc.weight"]);
    }

    proptest! {
        #[test]
        fn prop_cap_holds_for_every_parameter(
            a in prop::collection::vec(0.0f32..1.0, 1..60),
            b in prop::collection::vec(0.0f32..1.0, 1..60),
            sparsity in 0.0f32..=100.0,
            cap in 0.0f32..=100.0,
        ) {
            let map = sensitivity(&[("a", a), ("b", b)]);
            let masks = derive_masks(&map, sparsity, cap);
            for mask in masks.values() {
                prop_assert!(mask.num_dropped() <= drop_count(cap, mask.len()));
            }
        }

        #[test]
        fn prop_uncapped_drop_count_is_exact_for_distinct_values(
            n in 1usize..200,
            sparsity in 0.0f32..=100.0,
        ) {
            let values: Vec<f32> = (0..n).rev().map(|i| i as f32).collect();
            let map = sensitivity(&[("w", values)]);
            let masks = derive_masks(&map, sparsity, 100.0);
            prop_assert_eq!(masks["w"].num_dropped(), drop_count(sparsity, n));
        }

        #[test]
        fn prop_derivation_is_deterministic(
            values in prop::collection::vec(0u8..4, 1..80),
            sparsity in 0.0f32..=100.0,
            cap in 0.0f32..=100.0,
        ) {
            let values: Vec<f32> = values.into_iter().map(f32::from).collect();
            let map = sensitivity(&[("w", values)]);
            prop_assert_eq!(derive_masks(&map, sparsity, cap), derive_masks(&map, sparsity, cap));
        }
    }
}
