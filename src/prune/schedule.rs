//! Epoch-to-sparsity schedule
//!
//! A schedule maps epochs to target sparsity percentages. Sparsity changes
//! only at scheduled epochs and persists in between.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sparsity schedule keyed by epoch.
///
/// # Example
///
/// ```
/// use podar::prune::SparsitySchedule;
///
/// let schedule = SparsitySchedule::new([(0, 0.0), (2, 50.0), (4, 0.0)]).unwrap();
/// assert_eq!(schedule.transition_at(2), Some(50.0));
/// assert_eq!(schedule.transition_at(3), None);
/// assert_eq!(schedule.sparsity_at(3), 50.0);
/// assert_eq!(schedule.sparsity_levels(), vec![50.0]);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SparsitySchedule {
    entries: BTreeMap<usize, f32>,
}

impl Default for SparsitySchedule {
    /// Dense training throughout
    fn default() -> Self {
        Self {
            entries: BTreeMap::from([(0, 0.0)]),
        }
    }
}

impl SparsitySchedule {
    /// Build and validate a schedule.
    ///
    /// # Errors
    ///
    /// `ConfigError` if epoch 0 is missing or a sparsity lies outside
    /// `[0, 100]`.
    pub fn new(entries: impl IntoIterator<Item = (usize, f32)>) -> Result<Self> {
        let schedule = Self {
            entries: entries.into_iter().collect(),
        };
        schedule.validate()?;
        Ok(schedule)
    }

    /// Check the schedule invariants.
    pub fn validate(&self) -> Result<()> {
        if !self.entries.contains_key(&0) {
            return Err(Error::ConfigError(
                "schedule must contain an entry for epoch 0".to_string(),
            ));
        }
        for (epoch, sparsity) in &self.entries {
            if !(0.0..=100.0).contains(sparsity) {
                return Err(Error::ConfigError(format!(
                    "sparsity {sparsity} at epoch {epoch} must be between 0 and 100"
                )));
            }
        }
        Ok(())
    }

    /// Sparsity at epoch 0.
    pub fn start_sparsity(&self) -> f32 {
        self.entries.get(&0).copied().unwrap_or(0.0)
    }

    /// Target sparsity if `epoch` is a scheduled transition.
    pub fn transition_at(&self, epoch: usize) -> Option<f32> {
        self.entries.get(&epoch).copied()
    }

    /// Sparsity in force at `epoch`: that of the greatest scheduled epoch
    /// not after it.
    pub fn sparsity_at(&self, epoch: usize) -> f32 {
        self.entries
            .range(..=epoch)
            .next_back()
            .map_or(0.0, |(_, sparsity)| *sparsity)
    }

    /// Distinct nonzero sparsity levels, ascending.
    pub fn sparsity_levels(&self) -> Vec<f32> {
        let mut levels: Vec<f32> = self.entries.values().copied().filter(|s| *s > 0.0).collect();
        levels.sort_by(f32::total_cmp);
        levels.dedup();
        levels
    }

    /// Scheduled `(epoch, sparsity)` pairs in epoch order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, f32)> + '_ {
        self.entries.iter().map(|(epoch, sparsity)| (*epoch, *sparsity))
    }
}
