//! File layout of the persistence directory

use std::path::{Path, PathBuf};

const EXTENSION: &str = "safetensors";

/// Names of the files stored in one persistence directory
///
/// ```
/// use podar::io::SnipPaths;
///
/// let paths = SnipPaths::new("/tmp/run");
/// assert!(paths.masks(50.0, 100.0).ends_with("masks_50.safetensors"));
/// assert!(paths.masks(12.5, 80.0).ends_with("masks_12.5_max80.safetensors"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnipPaths {
    dir: PathBuf,
}

impl SnipPaths {
    /// Files rooted at `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The persistence directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Full-model parameter snapshot
    pub fn init_values(&self) -> PathBuf {
        self.dir.join(format!("init_values.{EXTENSION}"))
    }

    /// Accumulated gradient sensitivities
    pub fn total_grads(&self) -> PathBuf {
        self.dir.join(format!("total_grads.{EXTENSION}"))
    }

    /// Mask set for a sparsity level and per-parameter cap
    ///
    /// The cap suffix is omitted for a cap of 100%.
    pub fn masks(&self, sparsity: f32, max_param_sparsity: f32) -> PathBuf {
        let name = if max_param_sparsity >= 100.0 {
            format!("masks_{sparsity}.{EXTENSION}")
        } else {
            format!("masks_{sparsity}_max{max_param_sparsity}.{EXTENSION}")
        };
        self.dir.join(name)
    }
}
