//! Scheduled gradient-sensitivity (SNIP) pruning
//!
//! Pruning happens at epoch granularity against a [`SparsitySchedule`]:
//!
//! - **Sensitivity**: one pass over a finite batch sequence scores every
//!   prunable element by the gradient of the loss with respect to a
//!   multiplier in front of it ([`GradientSensitivity`]).
//! - **Masks**: one [`MaskSet`] per scheduled sparsity, ranked globally and
//!   capped per parameter ([`derive_masks`]), cached on disk.
//! - **Forward masking**: a [`MaskHook`] on the pruned submodule zeroes
//!   masked elements before every forward pass.
//! - **Learning rates**: an [`LrCoordinator`] rescales optimizer groups by
//!   density, directly or through scheduler interception.
//! - **Restoration**: newly unmasked zero weights are re-seeded from their
//!   initial values ([`restore_initial_values`]).
//!
//! [`Sniper`] drives all of it from [`Sniper::step`].
//!
//! # References
//!
//! - Lee, N., Ajanthan, T., & Torr, P. (2019). SNIP: Single-shot network
//!   pruning based on connection sensitivity. ICLR.

mod config;
mod controller;
mod hook;
mod lr;
mod mask;
mod report;
mod restore;
mod schedule;
mod sensitivity;

pub use config::SniperConfig;
pub use controller::Sniper;
pub use hook::MaskHook;
pub use lr::{LrCoordinator, LrScaling};
pub use mask::{derive_masks, is_prunable, retain_prunable, MaskSet, ParameterMask};
pub use report::{global_magnitude_prune, ParameterSparsity, SparsityReport};
pub use restore::restore_initial_values;
pub use schedule::SparsitySchedule;
pub use sensitivity::{Accumulation, GradientSensitivity, SensitivityMap};
