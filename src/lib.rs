//! # podar
//!
//! Gradient-sensitivity (SNIP) pruning with scheduled sparsity.
//!
//! podar scores every prunable parameter element once, from the gradient of
//! the training loss with respect to a multiplier placed in front of it,
//! then follows an epoch-to-sparsity schedule during training: it swaps in
//! cached masks, zeroes masked weights before every forward pass, rescales
//! learning rates by density and re-seeds weights that become active again.
//!
//! # Architecture
//!
//! - `autograd`: tape-free reverse-mode autograd over shared tensors
//! - `nn`: module trees with qualified parameter names and forward hooks
//! - `optim`: optimizers over named parameter groups, learning rate
//!   schedulers and a swappable scheduler handle
//! - `io`: SafeTensors persistence of named tensors and masks
//! - `prune`: sensitivity, masks, learning-rate coordination and the
//!   epoch-driven [`prune::Sniper`]
//!
//! # Logging
//!
//! Everything is reported through `tracing`. The library never installs a
//! subscriber.

pub mod autograd;
pub mod error;
pub mod io;
pub mod nn;
pub mod optim;
pub mod prune;

pub use autograd::Tensor;
pub use error::{Error, Result};
pub use nn::{Module, ParameterIndex};
pub use optim::{Optimizer, SchedulerHandle, SharedOptimizer};
pub use prune::{MaskSet, ParameterMask, Sniper, SniperConfig, SparsitySchedule};
