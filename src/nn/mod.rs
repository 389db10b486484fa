//! Minimal module tree: layers, qualified parameter names, forward hooks
//!
//! Models are trees of [`Module`]s. Parameters are reached by dotted names,
//! submodules by dotted paths ([`get_submodule`]), and a [`ParameterIndex`]
//! pins the handles of one submodule for repeated access.

mod activation;
mod container;
mod hooks;
mod index;
mod init;
mod linear;
mod module;

pub use activation::{ReLU, Tanh};
pub use container::Sequential;
pub use hooks::{ForwardHooks, ForwardPreHook, HookHandle};
pub use index::ParameterIndex;
pub use init::xavier_uniform;
pub use linear::Linear;
pub use module::{get_submodule, Module, StateDict};
