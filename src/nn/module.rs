//! The `Module` trait and module-tree navigation
//!
//! Parameters are addressed by qualified names: dot-separated child names
//! followed by the local parameter name (`encoder.0.weight`). Parameter
//! tensors returned from a module are handles onto its live storage.

use super::hooks::ForwardHooks;
use crate::autograd::Tensor;
use crate::{Error, Result};
use std::collections::BTreeMap;

/// Snapshot of named parameter values
pub type StateDict = BTreeMap<String, Tensor>;

/// A node in a model tree
pub trait Module {
    /// Compute the module output without running hooks
    fn forward(&self, input: &Tensor) -> Tensor;

    /// Hooks run before every [`Module::call`]
    fn hooks(&self) -> &ForwardHooks;

    /// Parameters owned directly by this module, not by its children
    fn local_parameters(&self) -> Vec<(String, Tensor)> {
        Vec::new()
    }

    /// Replace a parameter owned directly by this module
    ///
    /// # Errors
    ///
    /// `ParameterNotFound` for unknown names, `ShapeMismatch` when the
    /// replacement has a different shape.
    fn set_local_parameter(&mut self, name: &str, _value: Tensor) -> Result<()> {
        Err(Error::ParameterNotFound(name.to_string()))
    }

    /// Direct children with their names
    fn named_children(&self) -> Vec<(String, &dyn Module)> {
        Vec::new()
    }

    /// Direct children with their names, mutably
    fn named_children_mut(&mut self) -> Vec<(String, &mut dyn Module)> {
        Vec::new()
    }

    /// Run the forward pre-hooks, then `forward`
    ///
    /// Containers call their children through this so hooks installed on
    /// any submodule fire.
    fn call(&self, input: &Tensor) -> Tensor {
        self.hooks().run();
        self.forward(input)
    }

    /// Every parameter in the subtree, keyed by qualified name
    fn named_parameters(&self) -> Vec<(String, Tensor)> {
        let mut params = self.local_parameters();
        for (child_name, child) in self.named_children() {
            for (name, param) in child.named_parameters() {
                params.push((format!("{child_name}.{name}"), param));
            }
        }
        params
    }

    /// Total element count over all parameters
    fn num_parameters(&self) -> usize {
        self.named_parameters().iter().map(|(_, p)| p.len()).sum()
    }

    /// Replace the parameter at a qualified name
    ///
    /// The new tensor is used by subsequent forward passes. Gradient-tracked
    /// expressions are allowed, which is how a multiplier is spliced in front
    /// of a weight.
    ///
    /// # Errors
    ///
    /// `ParameterNotFound` if no parameter lives at `name`.
    fn set_parameter(&mut self, name: &str, value: Tensor) -> Result<()> {
        match name.split_once('.') {
            None => self.set_local_parameter(name, value),
            Some((head, rest)) => {
                let child = self
                    .named_children_mut()
                    .into_iter()
                    .find(|(child_name, _)| child_name == head)
                    .map(|(_, child)| child)
                    .ok_or_else(|| Error::ParameterNotFound(name.to_string()))?;
                child.set_parameter(rest, value).map_err(|e| match e {
                    Error::ParameterNotFound(_) => Error::ParameterNotFound(name.to_string()),
                    other => other,
                })
            }
        }
    }

    /// Independent copies of every parameter
    fn state_dict(&self) -> StateDict {
        self.named_parameters()
            .into_iter()
            .map(|(name, param)| (name, param.deep_clone()))
            .collect()
    }

    /// Copy values from `state` into the live parameters
    ///
    /// Every parameter must be present with a matching shape; entries of
    /// `state` that name no parameter are ignored. Nothing is written unless
    /// all parameters check out.
    ///
    /// # Errors
    ///
    /// `ParameterNotFound` or `ShapeMismatch`.
    fn load_state_dict(&self, state: &StateDict) -> Result<()> {
        let params = self.named_parameters();
        for (name, param) in &params {
            let source = state
                .get(name)
                .ok_or_else(|| Error::ParameterNotFound(name.clone()))?;
            if source.shape() != param.shape() {
                return Err(Error::ShapeMismatch {
                    name: name.clone(),
                    expected: param.shape().to_vec(),
                    actual: source.shape().to_vec(),
                });
            }
        }
        for (name, param) in &params {
            if let Some(source) = state.get(name) {
                let values = source.data().clone();
                *param.data_mut() = values;
            }
        }
        Ok(())
    }
}

/// Resolve a dotted path to a submodule
///
/// The empty path names `root` itself.
///
/// # Errors
///
/// `ModuleNotFound` if any segment does not name a child.
pub fn get_submodule<'a>(root: &'a dyn Module, path: &str) -> Result<&'a dyn Module> {
    if path.is_empty() {
        return Ok(root);
    }
    let mut current = root;
    for segment in path.split('.') {
        current = current
            .named_children()
            .into_iter()
            .find(|(name, _)| name == segment)
            .map(|(_, child)| child)
            .ok_or_else(|| Error::ModuleNotFound(path.to_string()))?;
    }
    Ok(current)
}
