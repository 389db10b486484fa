//! Qualified-name index over a submodule's parameters
//!
//! Built once from a live model; the stored tensors are handles, so writes
//! through the index land in the model.

use super::module::{get_submodule, Module};
use crate::autograd::Tensor;
use crate::{Error, Result};
use std::collections::BTreeMap;

/// Map from submodule-local qualified names to live parameter handles
#[derive(Debug, Clone)]
pub struct ParameterIndex {
    prefix: String,
    params: BTreeMap<String, Tensor>,
}

impl ParameterIndex {
    /// Index the parameters of the submodule at `scope` (empty = `root`)
    ///
    /// # Errors
    ///
    /// `ModuleNotFound` if `scope` does not resolve.
    pub fn build(root: &dyn Module, scope: &str) -> Result<Self> {
        let module = get_submodule(root, scope)?;
        Ok(Self {
            prefix: scope.to_string(),
            params: module.named_parameters().into_iter().collect(),
        })
    }

    /// Dotted path of the indexed submodule within the full model
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Parameter handle by local name
    ///
    /// # Errors
    ///
    /// `ParameterNotFound` for unknown names.
    pub fn get(&self, name: &str) -> Result<&Tensor> {
        self.params
            .get(name)
            .ok_or_else(|| Error::ParameterNotFound(name.to_string()))
    }

    /// Whether a local name is indexed
    pub fn contains(&self, name: &str) -> bool {
        self.params.contains_key(name)
    }

    /// Local names with their handles, in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Tensor)> {
        self.params.iter().map(|(name, param)| (name.as_str(), param))
    }

    /// Local names in order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.params.keys().map(String::as_str)
    }

    /// Number of indexed parameters
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Whether nothing is indexed
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Total element count
    pub fn numel(&self) -> usize {
        self.params.values().map(Tensor::len).sum()
    }

    /// Full-model name for a local name
    pub fn to_model_name(&self, local: &str) -> String {
        if self.prefix.is_empty() {
            local.to_string()
        } else {
            format!("{}.{local}", self.prefix)
        }
    }

    /// Local name for a full-model name inside this scope
    ///
    /// `None` when the name lies outside the indexed submodule.
    pub fn to_local_name<'a>(&self, model_name: &'a str) -> Option<&'a str> {
        if self.prefix.is_empty() {
            return Some(model_name);
        }
        model_name
            .strip_prefix(self.prefix.as_str())
            .and_then(|rest| rest.strip_prefix('.'))
    }
}
