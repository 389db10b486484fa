//! Forward pre-hook applying the current masks

use super::mask::MaskSet;
use crate::nn::{ForwardPreHook, ParameterIndex};
use crate::{Error, Result, Tensor};
use std::rc::Rc;

/// Zeroes masked elements of the pruned submodule before every forward pass
///
/// Parameters are resolved and shape-checked once, when the hook is built, so
/// applying the masks cannot fail. Writes go straight to parameter storage and
/// are not recorded by autograd.
pub struct MaskHook {
    masks: Rc<MaskSet>,
    // One handle per mask, in mask order
    targets: Vec<Tensor>,
}

impl MaskHook {
    /// Bind `masks` to the live parameters in `index`.
    ///
    /// # Errors
    ///
    /// `ParameterNotFound` if a mask names no indexed parameter,
    /// `ShapeMismatch` if shapes disagree.
    pub fn new(masks: Rc<MaskSet>, index: &ParameterIndex) -> Result<Self> {
        let mut targets = Vec::with_capacity(masks.len());
        for (name, mask) in masks.iter() {
            let param = index.get(name)?;
            if param.shape() != mask.shape() {
                return Err(Error::ShapeMismatch {
                    name: index.to_model_name(name),
                    expected: param.shape().to_vec(),
                    actual: mask.shape().to_vec(),
                });
            }
            targets.push(param.clone());
        }
        Ok(Self { masks, targets })
    }

    /// Apply every mask once
    pub fn apply(&self) {
        for (mask, param) in self.masks.values().zip(&self.targets) {
            mask.zero_dropped(param);
        }
    }
}

impl ForwardPreHook for MaskHook {
    fn before_forward(&self) {
        self.apply();
    }
}
