//! Re-seeding of newly unmasked weights

use super::mask::MaskSet;
use crate::nn::{ParameterIndex, StateDict};
use crate::{Error, Result, Tensor};
use tracing::info;

/// Overwrite zero elements that are active under `masks` with their
/// initial values.
///
/// `init_values` is keyed by full-model names, `masks` and `index` by names
/// local to the pruned submodule. Without masks every parameter of the
/// submodule is fully active. Nonzero elements are never touched. Returns
/// the number of restored elements.
///
/// # Errors
///
/// `ParameterNotFound` if a name has no counterpart on the other side,
/// `ShapeMismatch` if an initial value is shaped differently.
pub fn restore_initial_values(
    index: &ParameterIndex,
    init_values: &StateDict,
    masks: Option<&MaskSet>,
) -> Result<usize> {
    info!("Restoring newly unmasked weights to initial values");
    let mut restored = 0;
    match masks {
        None => {
            for (model_name, init) in init_values {
                let Some(local) = index.to_local_name(model_name) else {
                    continue;
                };
                restored += restore_where(model_name, index.get(local)?, init, None)?;
            }
        }
        Some(masks) => {
            for (local, mask) in masks {
                let model_name = index.to_model_name(local);
                let init = init_values
                    .get(&model_name)
                    .ok_or_else(|| Error::ParameterNotFound(model_name.clone()))?;
                restored += restore_where(&model_name, index.get(local)?, init, Some(mask.keep()))?;
            }
        }
    }
    info!(restored, "Restored {restored} weights");
    Ok(restored)
}

fn restore_where(name: &str, param: &Tensor, init: &Tensor, keep: Option<&[bool]>) -> Result<usize> {
    if param.shape() != init.shape() {
        return Err(Error::ShapeMismatch {
            name: name.to_string(),
            expected: param.shape().to_vec(),
            actual: init.shape().to_vec(),
        });
    }
    let init = init.data();
    let mut data = param.data_mut();
    let mut restored = 0;
    for (i, (value, initial)) in data.iter_mut().zip(init.iter()).enumerate() {
        let active = keep.map_or(true, |keep| keep[i]);
        if active && *value == 0.0 {
            *value = *initial;
            restored += 1;
        }
    }
    Ok(restored)
}
