//! Reading named tensors and masks

use crate::nn::StateDict;
use crate::prune::{MaskSet, ParameterMask};
use crate::{Error, Result, Tensor};
use safetensors::tensor::{Dtype, TensorView};
use safetensors::SafeTensors;
use std::path::Path;

/// Load an `F32` SafeTensors file into named tensors
///
/// Loaded tensors do not track gradients.
pub fn load_tensors(path: impl AsRef<Path>) -> Result<StateDict> {
    let data = std::fs::read(path)?;
    let safetensors = deserialize(&data)?;

    safetensors
        .tensors()
        .into_iter()
        .map(|(name, view)| {
            expect_dtype(&name, &view, Dtype::F32)?;
            let values: Vec<f32> = bytemuck::pod_collect_to_vec(view.data());
            let tensor = Tensor::from_shape_vec(view.shape(), values, false)?;
            Ok((name, tensor))
        })
        .collect()
}

/// Load a `BOOL` SafeTensors file into a mask set
pub fn load_masks(path: impl AsRef<Path>) -> Result<MaskSet> {
    let data = std::fs::read(path)?;
    let safetensors = deserialize(&data)?;

    safetensors
        .tensors()
        .into_iter()
        .map(|(name, view)| {
            expect_dtype(&name, &view, Dtype::BOOL)?;
            let keep = view.data().iter().map(|&byte| byte != 0).collect();
            let mask = ParameterMask::new(view.shape().to_vec(), keep)?;
            Ok((name, mask))
        })
        .collect()
}

fn deserialize(data: &[u8]) -> Result<SafeTensors<'_>> {
    SafeTensors::deserialize(data)
        .map_err(|e| Error::Serialization(format!("SafeTensors parsing failed: {e}")))
}

fn expect_dtype(name: &str, view: &TensorView<'_>, dtype: Dtype) -> Result<()> {
    if view.dtype() == dtype {
        Ok(())
    } else {
        Err(Error::Serialization(format!(
            "Tensor '{name}' has dtype {:?}, expected {dtype:?}",
            view.dtype()
        )))
    }
}
