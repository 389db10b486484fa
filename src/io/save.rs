//! Writing named tensors and masks

use crate::nn::StateDict;
use crate::prune::MaskSet;
use crate::{Error, Result};
use safetensors::tensor::{Dtype, TensorView};
use std::path::Path;

/// Save named float tensors as an `F32` SafeTensors file
///
/// Tensor values are written as stored; the autograd state is not persisted.
pub fn save_tensors(path: impl AsRef<Path>, tensors: &StateDict) -> Result<()> {
    let tensor_data: Vec<(&str, Vec<u8>, Vec<usize>)> = tensors
        .iter()
        .map(|(name, tensor)| {
            let values = tensor.to_vec();
            let bytes: Vec<u8> = bytemuck::cast_slice(&values).to_vec();
            (name.as_str(), bytes, tensor.shape().to_vec())
        })
        .collect();

    write_views(path.as_ref(), Dtype::F32, &tensor_data)
}

/// Save a mask set as a `BOOL` SafeTensors file
pub fn save_masks(path: impl AsRef<Path>, masks: &MaskSet) -> Result<()> {
    let tensor_data: Vec<(&str, Vec<u8>, Vec<usize>)> = masks
        .iter()
        .map(|(name, mask)| {
            let bytes = mask.keep().iter().map(|&keep| u8::from(keep)).collect();
            (name.as_str(), bytes, mask.shape().to_vec())
        })
        .collect();

    write_views(path.as_ref(), Dtype::BOOL, &tensor_data)
}

fn write_views(path: &Path, dtype: Dtype, tensor_data: &[(&str, Vec<u8>, Vec<usize>)]) -> Result<()> {
    let views = tensor_data
        .iter()
        .map(|(name, bytes, shape)| {
            TensorView::new(dtype, shape.clone(), bytes)
                .map(|view| (*name, view))
                .map_err(|e| Error::Serialization(format!("Invalid tensor '{name}': {e}")))
        })
        .collect::<Result<Vec<_>>>()?;

    let safetensor_bytes = safetensors::serialize(views, &None)
        .map_err(|e| Error::Serialization(format!("SafeTensors serialization failed: {e}")))?;

    std::fs::write(path, safetensor_bytes)?;
    Ok(())
}
