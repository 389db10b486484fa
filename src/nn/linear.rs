//! Fully connected (linear) layer.
//!
//! Implements the transformation y = xW^T + b.

use super::hooks::ForwardHooks;
use super::init::xavier_uniform;
use super::module::Module;
use crate::autograd::{add_row_broadcast, matmul_transposed, Tensor};
use crate::{Error, Result};

/// Fully connected layer: y = xW^T + b
///
/// # Shape
///
/// - Input: `[batch, in_features]` (or a flat `[in_features]` for one row)
/// - Weight: `[out_features, in_features]`
/// - Output: `[batch, out_features]`
pub struct Linear {
    weight: Tensor,
    bias: Option<Tensor>,
    in_features: usize,
    out_features: usize,
    hooks: ForwardHooks,
}

impl Linear {
    /// Create a layer with Xavier-initialized weight and zero bias
    pub fn new(in_features: usize, out_features: usize) -> Self {
        Self::with_seed(in_features, out_features, None)
    }

    /// Create a layer with a specific random seed
    pub fn with_seed(in_features: usize, out_features: usize, seed: Option<u64>) -> Self {
        let mut weight = xavier_uniform(&[out_features, in_features], in_features, out_features, seed);
        weight.set_requires_grad(true);
        let bias = Tensor::zeros(&[out_features], true);

        Self {
            weight,
            bias: Some(bias),
            in_features,
            out_features,
            hooks: ForwardHooks::new(),
        }
    }

    /// Build a layer from explicit tensors
    ///
    /// # Errors
    ///
    /// `ShapeMismatch` unless `weight` is 2-D and `bias` (if any) has
    /// `weight.shape()[0]` elements.
    pub fn from_tensors(weight: Tensor, bias: Option<Tensor>) -> Result<Self> {
        let &[out_features, in_features] = weight.shape() else {
            return Err(Error::ShapeMismatch {
                name: "weight".to_string(),
                expected: vec![0, 0],
                actual: weight.shape().to_vec(),
            });
        };
        if let Some(b) = &bias {
            if b.shape() != [out_features] {
                return Err(Error::ShapeMismatch {
                    name: "bias".to_string(),
                    expected: vec![out_features],
                    actual: b.shape().to_vec(),
                });
            }
        }
        Ok(Self {
            weight,
            bias,
            in_features,
            out_features,
            hooks: ForwardHooks::new(),
        })
    }

    /// Input feature dimension
    pub fn in_features(&self) -> usize {
        self.in_features
    }

    /// Output feature dimension
    pub fn out_features(&self) -> usize {
        self.out_features
    }

    /// Weight tensor handle
    pub fn weight(&self) -> &Tensor {
        &self.weight
    }

    /// Bias tensor handle, if present
    pub fn bias(&self) -> Option<&Tensor> {
        self.bias.as_ref()
    }
}

fn check_replacement(name: &str, current: &Tensor, value: &Tensor) -> Result<()> {
    if current.shape() != value.shape() {
        return Err(Error::ShapeMismatch {
            name: name.to_string(),
            expected: current.shape().to_vec(),
            actual: value.shape().to_vec(),
        });
    }
    Ok(())
}

impl Module for Linear {
    /// Treats `input` as rows of `in_features` values.
    ///
    /// # Panics
    ///
    /// Panics if the input length is not a multiple of `in_features`.
    fn forward(&self, input: &Tensor) -> Tensor {
        assert_eq!(
            input.len() % self.in_features.max(1),
            0,
            "Linear input size mismatch"
        );
        let batch = input.len() / self.in_features.max(1);

        let output = matmul_transposed(
            input,
            &self.weight,
            batch,
            self.in_features,
            self.out_features,
        );
        match &self.bias {
            Some(b) => add_row_broadcast(&output, b, batch, self.out_features),
            None => output,
        }
    }

    fn hooks(&self) -> &ForwardHooks {
        &self.hooks
    }

    fn local_parameters(&self) -> Vec<(String, Tensor)> {
        let mut params = vec![("weight".to_string(), self.weight.clone())];
        if let Some(b) = &self.bias {
            params.push(("bias".to_string(), b.clone()));
        }
        params
    }

    fn set_local_parameter(&mut self, name: &str, value: Tensor) -> Result<()> {
        match (name, self.bias.as_mut()) {
            ("weight", _) => {
                check_replacement(name, &self.weight, &value)?;
                self.weight = value;
            }
            ("bias", Some(bias)) => {
                check_replacement(name, bias, &value)?;
                *bias = value;
            }
            _ => return Err(Error::ParameterNotFound(name.to_string())),
        }
        Ok(())
    }
}

impl std::fmt::Debug for Linear {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Linear")
            .field("in_features", &self.in_features)
            .field("out_features", &self.out_features)
            .field("bias", &self.bias.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autograd::{backward, mul, sum};
    use approx::assert_abs_diff_eq;

    fn fixed_layer() -> Linear {
        // W = [[1, 2], [3, 4], [5, 6]], b = [0.5, -0.5, 1]
        let weight = Tensor::from_shape_vec(&[3, 2], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], true).unwrap();
        let bias = Tensor::from_vec(vec![0.5, -0.5, 1.0], true);
        Linear::from_tensors(weight, Some(bias)).unwrap()
    }

    #[test]
    fn test_forward_known_values() {
        let layer = fixed_layer();
        let x = Tensor::from_shape_vec(&[2, 2], vec![1.0, 1.0, 0.0, 2.0], false).unwrap();
        let y = layer.forward(&x);
        assert_eq!(y.shape(), &[2, 3]);
        assert_eq!(y.to_vec(), vec![3.5, 6.5, 12.0, 4.5, 7.5, 13.0]);
    }

    #[test]
    #[should_panic(expected = "Linear input size mismatch")]
    fn test_forward_rejects_partial_rows() {
        let layer = fixed_layer();
        layer.forward(&Tensor::from_vec(vec![1.0, 2.0, 3.0], false));
    }

    #[test]
    fn test_named_parameters() {
        let layer = Linear::with_seed(4, 3, Some(7));
        let names: Vec<String> = layer.named_parameters().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["weight", "bias"]);
        assert_eq!(layer.num_parameters(), 15);
    }

    #[test]
    fn test_set_parameter_splices_multiplier() {
        let mut layer = fixed_layer();
        let weight = layer.weight().clone();
        let mult = Tensor::ones_like(&weight, true);
        layer.set_parameter("weight", mul(&weight, &mult)).unwrap();

        let x = Tensor::from_vec(vec![1.0, 1.0], false);
        backward(&sum(&layer.forward(&x)), None);

        // dL/dmult = W * x broadcast over rows
        let grad = mult.grad().unwrap();
        assert_abs_diff_eq!(grad[0], 1.0);
        assert_abs_diff_eq!(grad[5], 6.0);
    }

    #[test]
    fn test_set_parameter_rejects_wrong_shape() {
        let mut layer = fixed_layer();
        let err = layer.set_parameter("weight", Tensor::zeros(&[2, 3], false)).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }));
        let err = layer.set_parameter("gamma", Tensor::zeros(&[3], false)).unwrap_err();
        assert!(matches!(err, Error::ParameterNotFound(_)));
    }

    #[test]
    fn test_from_tensors_requires_matrix() {
        let err = Linear::from_tensors(Tensor::zeros(&[6], false), None).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }));
    }
}
