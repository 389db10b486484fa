//! Weight initialization
//!
//! - Xavier/Glorot (Glorot & Bengio, 2010)

use crate::autograd::Tensor;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Xavier uniform initialization
///
/// Samples from U(-a, a) where a = sqrt(6 / (`fan_in` + `fan_out`)). With a
/// seed the result is reproducible.
pub fn xavier_uniform(shape: &[usize], fan_in: usize, fan_out: usize, seed: Option<u64>) -> Tensor {
    let a = (6.0 / (fan_in + fan_out).max(1) as f32).sqrt();
    uniform(shape, -a, a, seed)
}

fn uniform(shape: &[usize], low: f32, high: f32, seed: Option<u64>) -> Tensor {
    let numel: usize = shape.iter().product();
    let mut rng = match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };

    let tensor = Tensor::zeros(shape, false);
    tensor
        .data_mut()
        .iter_mut()
        .take(numel)
        .for_each(|v| *v = rng.gen_range(low..high));
    tensor
}
