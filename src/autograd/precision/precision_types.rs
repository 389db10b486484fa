//! Precision type definitions.

use super::conversions::{bf16_to_f32, f32_to_bf16, f32_to_fp16, fp16_to_f32};
use crate::Tensor;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Data type precision levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    /// 32-bit floating point (default)
    #[default]
    Fp32,
    /// 16-bit floating point (IEEE half precision)
    Fp16,
    /// 16-bit brain floating point (truncated mantissa)
    Bf16,
}

impl Precision {
    /// Size in bytes
    pub fn size_bytes(&self) -> usize {
        match self {
            Precision::Fp32 => 4,
            Precision::Fp16 | Precision::Bf16 => 2,
        }
    }

    /// Human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            Precision::Fp32 => "fp32",
            Precision::Fp16 => "fp16",
            Precision::Bf16 => "bf16",
        }
    }

    /// Whether this is a reduced precision type
    pub fn is_reduced(&self) -> bool {
        matches!(self, Precision::Fp16 | Precision::Bf16)
    }

    /// Round a value through this precision
    pub fn round(&self, value: f32) -> f32 {
        match self {
            Precision::Fp32 => value,
            Precision::Fp16 => fp16_to_f32(f32_to_fp16(value)),
            Precision::Bf16 => bf16_to_f32(f32_to_bf16(value)),
        }
    }

    /// Round every element of a tensor in place
    pub fn cast_in_place(&self, tensor: &Tensor) {
        if self.is_reduced() {
            let precision = *self;
            tensor.data_mut().mapv_inplace(|v| precision.round(v));
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
