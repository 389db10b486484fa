//! Reduced-precision emulation
//!
//! Models are rebuilt for gradient computation in the configured training
//! precision. Storage stays `f32`; values are rounded through the narrower
//! format so sensitivities match what a reduced-precision run would see.

mod conversions;
mod precision_types;


pub use conversions::{bf16_to_f32, f32_to_bf16, f32_to_fp16, fp16_to_f32};
pub use precision_types::Precision;
