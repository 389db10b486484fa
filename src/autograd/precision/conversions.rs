//! Bit-level conversions between f32 and 16-bit formats.

/// Convert f32 to bf16 (truncated)
///
/// BF16 uses the same exponent as f32 but only 7 mantissa bits.
pub fn f32_to_bf16(value: f32) -> u16 {
    let bits = value.to_bits();
    (bits >> 16) as u16
}

/// Convert bf16 to f32
pub fn bf16_to_f32(value: u16) -> f32 {
    let bits = u32::from(value) << 16;
    f32::from_bits(bits)
}

/// Convert f32 to fp16 (IEEE half precision, round to nearest even)
pub fn f32_to_fp16(value: f32) -> u16 {
    half::f16::from_f32(value).to_bits()
}

/// Convert fp16 to f32
pub fn fp16_to_f32(value: u16) -> f32 {
    half::f16::from_bits(value).to_f32()
}
