//! Quantizer - float amplitude to 16-bit integer scale
//!
//! Both reducers quantize through [`quantize`] so their results compare
//! bit-for-bit.

/// Full-scale factor of signed 16-bit PCM
pub const QUANT_SCALE: f32 = 32_768.0;

/// Map an amplitude to the 16-bit integer scale, truncating toward zero
///
/// The domain is [-1.0, 1.0]; the upper bound maps to 32768, one past
/// `i16::MAX`, which is why the result is an `i32`. Inputs outside the domain
/// produce out-of-range integers rather than errors.
///
/// # Example
/// ```
/// use pcm_extrema::analysis::quantize;
/// assert_eq!(quantize(0.5), 16_384);
/// assert_eq!(quantize(-0.99999), -32_767);
/// ```
#[inline]
pub fn quantize(amplitude: f32) -> i32 {
    // Scaling by a power of two is exact in f32; `as` truncates toward zero.
    (amplitude * QUANT_SCALE) as i32
}
