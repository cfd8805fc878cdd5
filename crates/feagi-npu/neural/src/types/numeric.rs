// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Numeric type abstractions for quantization support
//!
//! The burst engine is generic over [`NeuralValue`]. `f32` is a zero-cost passthrough;
//! [`INT8Value`] stores a signed 8-bit code over a symmetric, load-time configured range:
//!
//! ```text
//! step  = max(|min|, |max|) / 127
//! value = code × step            (code 0 is exactly 0.0)
//! ```
//!
//! Because zero maps to code 0, addition, subtraction and scaling work directly on codes.
//! Codes are kept in `[-127, 127]`; `-128` is never produced.
//!
//! Leak coefficients and excitability are never quantized: mapping a 0.0-0.1 range onto an
//! 8-bit grid calibrated for membrane potentials leaves no usable resolution.

use core::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use super::error::{FeagiError, Result};

/// Largest code magnitude used by [`INT8Value`]
pub const INT8_CODE_MAX: i8 = 127;

static CLAMP_WARNED: AtomicBool = AtomicBool::new(false);

/// Quantization precision mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    FP32,
    INT8,
}

impl Default for Precision {
    fn default() -> Self {
        Self::FP32
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Precision::FP32 => write!(f, "fp32"),
            Precision::INT8 => write!(f, "int8"),
        }
    }
}

/// Floating-point range mapped onto the quantized domain
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuantizationRange {
    pub min: f32,
    pub max: f32,
}

impl Default for QuantizationRange {
    fn default() -> Self {
        Self {
            min: -100.0,
            max: 100.0,
        }
    }
}

impl QuantizationRange {
    pub fn new(min: f32, max: f32) -> Result<Self> {
        let range = Self { min, max };
        range.validate()?;
        Ok(range)
    }

    /// Zero must lie strictly inside the range so that resting potentials and empty
    /// accumulators are representable with room on both sides.
    pub fn validate(&self) -> Result<()> {
        if !self.min.is_finite() || !self.max.is_finite() {
            return Err(FeagiError::InvalidParameter(format!(
                "quantization range must be finite, got [{}, {}]",
                self.min, self.max
            )));
        }
        if self.min >= self.max {
            return Err(FeagiError::InvalidParameter(format!(
                "quantization range min ({}) must be below max ({})",
                self.min, self.max
            )));
        }
        if self.min >= 0.0 || self.max <= 0.0 {
            return Err(FeagiError::InvalidParameter(format!(
                "quantization range [{}, {}] must satisfy min < 0 < max",
                self.min, self.max
            )));
        }
        Ok(())
    }

    #[inline]
    pub fn half_span(&self) -> f32 {
        self.min.abs().max(self.max.abs())
    }

    /// Value of one code step
    #[inline]
    pub fn step(&self) -> f32 {
        self.half_span() / INT8_CODE_MAX as f32
    }

    #[inline]
    pub fn contains(&self, value: f32) -> bool {
        value >= self.min && value <= self.max
    }

    /// Lowest and highest codes whose decoded value stays inside the range
    #[inline]
    pub fn code_bounds(&self) -> (i8, i8) {
        // 1e-3 absorbs f32 error in min/step and max/step at the ends of the range
        let step = self.step();
        let lo = (self.min / step - 1e-3).ceil().clamp(-127.0, 0.0) as i8;
        let hi = (self.max / step + 1e-3).floor().clamp(0.0, 127.0) as i8;
        (lo, hi)
    }

    /// Encode a value, returning the code and whether the input had to be clamped
    #[inline]
    pub fn encode(&self, value: f32) -> (i8, bool) {
        if value.is_nan() {
            return (0, true);
        }
        let (lo, hi) = self.code_bounds();
        let scaled = (value / self.step()).round();
        let code = scaled.clamp(lo as f32, hi as f32) as i8;
        (code, !self.contains(value))
    }

    #[inline]
    pub fn decode(&self, code: i8) -> f32 {
        code as f32 * self.step()
    }
}

/// Quantization specification supplied with the network
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct QuantizationSpec {
    pub precision: Precision,
    #[serde(default)]
    pub range: QuantizationRange,
}

/// Capability interface for a neural quantity (membrane potential, threshold, resting potential)
///
/// Conversions take the load-time [`QuantizationRange`]; every other operation works on the
/// stored representation directly.
pub trait NeuralValue: Copy + Clone + Send + Sync + fmt::Debug + PartialEq + 'static {
    const PRECISION: Precision;

    fn zero() -> Self;
    fn from_f32(value: f32, range: &QuantizationRange) -> Self;
    fn to_f32(self, range: &QuantizationRange) -> f32;
    fn saturating_add(self, other: Self) -> Self;
    fn saturating_sub(self, other: Self) -> Self;
    fn scaled_multiply(self, factor: f32) -> Self;
    fn ge(self, other: Self) -> bool;
    fn le(self, other: Self) -> bool;
    fn max_value() -> Self;
    fn min_value() -> Self;

    #[inline(always)]
    fn precision() -> Precision {
        Self::PRECISION
    }
}

impl NeuralValue for f32 {
    const PRECISION: Precision = Precision::FP32;

    #[inline(always)]
    fn zero() -> Self {
        0.0
    }

    #[inline(always)]
    fn from_f32(value: f32, _range: &QuantizationRange) -> Self {
        value
    }

    #[inline(always)]
    fn to_f32(self, _range: &QuantizationRange) -> f32 {
        self
    }

    #[inline(always)]
    fn saturating_add(self, other: Self) -> Self {
        self + other
    }

    #[inline(always)]
    fn saturating_sub(self, other: Self) -> Self {
        self - other
    }

    #[inline(always)]
    fn scaled_multiply(self, factor: f32) -> Self {
        self * factor
    }

    #[inline(always)]
    fn ge(self, other: Self) -> bool {
        self >= other
    }

    #[inline(always)]
    fn le(self, other: Self) -> bool {
        self <= other
    }

    #[inline(always)]
    fn max_value() -> Self {
        f32::MAX
    }

    #[inline(always)]
    fn min_value() -> Self {
        f32::MIN
    }
}

/// INT8 quantized value for neural computations
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct INT8Value(pub i8);

impl INT8Value {
    #[inline]
    pub const fn from_raw(value: i8) -> Self {
        Self(value)
    }

    #[inline]
    pub const fn to_raw(self) -> i8 {
        self.0
    }

    #[inline(always)]
    fn clamp_code(value: i32) -> Self {
        Self(value.clamp(-(INT8_CODE_MAX as i32), INT8_CODE_MAX as i32) as i8)
    }
}

impl NeuralValue for INT8Value {
    const PRECISION: Precision = Precision::INT8;

    #[inline]
    fn zero() -> Self {
        Self(0)
    }

    #[inline]
    fn from_f32(value: f32, range: &QuantizationRange) -> Self {
        let (code, clamped) = range.encode(value);
        if clamped {
            if !CLAMP_WARNED.swap(true, Ordering::Relaxed) {
                tracing::warn!(
                    target: "feagi-npu-quantization",
                    "Value {} outside quantization range [{}, {}], saturating (further clamps logged at trace level)",
                    value,
                    range.min,
                    range.max
                );
            } else {
                tracing::trace!(target: "feagi-npu-quantization", value, "quantization clamp");
            }
        }
        Self(code)
    }

    #[inline]
    fn to_f32(self, range: &QuantizationRange) -> f32 {
        range.decode(self.0)
    }

    #[inline]
    fn saturating_add(self, other: Self) -> Self {
        Self::clamp_code(self.0 as i32 + other.0 as i32)
    }

    #[inline]
    fn saturating_sub(self, other: Self) -> Self {
        Self::clamp_code(self.0 as i32 - other.0 as i32)
    }

    /// Fixed-point multiply with a Q16.16 factor (16 fractional bits), rounded half up
    #[inline]
    fn scaled_multiply(self, factor: f32) -> Self {
        let q = (factor.clamp(-256.0, 256.0) * 65536.0).round() as i64;
        let product = (self.0 as i64 * q + (1 << 15)) >> 16;
        Self(product.clamp(-(INT8_CODE_MAX as i64), INT8_CODE_MAX as i64) as i8)
    }

    #[inline]
    fn ge(self, other: Self) -> bool {
        self.0 >= other.0
    }

    #[inline]
    fn le(self, other: Self) -> bool {
        self.0 <= other.0
    }

    #[inline]
    fn max_value() -> Self {
        Self(INT8_CODE_MAX)
    }

    #[inline]
    fn min_value() -> Self {
        Self(-INT8_CODE_MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sweep(range: &QuantizationRange, samples: usize) -> impl Iterator<Item = f32> + '_ {
        (0..=samples).map(move |i| range.min + (range.max - range.min) * i as f32 / samples as f32)
    }

    #[test]
    fn test_f32_round_trip_is_identity() {
        let range = QuantizationRange::default();
        for x in [0.0f32, -0.0, 1.0, -1.5, 65025.0, f32::MAX, f32::MIN, f32::EPSILON, 1e-38] {
            assert_eq!(<f32 as NeuralValue>::to_f32(f32::from_f32(x, &range), &range), x);
        }
    }

    #[test]
    fn test_int8_round_trip_within_one_step() {
        for range in [
            QuantizationRange::default(),
            QuantizationRange::new(-100.0, 50.0).unwrap(),
            QuantizationRange::new(-1.0, 3.0).unwrap(),
            QuantizationRange::new(-0.5, 10.0).unwrap(),
        ] {
            let step = range.step();
            for x in sweep(&range, 10_000) {
                let back = INT8Value::from_f32(x, &range).to_f32(&range);
                assert!(
                    (back - x).abs() <= step + f32::EPSILON * x.abs().max(1.0),
                    "range {:?}: {} -> {} exceeds step {}",
                    range,
                    x,
                    back,
                    step
                );
                assert!(range.contains(back) || (back - x).abs() <= step);
            }
        }
    }

    #[test]
    fn test_int8_zero_is_exact() {
        let range = QuantizationRange::new(-100.0, 50.0).unwrap();
        assert_eq!(INT8Value::from_f32(0.0, &range), INT8Value::zero());
        assert_eq!(INT8Value::zero().to_f32(&range), 0.0);
    }

    #[test]
    fn test_int8_out_of_range_clamps() {
        let range = QuantizationRange::new(-10.0, 10.0).unwrap();
        assert_eq!(INT8Value::from_f32(65025.0, &range), INT8Value::max_value());
        assert_eq!(INT8Value::from_f32(-65025.0, &range), INT8Value::min_value());
        assert_eq!(INT8Value::from_f32(f32::NAN, &range), INT8Value::zero());

        let asymmetric = QuantizationRange::new(-100.0, 50.0).unwrap();
        let top = INT8Value::from_f32(1e9, &asymmetric).to_f32(&asymmetric);
        assert!(top <= 50.0);
    }

    #[test]
    fn test_int8_saturating_add_never_overflows() {
        for a in -127i8..=127 {
            for b in -127i8..=127 {
                let sum = INT8Value(a).saturating_add(INT8Value(b));
                assert!(sum.0 >= -127 && sum.0 <= 127);
                assert_eq!(sum.0 as i32, (a as i32 + b as i32).clamp(-127, 127));
                let diff = INT8Value(a).saturating_sub(INT8Value(b));
                assert!(diff.0 >= -127);
            }
        }
    }

    #[test]
    fn test_int8_scaled_multiply_is_fixed_point() {
        assert_eq!(INT8Value(100).scaled_multiply(0.5), INT8Value(50));
        assert_eq!(INT8Value(-100).scaled_multiply(0.5), INT8Value(-50));
        assert_eq!(INT8Value(127).scaled_multiply(1.0), INT8Value(127));
        assert_eq!(INT8Value(127).scaled_multiply(4.0), INT8Value(127));
        assert_eq!(INT8Value(-127).scaled_multiply(4.0), INT8Value(-127));
        assert_eq!(INT8Value(3).scaled_multiply(0.0), INT8Value(0));
        // 0.1 × 10 = 1.0 exactly after rounding
        assert_eq!(INT8Value(10).scaled_multiply(0.1), INT8Value(1));
    }

    #[test]
    fn test_int8_compare_matches_decoded_order() {
        let range = QuantizationRange::default();
        let a = INT8Value::from_f32(12.0, &range);
        let b = INT8Value::from_f32(-3.0, &range);
        assert!(a.ge(b));
        assert!(b.le(a));
        assert!(!b.ge(a));
    }

    #[test]
    fn test_range_validation() {
        assert!(QuantizationRange::new(1.0, 5.0).is_err());
        assert!(QuantizationRange::new(5.0, -5.0).is_err());
        assert!(QuantizationRange::new(f32::NEG_INFINITY, 5.0).is_err());
        assert!(QuantizationRange::new(-5.0, 0.0).is_err());
        assert!(QuantizationRange::new(0.0, 5.0).is_err());
        assert!(QuantizationRange::new(-5.0, 0.5).is_ok());
    }

    #[test]
    fn test_precision_serde_lowercase() {
        let json = serde_json::to_string(&Precision::INT8).unwrap();
        assert_eq!(json, "\"int8\"");
        let back: Precision = serde_json::from_str("\"fp32\"").unwrap();
        assert_eq!(back, Precision::FP32);
    }
}
