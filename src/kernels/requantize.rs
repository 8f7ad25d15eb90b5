//! Fixed-point requantization: 64-bit accumulator to narrow quantized sample.
//!
//! The per-channel scale is encoded as `(multiplier, shift)` with
//! `scale = multiplier * 2^shift / 2^31`, `multiplier >= 0` and
//! `shift` in `[-31, 15]`.
//!
//! Rounding policy: **single rounding**. The product `acc * multiplier` is
//! formed exactly in 128-bit and reduced by one rounding shift of
//! `31 - shift` bits, round-to-nearest with ties away from zero, then
//! saturated to i32, then clamped to the activation range. Consumers that
//! emulate a double-rounding reference are not bit-compatible with this
//! crate at the rounding boundary.

use crate::error::KernelError;

pub const SHIFT_MIN: i32 = -31;
pub const SHIFT_MAX: i32 = 15;

/// Per-output-channel requantization scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuantParams {
    pub multiplier: i32,
    pub shift: i32,
}

impl QuantParams {
    /// The identity scale (exactly 1.0): `2^30 * 2^1 / 2^31`.
    pub fn identity() -> Self {
        Self {
            multiplier: 1 << 30,
            shift: 1,
        }
    }
}

/// Per-channel scales plus the activation clamp shared by all channels.
#[derive(Debug, Clone, Copy)]
pub struct QuantInfo<'a> {
    pub per_channel: &'a [QuantParams],
    pub activation_min: i32,
    pub activation_max: i32,
}

impl<'a> QuantInfo<'a> {
    pub fn validate<T: QuantSample>(&self, out_channels: usize) -> Result<(), KernelError> {
        if self.per_channel.len() != out_channels {
            return Err(KernelError::ShapeMismatch(
                "quant params length != out_channels",
            ));
        }
        for qp in self.per_channel {
            if qp.multiplier < 0 {
                return Err(KernelError::QuantizerRange("negative multiplier"));
            }
            if qp.shift < SHIFT_MIN || qp.shift > SHIFT_MAX {
                return Err(KernelError::QuantizerRange("shift outside [-31, 15]"));
            }
        }
        if self.activation_min > self.activation_max {
            return Err(KernelError::ClampRange);
        }
        if self.activation_min < T::MIN || self.activation_max > T::MAX {
            return Err(KernelError::ClampRange);
        }
        Ok(())
    }
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for i8 {}
    impl Sealed for i16 {}
}

/// Activation sample type: signed 8-bit (narrow) or signed 16-bit (wide).
pub trait QuantSample:
    sealed::Sealed + Copy + Default + PartialEq + std::fmt::Debug + 'static
{
    const MIN: i32;
    const MAX: i32;

    fn to_i32(self) -> i32;

    /// Narrow a value already clamped into `[Self::MIN, Self::MAX]`.
    fn from_i32(v: i32) -> Self;
}

impl QuantSample for i8 {
    const MIN: i32 = i8::MIN as i32;
    const MAX: i32 = i8::MAX as i32;

    #[inline(always)]
    fn to_i32(self) -> i32 {
        self as i32
    }

    #[inline(always)]
    fn from_i32(v: i32) -> Self {
        debug_assert!(v >= <Self as QuantSample>::MIN && v <= <Self as QuantSample>::MAX);
        v as i8
    }
}

impl QuantSample for i16 {
    const MIN: i32 = i16::MIN as i32;
    const MAX: i32 = i16::MAX as i32;

    #[inline(always)]
    fn to_i32(self) -> i32 {
        self as i32
    }

    #[inline(always)]
    fn from_i32(v: i32) -> Self {
        debug_assert!(v >= <Self as QuantSample>::MIN && v <= <Self as QuantSample>::MAX);
        v as i16
    }
}

/// Scale a 64-bit accumulator by `multiplier * 2^shift / 2^31` with a single
/// rounding step (ties away from zero), saturating into i32.
#[inline]
pub fn multiply_by_quantized_multiplier(acc: i64, multiplier: i32, shift: i32) -> i32 {
    debug_assert!((SHIFT_MIN..=SHIFT_MAX).contains(&shift));
    debug_assert!(multiplier >= 0);
    let total_shift = (31 - shift) as u32;
    let prod = (acc as i128) * (multiplier as i128);
    let half = 1i128 << (total_shift - 1);
    let scaled = if prod >= 0 {
        (prod + half) >> total_shift
    } else {
        -((-prod + half) >> total_shift)
    };
    scaled.clamp(i32::MIN as i128, i32::MAX as i128) as i32
}

/// Requantize one accumulator: multiply, shift, saturate, clamp, narrow.
///
/// Pure and total; overflow is absorbed by saturation, never reported.
#[inline]
pub fn requantize<T: QuantSample>(acc: i64, qp: QuantParams, out_min: i32, out_max: i32) -> T {
    let v = multiply_by_quantized_multiplier(acc, qp.multiplier, qp.shift);
    T::from_i32(v.clamp(out_min, out_max))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_scale_reproduces_clamp() {
        let qp = QuantParams::identity();
        for acc in [-200i64, -128, -1, 0, 1, 42, 127, 300] {
            let got: i8 = requantize(acc, qp, -128, 127);
            let want = acc.clamp(-128, 127) as i8;
            assert_eq!(got, want, "acc={}", acc);
        }
    }

    #[test]
    fn test_half_scale_ties_away_from_zero() {
        // scale = 0.5
        let qp = QuantParams {
            multiplier: 1 << 30,
            shift: 0,
        };
        assert_eq!(multiply_by_quantized_multiplier(1, qp.multiplier, qp.shift), 1);
        assert_eq!(multiply_by_quantized_multiplier(2, qp.multiplier, qp.shift), 1);
        assert_eq!(multiply_by_quantized_multiplier(3, qp.multiplier, qp.shift), 2);
        assert_eq!(multiply_by_quantized_multiplier(-1, qp.multiplier, qp.shift), -1);
        assert_eq!(multiply_by_quantized_multiplier(-2, qp.multiplier, qp.shift), -1);
        assert_eq!(multiply_by_quantized_multiplier(-3, qp.multiplier, qp.shift), -2);
    }

    #[test]
    fn test_right_shift_scale() {
        // scale = 2^-4
        let qp = QuantParams {
            multiplier: 1 << 30,
            shift: -3,
        };
        assert_eq!(multiply_by_quantized_multiplier(16, qp.multiplier, qp.shift), 1);
        assert_eq!(multiply_by_quantized_multiplier(24, qp.multiplier, qp.shift), 2);
        assert_eq!(multiply_by_quantized_multiplier(-16, qp.multiplier, qp.shift), -1);
        assert_eq!(multiply_by_quantized_multiplier(7, qp.multiplier, qp.shift), 0);
        assert_eq!(multiply_by_quantized_multiplier(8, qp.multiplier, qp.shift), 1);
        assert_eq!(multiply_by_quantized_multiplier(-8, qp.multiplier, qp.shift), -1);
    }

    #[test]
    fn test_saturation() {
        let qp = QuantParams::identity();
        assert_eq!(
            multiply_by_quantized_multiplier(i64::MAX / 4, qp.multiplier, qp.shift),
            i32::MAX
        );
        assert_eq!(
            multiply_by_quantized_multiplier(i64::MIN / 4, qp.multiplier, qp.shift),
            i32::MIN
        );
        let lo: i16 = requantize(i64::MIN / 2, qp, i16::MIN as i32, i16::MAX as i32);
        assert_eq!(lo, i16::MIN);
    }

    #[test]
    fn test_clamp_applied_after_saturation() {
        let qp = QuantParams::identity();
        let got: i8 = requantize(1000, qp, -6, 6);
        assert_eq!(got, 6);
        let got: i8 = requantize(-1000, qp, -6, 6);
        assert_eq!(got, -6);
    }

    #[test]
    fn test_narrowing_exact_at_type_bounds() {
        // Narrowing must hold right at the output type's limits for both
        // sample widths.
        assert_eq!(<i8 as QuantSample>::from_i32(i8::MIN as i32), i8::MIN);
        assert_eq!(<i8 as QuantSample>::from_i32(i8::MAX as i32), i8::MAX);
        assert_eq!(<i16 as QuantSample>::from_i32(i16::MIN as i32), i16::MIN);
        assert_eq!(<i16 as QuantSample>::from_i32(i16::MAX as i32), i16::MAX);

        let qp = QuantParams::identity();
        let lo: i8 = requantize(i8::MIN as i64, qp, i8::MIN as i32, i8::MAX as i32);
        let hi: i8 = requantize(i8::MAX as i64, qp, i8::MIN as i32, i8::MAX as i32);
        assert_eq!((lo, hi), (i8::MIN, i8::MAX));
        let lo: i16 = requantize(i16::MIN as i64, qp, i16::MIN as i32, i16::MAX as i32);
        let hi: i16 = requantize(i16::MAX as i64, qp, i16::MIN as i32, i16::MAX as i32);
        assert_eq!((lo, hi), (i16::MIN, i16::MAX));
    }

    #[test]
    fn test_validate_rejects_bad_params() {
        let good = [QuantParams::identity(); 2];
        let info = QuantInfo {
            per_channel: &good,
            activation_min: -128,
            activation_max: 127,
        };
        assert!(info.validate::<i8>(2).is_ok());
        assert!(info.validate::<i8>(3).is_err());

        let bad_shift = [QuantParams {
            multiplier: 1,
            shift: 16,
        }];
        let info = QuantInfo {
            per_channel: &bad_shift,
            activation_min: -128,
            activation_max: 127,
        };
        assert!(info.validate::<i8>(1).is_err());

        let neg_mult = [QuantParams {
            multiplier: -1,
            shift: 0,
        }];
        let info = QuantInfo {
            per_channel: &neg_mult,
            activation_min: -128,
            activation_max: 127,
        };
        assert!(info.validate::<i8>(1).is_err());

        // i8 clamp bounds must fit in i8.
        let info = QuantInfo {
            per_channel: &good,
            activation_min: -32768,
            activation_max: 32767,
        };
        assert!(info.validate::<i8>(2).is_err());
        assert!(info.validate::<i16>(2).is_ok());
    }
}
