//! Inner span dot products for the quantized engines.
//!
//! One interface, several strategies: a plain scalar loop, a 4-way unrolled
//! loop, and (on aarch64) a NEON widening multiply-accumulate. Accumulation
//! is exact integer arithmetic throughout, so every strategy produces
//! bit-identical sums and the choice is made once at the entry point.

use crate::kernels::requantize::QuantSample;

/// Dot-product strategy, selected at the top of the public entry points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DotPath {
    Scalar,
    Fast,
}

impl DotPath {
    /// Short spans are not worth the unrolled/SIMD setup.
    pub fn select(span: usize) -> Self {
        if span >= 8 {
            DotPath::Fast
        } else {
            DotPath::Scalar
        }
    }
}

/// Sample types with an arch-specialized span dot.
pub trait SpanDot: QuantSample {
    /// Must be bit-equal to [`dot_span_scalar`].
    fn dot_span_fast(kernel: &[i8], x: &[Self]) -> i64;
}

impl SpanDot for i8 {
    #[inline]
    fn dot_span_fast(kernel: &[i8], x: &[Self]) -> i64 {
        #[cfg(target_arch = "aarch64")]
        {
            crate::kernels::neon::dot_span_i8(kernel, x)
        }
        #[cfg(not(target_arch = "aarch64"))]
        {
            dot_span_unrolled(kernel, x)
        }
    }
}

impl SpanDot for i16 {
    #[inline]
    fn dot_span_fast(kernel: &[i8], x: &[Self]) -> i64 {
        dot_span_unrolled(kernel, x)
    }
}

#[inline]
pub fn dot_span<T: SpanDot>(path: DotPath, kernel: &[i8], x: &[T]) -> i64 {
    match path {
        DotPath::Scalar => dot_span_scalar(kernel, x),
        DotPath::Fast => T::dot_span_fast(kernel, x),
    }
}

pub fn dot_span_scalar<T: QuantSample>(kernel: &[i8], x: &[T]) -> i64 {
    debug_assert_eq!(kernel.len(), x.len());
    let mut sum = 0i64;
    for (&k, &v) in kernel.iter().zip(x.iter()) {
        sum += k as i64 * v.to_i32() as i64;
    }
    sum
}

pub fn dot_span_unrolled<T: QuantSample>(kernel: &[i8], x: &[T]) -> i64 {
    debug_assert_eq!(kernel.len(), x.len());
    let n = kernel.len();
    let (mut s0, mut s1, mut s2, mut s3) = (0i64, 0i64, 0i64, 0i64);
    let mut i = 0;
    while i + 4 <= n {
        s0 += kernel[i] as i64 * x[i].to_i32() as i64;
        s1 += kernel[i + 1] as i64 * x[i + 1].to_i32() as i64;
        s2 += kernel[i + 2] as i64 * x[i + 2].to_i32() as i64;
        s3 += kernel[i + 3] as i64 * x[i + 3].to_i32() as i64;
        i += 4;
    }
    let mut sum = s0 + s1 + s2 + s3;
    while i < n {
        sum += kernel[i] as i64 * x[i].to_i32() as i64;
        i += 1;
    }
    sum
}
