// Allow unsafe operations in unsafe functions without explicit unsafe blocks
#![allow(unsafe_op_in_unsafe_fn)]

use core::arch::aarch64::*;

/// Exact i64 dot product of two signed 8-bit spans.
///
/// Widening multiply into 16-bit lanes, pairwise-accumulated into 32-bit
/// lanes, reduced to i64 once at the end. All arithmetic is exact, so the
/// result is bit-equal to the scalar loop. Lane sums stay within i32 for
/// spans up to several hundred thousand elements, far beyond any supported
/// channel vector.
#[inline]
pub fn dot_span_i8(kernel: &[i8], x: &[i8]) -> i64 {
    assert_eq!(kernel.len(), x.len());
    unsafe { dot_span_i8_inner(kernel.as_ptr(), x.as_ptr(), kernel.len()) }
}

#[inline]
unsafe fn dot_span_i8_inner(kernel: *const i8, x: *const i8, n: usize) -> i64 {
    let mut acc0 = vdupq_n_s32(0);
    let mut acc1 = vdupq_n_s32(0);
    let mut i = 0;
    while i + 16 <= n {
        let k0 = vld1_s8(kernel.add(i));
        let v0 = vld1_s8(x.add(i));
        let k1 = vld1_s8(kernel.add(i + 8));
        let v1 = vld1_s8(x.add(i + 8));
        acc0 = vpadalq_s16(acc0, vmull_s8(k0, v0));
        acc1 = vpadalq_s16(acc1, vmull_s8(k1, v1));
        i += 16;
    }
    while i + 8 <= n {
        let k0 = vld1_s8(kernel.add(i));
        let v0 = vld1_s8(x.add(i));
        acc0 = vpadalq_s16(acc0, vmull_s8(k0, v0));
        i += 8;
    }
    let mut sum = vaddlvq_s32(acc0) + vaddlvq_s32(acc1);
    while i < n {
        sum += *kernel.add(i) as i64 * *x.add(i) as i64;
        i += 1;
    }
    sum
}
