//! Quantized matrix × vector product with per-channel requantization.
//!
//! The flat (non-streaming) counterpart of the convolution's dot-product
//! engine: one i64 accumulator per output row, seeded from the bias, then
//! requantized. Matrix shape: [rows, cols], signed 8-bit weights.

use crate::error::KernelError;
use crate::kernels::dot::{dot_span, DotPath, SpanDot};
use crate::kernels::requantize::{requantize, QuantInfo};
use crate::kernels::utils;
use crate::tensor::TensorView;

pub fn matxvec_quantized<'a, T: SpanDot>(
    mat: &TensorView<'_, i8>,
    vec_in: &TensorView<'_, T>,
    bias: &[i64],
    quant: &QuantInfo<'_>,
    out: &'a mut Vec<T>,
) -> Result<TensorView<'a, T>, KernelError> {
    if mat.dim() != 2 {
        return Err(KernelError::ShapeMismatch("matrix must be rank-2"));
    }
    let (rows, cols) = (mat.size(0), mat.size(1));
    if rows == 0 || cols == 0 {
        return Err(KernelError::NonPositiveDim("matrix extent"));
    }
    if vec_in.dim() != 1 || vec_in.size(0) != cols {
        return Err(KernelError::ShapeMismatch("vector length != matrix cols"));
    }
    if bias.len() != rows {
        return Err(KernelError::ShapeMismatch("bias length != matrix rows"));
    }
    quant.validate::<T>(rows)?;

    utils::ensure_capacity(out, rows);
    let path = DotPath::select(cols);
    let x = &vec_in.data;
    for r in 0..rows {
        let row = &mat.data[r * cols..(r + 1) * cols];
        let acc = bias[r] + dot_span(path, row, x);
        out[r] = requantize(
            acc,
            quant.per_channel[r],
            quant.activation_min,
            quant.activation_max,
        );
    }
    Ok(TensorView::from_slice(out, vec![rows]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::requantize::QuantParams;

    #[test]
    fn test_matxvec_identity_quant() {
        let mat = TensorView::from_owned(vec![1i8, 2, 3, -1, 0, 1], vec![2, 3]);
        let x = TensorView::from_owned(vec![10i8, 20, 30], vec![3]);
        let qp = [QuantParams::identity(); 2];
        let quant = QuantInfo {
            per_channel: &qp,
            activation_min: -32768,
            activation_max: 32767,
        };
        let mut out = Vec::new();
        let x16 = TensorView::from_owned(vec![10i16, 20, 30], vec![3]);
        let res = matxvec_quantized(&mat, &x16, &[5, -5], &quant, &mut out).unwrap();
        // row0: 10 + 40 + 90 + 5 = 145; row1: -10 + 30 - 5 = 15
        assert_eq!(res.data.as_ref(), &[145i16, 15]);

        let qp = [QuantParams::identity(); 2];
        let quant = QuantInfo {
            per_channel: &qp,
            activation_min: -128,
            activation_max: 127,
        };
        let mut out8 = Vec::new();
        let res = matxvec_quantized(&mat, &x, &[5, -5], &quant, &mut out8).unwrap();
        // Same sums, saturated into the i8 clamp.
        assert_eq!(res.data.as_ref(), &[127i8, 15]);
    }

    #[test]
    fn test_matxvec_shape_errors() {
        let mat = TensorView::from_owned(vec![1i8, 2], vec![1, 2]);
        let x = TensorView::from_owned(vec![1i8, 2, 3], vec![3]);
        let qp = [QuantParams::identity(); 1];
        let quant = QuantInfo {
            per_channel: &qp,
            activation_min: -128,
            activation_max: 127,
        };
        let mut out = Vec::new();
        assert!(matxvec_quantized(&mat, &x, &[0], &quant, &mut out).is_err());
    }
}
