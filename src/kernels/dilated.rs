//! Dilation polyphase scheduler.
//!
//! A dilated, strided convolution is split into independent interleaved
//! sub-lattices ("phases") by stride/dilation GCD arithmetic; each phase is
//! an ordinary non-dilated convolution over a subsampled input lattice with
//! its own circular line buffer, and its raw output indices map back into
//! the full output tensor through `out0 + k * (dilation / gcd)`. The union
//! of all phases covers every output pixel exactly once.

use crate::error::KernelError;
use crate::kernels::conv2d::{
    emit_all_bias_only, run_phase, validate_conv_args, ConvParams, OutStrides, Phase,
};
use crate::kernels::dot::SpanDot;
use crate::kernels::requantize::QuantInfo;
use crate::kernels::utils;
use crate::tensor::{DataFormat, TensorView};

/// One axis of a phase: dense lattice start `j0`, dilated stride, and the
/// arithmetic progression of full-output positions the phase owns.
struct AxisPhase {
    j0: usize,
    stride_d: usize,
    out0: usize,
    out_step: usize,
    count: usize,
}

/// Alignment of one dilation offset's lattice with the stride-sampled output
/// positions, or `None` when the offset contributes no output at all.
fn axis_phase(
    offset: usize,
    stride: usize,
    dilation: usize,
    out_extent: usize,
) -> Option<AxisPhase> {
    let g = utils::gcd(stride, dilation);
    let stride_d = stride / g;
    // Linear search over one period of the dilated stride for the first
    // dense lattice point that lands on an actual output position.
    let j0 = (0..stride_d).find(|&j| (offset + j * dilation) % stride == 0)?;
    let out0 = (offset + j0 * dilation) / stride;
    if out0 >= out_extent {
        return None;
    }
    let out_step = dilation / g;
    let count = (out_extent - out0 + out_step - 1) / out_step;
    Some(AxisPhase {
        j0,
        stride_d,
        out0,
        out_step,
        count,
    })
}

pub(crate) fn build_phases(params: &ConvParams) -> Vec<Phase> {
    let mut phases = Vec::new();
    for dh_off in 0..params.dilation_h {
        let Some(ah) = axis_phase(
            dh_off,
            params.stride_h,
            params.dilation_h,
            params.out_height,
        ) else {
            continue;
        };
        for dw_off in 0..params.dilation_w {
            let Some(aw) = axis_phase(
                dw_off,
                params.stride_w,
                params.dilation_w,
                params.out_width,
            ) else {
                continue;
            };
            phases.push(Phase {
                j0_w: aw.j0,
                stride_w_d: aw.stride_d,
                out_cols: aw.count,
                j0_h: ah.j0,
                stride_h_d: ah.stride_d,
                out_rows: ah.count,
                base_w: dw_off as i64 - params.pad_left as i64,
                step_w: params.dilation_w,
                base_h: dh_off as i64 - params.pad_top as i64,
                step_h: params.dilation_h,
                out_x0: aw.out0,
                out_x_step: aw.out_step,
                out_y0: ah.out0,
                out_y_step: ah.out_step,
            });
        }
    }
    phases
}

/// Quantized 2D convolution with dilation. With `dilation == 1` this runs
/// the single trivial phase and is bit-identical to
/// [`crate::conv2d_quantized`].
pub fn dilated_conv2d_quantized<'a, T: SpanDot>(
    input: &TensorView<'_, T>,
    kernel: &TensorView<'_, i8>,
    bias: &[i64],
    params: &ConvParams,
    quant: &QuantInfo<'_>,
    out: &'a mut Vec<T>,
) -> Result<TensorView<'a, T>, KernelError> {
    validate_conv_args(input, kernel, bias, params, quant)?;

    let (in_h, in_w, ci) = (input.size(1), input.size(2), input.size(3));
    let (co, kh, kw) = (kernel.size(0), kernel.size(1), kernel.size(2));
    let (out_h, out_w) = (params.out_height, params.out_width);

    let total = co * out_h * out_w;
    utils::ensure_capacity(out, total);
    let strides = OutStrides::for_format(params.data_format, out_h, out_w, co);

    let eff_kw = params.dilation_w * (kw - 1) + 1;
    let eff_kh = params.dilation_h * (kh - 1) + 1;
    if eff_kw > in_w + params.pad_left + params.pad_right
        || eff_kh > in_h + params.pad_top + params.pad_bottom
    {
        emit_all_bias_only(out, &strides, out_h, out_w, bias, quant);
    } else {
        for phase in build_phases(params) {
            run_phase(
                &input.data, in_h, in_w, ci, &kernel.data, kh, kw, co, bias, quant, &phase,
                out, &strides,
            );
        }
    }

    let shape = match params.data_format {
        DataFormat::Nhwc => vec![1, out_h, out_w, co],
        DataFormat::Planar => vec![1, co, out_h, out_w],
    };
    Ok(TensorView::from_slice(out, shape))
}
