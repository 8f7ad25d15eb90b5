//! Streaming quantized 2D convolution.
//!
//! Input shape: [1, H, W, C_in] (NHWC, batch is the caller's outer loop).
//! Kernel shape: [C_out, kH, kW, C_in], signed 8-bit weights.
//! Bias: one i64 per output channel.
//!
//! The sweep never materializes an im2col matrix: a circular line buffer
//! holds the `kernel_height` input rows needed for the output row in flight,
//! each row already resampled onto the convolution's column lattice with the
//! horizontal padding zero-filled. Output columns whose kernel footprint
//! lies entirely inside the horizontal padding are emitted as bias-only
//! samples without touching the buffer or the dot-product engine.

use crate::error::KernelError;
use crate::kernels::dot::{dot_span, DotPath, SpanDot};
use crate::kernels::requantize::{requantize, QuantInfo, QuantSample};
use crate::kernels::ring::LineBuffer;
use crate::kernels::utils;
use crate::tensor::{DataFormat, TensorView};

/// Engine vector width: channel vectors in the line buffer are padded to
/// this many elements so span dots read whole lanes.
pub(crate) const CHANNEL_ALIGN: usize = 4;

/// Convolution geometry. Output height/width are caller-specified; a kernel
/// larger than the padded input is legal and yields bias-only output.
#[derive(Debug, Clone)]
pub struct ConvParams {
    pub stride_h: usize,
    pub stride_w: usize,
    pub pad_top: usize,
    pub pad_left: usize,
    pub pad_bottom: usize,
    pub pad_right: usize,
    pub dilation_h: usize,
    pub dilation_w: usize,
    pub out_height: usize,
    pub out_width: usize,
    pub data_format: DataFormat,
}

impl ConvParams {
    pub fn new(strides: [usize; 2], pads: [usize; 4], out_size: [usize; 2]) -> Self {
        Self {
            stride_h: strides[0],
            stride_w: strides[1],
            pad_top: pads[0],
            pad_left: pads[1],
            pad_bottom: pads[2],
            pad_right: pads[3],
            dilation_h: 1,
            dilation_w: 1,
            out_height: out_size[0],
            out_width: out_size[1],
            data_format: DataFormat::Nhwc,
        }
    }

    pub fn with_dilation(mut self, dilation_h: usize, dilation_w: usize) -> Self {
        self.dilation_h = dilation_h;
        self.dilation_w = dilation_w;
        self
    }

    pub fn with_format(mut self, format: DataFormat) -> Self {
        self.data_format = format;
        self
    }

    pub fn validate(&self) -> Result<(), KernelError> {
        if self.stride_h == 0 || self.stride_w == 0 {
            return Err(KernelError::NonPositiveDim("stride"));
        }
        if self.dilation_h == 0 || self.dilation_w == 0 {
            return Err(KernelError::NonPositiveDim("dilation"));
        }
        if self.out_height == 0 || self.out_width == 0 {
            return Err(KernelError::NonPositiveDim("output extent"));
        }
        Ok(())
    }
}

/// Output strides for one sample; index = oy*y + ox*x + oc*c.
#[derive(Debug, Clone, Copy)]
pub(crate) struct OutStrides {
    pub y: usize,
    pub x: usize,
    pub c: usize,
}

impl OutStrides {
    pub fn for_format(format: DataFormat, out_h: usize, out_w: usize, co: usize) -> Self {
        match format {
            DataFormat::Nhwc => Self {
                y: out_w * co,
                x: co,
                c: 1,
            },
            DataFormat::Planar => Self {
                y: out_w,
                x: 1,
                c: out_h * out_w,
            },
        }
    }
}

/// One polyphase sub-lattice, in phase-domain coordinates.
///
/// Plane element `t` of a resident row maps to real input column
/// `base_w + t*step_w` (negative or past the edge means zero padding), and
/// plane row `t` maps to real input row `base_h + t*step_h`. The phase's
/// output column `m` has dense index `j0_w + m*stride_w_d` and lands at full
/// output column `out_x0 + m*out_x_step`. The non-dilated convolution is the
/// single phase with unit steps and zero offsets.
#[derive(Debug, Clone)]
pub(crate) struct Phase {
    pub j0_w: usize,
    pub stride_w_d: usize,
    pub out_cols: usize,
    pub j0_h: usize,
    pub stride_h_d: usize,
    pub out_rows: usize,
    pub base_w: i64,
    pub step_w: usize,
    pub base_h: i64,
    pub step_h: usize,
    pub out_x0: usize,
    pub out_x_step: usize,
    pub out_y0: usize,
    pub out_y_step: usize,
}

impl Phase {
    pub fn direct(params: &ConvParams) -> Self {
        Self {
            j0_w: 0,
            stride_w_d: params.stride_w,
            out_cols: params.out_width,
            j0_h: 0,
            stride_h_d: params.stride_h,
            out_rows: params.out_height,
            base_w: -(params.pad_left as i64),
            step_w: 1,
            base_h: -(params.pad_top as i64),
            step_h: 1,
            out_x0: 0,
            out_x_step: 1,
            out_y0: 0,
            out_y_step: 1,
        }
    }
}

/// Count of leading output columns whose footprint `[j, j+kw)` lies entirely
/// before the first real plane element `t_min`.
pub(crate) fn left_pad_only_columns(
    j0: usize,
    stride_d: usize,
    kw: usize,
    t_min: usize,
    out_cols: usize,
) -> usize {
    if t_min >= j0 + kw {
        (((t_min - kw - j0) / stride_d) + 1).min(out_cols)
    } else {
        0
    }
}

/// Index of the first trailing output column whose footprint starts at or
/// past the last real plane element; columns in `[first_right, out_cols)`
/// are right-pad-only.
pub(crate) fn first_right_pad_only_column(
    j0: usize,
    stride_d: usize,
    t_min: usize,
    n_real: usize,
    out_cols: usize,
) -> usize {
    let limit = (t_min + n_real) as i64 - j0 as i64;
    let first = utils::ceil_div(limit, stride_d as i64).max(0) as usize;
    first.min(out_cols)
}

pub(crate) fn validate_conv_args<T: QuantSample>(
    input: &TensorView<'_, T>,
    kernel: &TensorView<'_, i8>,
    bias: &[i64],
    params: &ConvParams,
    quant: &QuantInfo<'_>,
) -> Result<(), KernelError> {
    params.validate()?;
    if input.dim() != 4 {
        return Err(KernelError::ShapeMismatch("input must be rank-4 [1,H,W,C]"));
    }
    if input.size(0) != 1 {
        return Err(KernelError::Geometry("batch dimension must be 1"));
    }
    if input.size(1) == 0 || input.size(2) == 0 || input.size(3) == 0 {
        return Err(KernelError::NonPositiveDim("input extent"));
    }
    if kernel.dim() != 4 {
        return Err(KernelError::ShapeMismatch(
            "kernel must be rank-4 [Co,kH,kW,Ci]",
        ));
    }
    if kernel.size(1) == 0 || kernel.size(2) == 0 || kernel.size(0) == 0 {
        return Err(KernelError::NonPositiveDim("kernel extent"));
    }
    if kernel.size(3) != input.size(3) {
        return Err(KernelError::ShapeMismatch(
            "kernel input channels != input channels",
        ));
    }
    let co = kernel.size(0);
    if bias.len() != co {
        return Err(KernelError::ShapeMismatch("bias length != out_channels"));
    }
    quant.validate::<T>(co)?;
    Ok(())
}

/// Bias-only output for every pixel; used when the effective kernel exceeds
/// the padded input in either axis.
pub(crate) fn emit_all_bias_only<T: QuantSample>(
    out: &mut [T],
    strides: &OutStrides,
    out_h: usize,
    out_w: usize,
    bias: &[i64],
    quant: &QuantInfo<'_>,
) {
    let bias_q: Vec<T> = bias
        .iter()
        .zip(quant.per_channel)
        .map(|(&b, &qp)| requantize(b, qp, quant.activation_min, quant.activation_max))
        .collect();
    for oy in 0..out_h {
        for ox in 0..out_w {
            let base = oy * strides.y + ox * strides.x;
            for (oc, &v) in bias_q.iter().enumerate() {
                out[base + oc * strides.c] = v;
            }
        }
    }
}

/// Run one (non-dilated-equivalent) convolution phase: emit the bias-only
/// margins, then sweep the middle columns over the circular line buffer.
pub(crate) fn run_phase<T: SpanDot>(
    input: &[T],
    in_h: usize,
    in_w: usize,
    ci: usize,
    kernel: &[i8],
    kh: usize,
    kw: usize,
    co: usize,
    bias: &[i64],
    quant: &QuantInfo<'_>,
    phase: &Phase,
    out: &mut [T],
    strides: &OutStrides,
) {
    if phase.out_cols == 0 || phase.out_rows == 0 {
        return;
    }

    let c_pad = utils::align_up(ci, CHANNEL_ALIGN);
    let plane_cols = phase.j0_w + (phase.out_cols - 1) * phase.stride_w_d + kw;

    // First real plane element and the count of real elements per row.
    let t_min_w = if phase.base_w < 0 {
        utils::ceil_div(-phase.base_w, phase.step_w as i64) as usize
    } else {
        0
    };
    let last_real = (in_w as i64 - 1 - phase.base_w).div_euclid(phase.step_w as i64);
    let n_real_w = if last_real >= t_min_w as i64 {
        (last_real as usize) - t_min_w + 1
    } else {
        0
    };

    let left = left_pad_only_columns(phase.j0_w, phase.stride_w_d, kw, t_min_w, phase.out_cols);
    let first_right = first_right_pad_only_column(
        phase.j0_w,
        phase.stride_w_d,
        t_min_w,
        n_real_w,
        phase.out_cols,
    )
    .max(left);

    let bias_q: Vec<T> = bias
        .iter()
        .zip(quant.per_channel)
        .map(|(&b, &qp)| requantize(b, qp, quant.activation_min, quant.activation_max))
        .collect();

    // Pad-only margins: bias replicated across every output row.
    for m in (0..left).chain(first_right..phase.out_cols) {
        let ox = phase.out_x0 + m * phase.out_x_step;
        for r in 0..phase.out_rows {
            let oy = phase.out_y0 + r * phase.out_y_step;
            let base = oy * strides.y + ox * strides.x;
            for (oc, &v) in bias_q.iter().enumerate() {
                out[base + oc * strides.c] = v;
            }
        }
    }

    if left >= first_right {
        // Entire width is padding-only; the sliding loop runs zero times.
        return;
    }

    let kernel_row_span = kw * ci;
    // Lane-aligned channels dot one whole kernel row per span; otherwise the
    // spans are single channel vectors.
    let path = if c_pad == ci {
        DotPath::select(kernel_row_span)
    } else {
        DotPath::select(ci)
    };
    let mut lb = LineBuffer::<T>::new(kh, plane_cols * c_pad);
    let mut next_t: i64 = phase.j0_h as i64;

    for r in 0..phase.out_rows {
        let i_r = (phase.j0_h + r * phase.stride_h_d) as i64;
        // Scroll the window down to row i_r; rows that would scroll straight
        // out again (stride taller than the kernel) are skipped, not pushed.
        for t in next_t.max(i_r)..(i_r + kh as i64) {
            let q_h = phase.base_h + t * phase.step_h as i64;
            if q_h < 0 || q_h >= in_h as i64 {
                lb.push_zero_row();
            } else {
                let row_off = q_h as usize * in_w * ci;
                let in_row = &input[row_off..row_off + in_w * ci];
                lb.push_row_with(|plane| {
                    fill_plane_row(plane, in_row, in_w, ci, c_pad, phase.base_w, phase.step_w)
                });
            }
        }
        next_t = i_r + kh as i64;

        let window = lb.window();
        let oy = phase.out_y0 + r * phase.out_y_step;
        for m in left..first_right {
            let j = phase.j0_w + m * phase.stride_w_d;
            let ox = phase.out_x0 + m * phase.out_x_step;
            let base = oy * strides.y + ox * strides.x;
            for oc in 0..co {
                let k_off = oc * kh * kernel_row_span;
                let mut acc = bias[oc];
                if c_pad == ci {
                    // Channel count is already lane-aligned: one span per
                    // kernel row.
                    for h in 0..kh {
                        let krow = &kernel[k_off + h * kernel_row_span..][..kernel_row_span];
                        let xrow = &window.row(h)[j * ci..][..kernel_row_span];
                        acc += dot_span(path, krow, xrow);
                    }
                } else {
                    for h in 0..kh {
                        let row = window.row(h);
                        for t_w in 0..kw {
                            let k0 = k_off + (h * kw + t_w) * ci;
                            let x0 = (j + t_w) * c_pad;
                            acc += dot_span(path, &kernel[k0..k0 + ci], &row[x0..x0 + ci]);
                        }
                    }
                }
                out[base + oc * strides.c] = requantize(
                    acc,
                    quant.per_channel[oc],
                    quant.activation_min,
                    quant.activation_max,
                );
            }
        }
    }
}

/// Resample one real input row onto the phase's column lattice. The plane is
/// pre-zeroed; only the in-bounds span is written.
fn fill_plane_row<T: Copy>(
    plane: &mut [T],
    in_row: &[T],
    in_w: usize,
    ci: usize,
    c_pad: usize,
    base_w: i64,
    step_w: usize,
) {
    let plane_cols = plane.len() / c_pad;
    if step_w == 1 && c_pad == ci {
        // Contiguous case: zero left border, one copy, zero right border.
        let t0 = (-base_w).max(0) as usize;
        let t1 = ((in_w as i64 - base_w).max(0) as usize).min(plane_cols);
        if t0 < t1 {
            let src = ((base_w + t0 as i64) as usize) * ci;
            plane[t0 * ci..t1 * ci].copy_from_slice(&in_row[src..src + (t1 - t0) * ci]);
        }
        return;
    }
    for t in 0..plane_cols {
        let q = base_w + (t * step_w) as i64;
        if q >= 0 && q < in_w as i64 {
            let src = q as usize * ci;
            plane[t * c_pad..t * c_pad + ci].copy_from_slice(&in_row[src..src + ci]);
        }
    }
}

/// Quantized 2D convolution, stride >= 1, dilation 1.
///
/// Either fully computes the output or returns an error before any output
/// byte is written. Use [`crate::dilated_conv2d_quantized`] for dilation > 1.
pub fn conv2d_quantized<'a, T: SpanDot>(
    input: &TensorView<'_, T>,
    kernel: &TensorView<'_, i8>,
    bias: &[i64],
    params: &ConvParams,
    quant: &QuantInfo<'_>,
    out: &'a mut Vec<T>,
) -> Result<TensorView<'a, T>, KernelError> {
    if params.dilation_h != 1 || params.dilation_w != 1 {
        return Err(KernelError::UnsupportedStride);
    }
    validate_conv_args(input, kernel, bias, params, quant)?;

    let (in_h, in_w, ci) = (input.size(1), input.size(2), input.size(3));
    let (co, kh, kw) = (kernel.size(0), kernel.size(1), kernel.size(2));
    let (out_h, out_w) = (params.out_height, params.out_width);

    let total = co * out_h * out_w;
    utils::ensure_capacity(out, total);
    let strides = OutStrides::for_format(params.data_format, out_h, out_w, co);

    if kw > in_w + params.pad_left + params.pad_right
        || kh > in_h + params.pad_top + params.pad_bottom
    {
        emit_all_bias_only(out, &strides, out_h, out_w, bias, quant);
    } else {
        let phase = Phase::direct(params);
        run_phase(
            &input.data, in_h, in_w, ci, &kernel.data, kh, kw, co, bias, quant, &phase, out,
            &strides,
        );
    }

    let shape = match params.data_format {
        DataFormat::Nhwc => vec![1, out_h, out_w, co],
        DataFormat::Planar => vec![1, co, out_h, out_w],
    };
    Ok(TensorView::from_slice(out, shape))
}
