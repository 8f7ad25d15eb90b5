// Naive reference implementations - correct but slow. Used to cross-check
// the streaming engine bit-for-bit.

use ringconv::{requantize, QuantInfo, QuantSample};

#[allow(clippy::too_many_arguments)]
pub fn conv2d_ref<T: QuantSample>(
    input: &[T],
    in_h: usize,
    in_w: usize,
    ci: usize,
    kernel: &[i8],
    co: usize,
    kh: usize,
    kw: usize,
    bias: &[i64],
    stride: [usize; 2],
    pad: [usize; 4], // top, left, bottom, right
    dilation: [usize; 2],
    out_h: usize,
    out_w: usize,
    quant: &QuantInfo<'_>,
) -> Vec<T> {
    let [sh, sw] = stride;
    let [pad_top, pad_left, _, _] = pad;
    let [dh, dw] = dilation;
    let mut out = vec![T::default(); out_h * out_w * co];
    for oy in 0..out_h {
        for ox in 0..out_w {
            for oc in 0..co {
                let mut acc = bias[oc];
                for ky in 0..kh {
                    let iy = (oy * sh + ky * dh) as i64 - pad_top as i64;
                    if iy < 0 || iy >= in_h as i64 {
                        continue;
                    }
                    for kx in 0..kw {
                        let ix = (ox * sw + kx * dw) as i64 - pad_left as i64;
                        if ix < 0 || ix >= in_w as i64 {
                            continue;
                        }
                        for ic in 0..ci {
                            let k = kernel[((oc * kh + ky) * kw + kx) * ci + ic] as i64;
                            let x = input[(iy as usize * in_w + ix as usize) * ci + ic]
                                .to_i32() as i64;
                            acc += k * x;
                        }
                    }
                }
                out[(oy * out_w + ox) * co + oc] = requantize(
                    acc,
                    quant.per_channel[oc],
                    quant.activation_min,
                    quant.activation_max,
                );
            }
        }
    }
    out
}
