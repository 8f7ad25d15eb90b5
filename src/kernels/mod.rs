pub mod conv2d;
pub mod dilated;
pub mod dot;
pub mod matxvec;
#[cfg(target_arch = "aarch64")]
pub mod neon;
pub mod requantize;
pub mod ring;
pub mod utils;

pub use conv2d::{conv2d_quantized, ConvParams};
pub use dilated::dilated_conv2d_quantized;
pub use dot::{dot_span, dot_span_scalar, dot_span_unrolled, DotPath, SpanDot};
pub use matxvec::matxvec_quantized;
pub use requantize::{
    multiply_by_quantized_multiplier, requantize, QuantInfo, QuantParams, QuantSample,
};
pub use ring::{LineBuffer, LineWindow};
