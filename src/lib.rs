//! Fixed-point neural-network compute kernels built around a streaming
//! quantized 2D convolution engine.
//!
//! The convolution never materializes an unrolled (im2col) receptive-field
//! matrix. Instead a fixed-capacity circular line buffer holds only the
//! `kernel_height` input rows needed for the output row in flight, refilled
//! FIFO-style as the sweep advances. Strided, dilated convolution is reduced
//! to ordinary convolutions by a polyphase decomposition, one independent
//! phase per (dilation offset) pair.

pub mod error;
pub mod kernels;
pub mod tensor;

pub use error::KernelError;
pub use kernels::conv2d::{conv2d_quantized, ConvParams};
pub use kernels::dilated::dilated_conv2d_quantized;
pub use kernels::matxvec::matxvec_quantized;
pub use kernels::requantize::{
    multiply_by_quantized_multiplier, requantize, QuantInfo, QuantParams, QuantSample,
};
pub use tensor::{DataFormat, TensorView};
