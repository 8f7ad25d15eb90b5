use thiserror::Error;

/// Errors surfaced by the public kernel entry points.
///
/// Every entry point validates its arguments fully before writing any output,
/// so an `Err` guarantees the output buffer was not touched. Numeric
/// saturation is not an error: it is absorbed by the requantizer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KernelError {
    #[error("non-positive dimension in {0}")]
    NonPositiveDim(&'static str),
    #[error("shape mismatch: {0}")]
    ShapeMismatch(&'static str),
    #[error("quantizer out of range: {0}")]
    QuantizerRange(&'static str),
    #[error("activation clamp bounds invalid for output type")]
    ClampRange,
    #[error("inconsistent convolution geometry: {0}")]
    Geometry(&'static str),
    #[error("unsupported stride/dilation combination")]
    UnsupportedStride,
}
