use std::borrow::Cow;

/// Output memory layout for the convolution kernels.
///
/// The flag only changes output stride computation, never the algorithm:
/// `Nhwc` stores channels innermost, `Planar` stores one full H×W plane per
/// output channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFormat {
    Nhwc,
    Planar,
}

#[derive(Debug, Clone)]
pub struct TensorView<'a, T: Clone> {
    pub data: Cow<'a, [T]>,
    pub shape: Cow<'a, [usize]>,
}

impl<'a, T: Clone> TensorView<'a, T> {
    pub fn new(data: &'a [T], shape: &'a [usize]) -> Self {
        let len: usize = shape.iter().product();
        assert_eq!(data.len(), len, "Data length mismatch");
        Self {
            data: Cow::Borrowed(data),
            shape: Cow::Borrowed(shape),
        }
    }

    pub fn from_owned(data: Vec<T>, shape: Vec<usize>) -> Self {
        let len: usize = shape.iter().product();
        assert_eq!(data.len(), len, "Data length mismatch");
        Self {
            data: Cow::Owned(data),
            shape: Cow::Owned(shape),
        }
    }

    pub fn from_slice(data: &'a [T], shape: Vec<usize>) -> Self {
        let len: usize = shape.iter().product();
        assert_eq!(data.len(), len, "Data length mismatch");
        Self {
            data: Cow::Borrowed(data),
            shape: Cow::Owned(shape),
        }
    }

    pub fn to_owned(&self) -> TensorView<'static, T> {
        TensorView::from_owned(self.data.to_vec(), self.shape.to_vec())
    }

    pub fn dim(&self) -> usize {
        self.shape.len()
    }

    pub fn size(&self, dim: usize) -> usize {
        self.shape[dim]
    }
}
