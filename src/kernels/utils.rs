pub fn ensure_capacity<T: Copy + Default>(v: &mut Vec<T>, len: usize) {
    if v.len() != len {
        v.clear();
        v.resize(len, T::default());
    }
}

pub fn gcd(mut a: usize, mut b: usize) -> usize {
    while b != 0 {
        let r = a % b;
        a = b;
        b = r;
    }
    a
}

/// Ceiling division for possibly-negative numerators.
pub fn ceil_div(a: i64, b: i64) -> i64 {
    debug_assert!(b > 0);
    if a >= 0 {
        (a + b - 1) / b
    } else {
        -((-a) / b)
    }
}

pub fn align_up(n: usize, align: usize) -> usize {
    debug_assert!(align.is_power_of_two());
    (n + align - 1) & !(align - 1)
}

/// Output extent for one axis; yields 0 (never wraps) when the effective
/// kernel exceeds the padded input.
pub fn compute_output_size(
    in_size: usize,
    kernel: usize,
    stride: usize,
    pad_before: usize,
    pad_after: usize,
    dilation: usize,
) -> usize {
    let effective_kernel = dilation * (kernel - 1) + 1;
    let padded = in_size + pad_before + pad_after;
    if padded < effective_kernel {
        return 0;
    }
    (padded - effective_kernel) / stride + 1
}
