//! Circular line buffer: a fixed-capacity FIFO ring of input row planes.
//!
//! The buffer holds exactly the `capacity_rows` most recently pushed planes
//! (one plane per input row, already resampled onto the convolution's column
//! lattice). Rows scroll out in FIFO order as new rows scroll in; all
//! wraparound addressing stays behind `push_row_with` / `window`.

/// Ring of `capacity_rows` row planes of `row_stride` elements each.
pub struct LineBuffer<T> {
    data: Vec<T>,
    capacity_rows: usize,
    row_stride: usize,
    /// Monotonic count of rows ever pushed; slot index is `cursor % capacity`.
    write_cursor: usize,
}

impl<T: Copy + Default> LineBuffer<T> {
    pub fn new(capacity_rows: usize, row_stride: usize) -> Self {
        assert!(capacity_rows > 0 && row_stride > 0);
        Self {
            data: vec![T::default(); capacity_rows * row_stride],
            capacity_rows,
            row_stride,
            write_cursor: 0,
        }
    }

    /// Append one plane, overwriting the oldest. The slot is zeroed before
    /// `fill` runs, so the closure only needs to write the valid span.
    pub fn push_row_with<F: FnOnce(&mut [T])>(&mut self, fill: F) {
        let slot = self.write_cursor % self.capacity_rows;
        let row = &mut self.data[slot * self.row_stride..(slot + 1) * self.row_stride];
        row.fill(T::default());
        fill(row);
        self.write_cursor += 1;
    }

    /// Append an all-zero plane (vertical padding row).
    pub fn push_zero_row(&mut self) {
        self.push_row_with(|_| {});
    }

    /// View of the resident window. Valid once at least `capacity_rows` rows
    /// have been pushed; `window().row(0)` is the oldest resident plane.
    pub fn window(&self) -> LineWindow<'_, T> {
        debug_assert!(self.write_cursor >= self.capacity_rows);
        LineWindow { buf: self }
    }
}

/// The last `capacity_rows` planes, addressed oldest-first.
pub struct LineWindow<'a, T> {
    buf: &'a LineBuffer<T>,
}

impl<'a, T: Copy + Default> LineWindow<'a, T> {
    /// The `i`-th oldest resident plane, `i` in `[0, capacity_rows)`.
    #[inline]
    pub fn row(&self, i: usize) -> &'a [T] {
        debug_assert!(i < self.buf.capacity_rows);
        let oldest = self.buf.write_cursor - self.buf.capacity_rows;
        let slot = (oldest + i) % self.buf.capacity_rows;
        &self.buf.data[slot * self.buf.row_stride..(slot + 1) * self.buf.row_stride]
    }

    pub fn rows(&self) -> impl Iterator<Item = &'a [T]> + '_ {
        (0..self.buf.capacity_rows).map(move |i| self.row(i))
    }
}
