use crate::positions::RowCursor;

/// Running content extent along the scroll axis.
///
/// Recomputed in full on data changes and updated incrementally by row-extent deltas when sizes
/// change, so a measurement costs O(1) (O(columns) for grids).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TotalSize {
    total: f64,
}

impl TotalSize {
    pub fn get(&self) -> f64 {
        self.total
    }

    /// Full pass over `len` items. Returns the new total.
    pub fn recompute(
        &mut self,
        len: usize,
        num_columns: usize,
        mut size_of: impl FnMut(usize) -> f64,
    ) -> f64 {
        let mut cursor = RowCursor::START;
        for i in 0..len {
            cursor.place(size_of(i), num_columns);
        }
        self.total = cursor.extent();
        vtrace!(len, total = self.total, "TotalSize::recompute");
        self.total
    }

    /// Applies a row-extent delta.
    pub fn add(&mut self, delta: f64) {
        self.total = (self.total + delta).max(0.0);
    }

    /// Leading padding that pushes short content to the end of the viewport.
    pub fn align_padding(&self, scroll_length: f64, align_items_at_end: bool) -> f64 {
        if align_items_at_end {
            (scroll_length - self.total).max(0.0)
        } else {
            0.0
        }
    }

    /// Largest reachable scroll offset for a viewport of `scroll_length`.
    pub fn max_scroll_offset(&self, scroll_length: f64) -> f64 {
        (self.total - scroll_length).max(0.0)
    }
}
